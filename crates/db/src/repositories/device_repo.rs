//! Repository for the `devices` table.

use sqlx::PgPool;
use rollcall_core::types::DbId;

use crate::models::device::Device;

const COLUMNS: &str = "\
    id, tenant_id, code, description, credential_hash, is_active, \
    last_seen_at, created_at, updated_at";

pub struct DeviceRepo;

impl DeviceRepo {
    /// Insert a device with an already-hashed credential.
    ///
    /// A duplicate code within the tenant fails on `uq_devices_tenant_code`.
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        code: &str,
        description: Option<&str>,
        credential_hash: &str,
    ) -> Result<Device, sqlx::Error> {
        let query = format!(
            "INSERT INTO devices (tenant_id, code, description, credential_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(tenant_id)
            .bind(code)
            .bind(description)
            .bind(credential_hash)
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool, tenant_id: DbId) -> Result<Vec<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE tenant_id = $1 ORDER BY code");
        sqlx::query_as::<_, Device>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE id = $1");
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look a device up by credential hash, active or not.
    ///
    /// The caller decides what an inactive match means.
    pub async fn find_by_credential_hash(
        pool: &PgPool,
        credential_hash: &str,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM devices WHERE credential_hash = $1");
        sqlx::query_as::<_, Device>(&query)
            .bind(credential_hash)
            .fetch_optional(pool)
            .await
    }

    pub async fn touch_last_seen(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE devices SET last_seen_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Soft-deactivate a device. Returns `None` if it is not in the tenant.
    pub async fn deactivate(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "UPDATE devices SET is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Replace the credential hash and reactivate in one statement, so the
    /// old credential stops matching at the same instant the new one starts.
    pub async fn rotate_credential(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
        credential_hash: &str,
    ) -> Result<Option<Device>, sqlx::Error> {
        let query = format!(
            "UPDATE devices SET credential_hash = $3, is_active = TRUE, updated_at = NOW() \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(credential_hash)
            .fetch_optional(pool)
            .await
    }
}
