//! Repository for the `display_tokens` table.

use sqlx::PgPool;
use rollcall_core::types::{DbId, Timestamp};

use crate::models::display_token::{DisplayToken, ResolvedDisplayToken};

const COLUMNS: &str = "\
    id, tenant_id, name, token_hash, is_active, expires_at, last_accessed_at, created_at";

pub struct DisplayTokenRepo;

impl DisplayTokenRepo {
    pub async fn create(
        pool: &PgPool,
        tenant_id: DbId,
        name: &str,
        token_hash: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<DisplayToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO display_tokens (tenant_id, name, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DisplayToken>(&query)
            .bind(tenant_id)
            .bind(name)
            .bind(token_hash)
            .bind(expires_at)
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &PgPool, tenant_id: DbId) -> Result<Vec<DisplayToken>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM display_tokens WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, DisplayToken>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    pub async fn revoke(
        pool: &PgPool,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<DisplayToken>, sqlx::Error> {
        let query = format!(
            "UPDATE display_tokens SET is_active = FALSE \
             WHERE id = $1 AND tenant_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DisplayToken>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Token row and tenant name by hash, regardless of state.
    pub async fn find_by_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<ResolvedDisplayToken>, sqlx::Error> {
        sqlx::query_as::<_, ResolvedDisplayToken>(
            "SELECT dt.id, dt.tenant_id, t.name AS tenant_name, dt.is_active, dt.expires_at \
             FROM display_tokens dt \
             JOIN tenants t ON t.id = dt.tenant_id \
             WHERE dt.token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn touch_last_accessed(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE display_tokens SET last_accessed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
