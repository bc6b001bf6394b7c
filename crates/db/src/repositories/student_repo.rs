//! Repository for the card-binding columns of `students`.

use sqlx::{PgConnection, PgPool};
use rollcall_core::types::DbId;

use crate::models::student::Student;

const COLUMNS: &str = "\
    s.id, s.tenant_id, s.class_id, c.name AS class_name, s.name, \
    s.student_number, s.card_id, s.is_active";

pub struct StudentRepo;

impl StudentRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Student>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM students s \
             LEFT JOIN classes c ON c.id = s.class_id \
             WHERE s.id = $1"
        );
        sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active student holding `card_id` within a tenant.
    pub async fn find_active_by_card(
        pool: &PgPool,
        tenant_id: DbId,
        card_id: &str,
    ) -> Result<Option<Student>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM students s \
             LEFT JOIN classes c ON c.id = s.class_id \
             WHERE s.card_id = $1 AND s.tenant_id = $2 AND s.is_active"
        );
        sqlx::query_as::<_, Student>(&query)
            .bind(card_id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Current holder of `card_id` anywhere in the system, row-locked for the
    /// rest of the transaction.
    pub async fn lock_card_owner(
        conn: &mut PgConnection,
        card_id: &str,
    ) -> Result<Option<Student>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM students s \
             LEFT JOIN classes c ON c.id = s.class_id \
             WHERE s.card_id = $1 \
             FOR UPDATE OF s"
        );
        sqlx::query_as::<_, Student>(&query)
            .bind(card_id)
            .fetch_optional(conn)
            .await
    }

    /// Bind a card to a student that currently has none.
    ///
    /// Returns `false` if the student gained a card in the meantime.
    pub async fn bind_card(
        conn: &mut PgConnection,
        student_id: DbId,
        card_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE students SET card_id = $2, updated_at = NOW() \
             WHERE id = $1 AND (card_id IS NULL OR card_id = '')",
        )
        .bind(student_id)
        .bind(card_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear a student's card. Returns `false` if the student is unknown.
    pub async fn clear_card(conn: &mut PgConnection, student_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE students SET card_id = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(student_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
