use sqlx::PgPool;
use rollcall_core::types::DbId;

use crate::models::push_token::GuardianPushToken;

pub struct PushTokenRepo;

impl PushTokenRepo {
    pub async fn list_active_for_student(
        pool: &PgPool,
        student_id: DbId,
    ) -> Result<Vec<GuardianPushToken>, sqlx::Error> {
        sqlx::query_as::<_, GuardianPushToken>(
            "SELECT id, student_id, token, is_active FROM guardian_push_tokens \
             WHERE student_id = $1 AND is_active \
             ORDER BY id",
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Stop sending to a token the provider no longer recognises.
    pub async fn deactivate(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE guardian_push_tokens SET is_active = FALSE, updated_at = NOW() \
             WHERE token = $1 AND is_active",
        )
        .bind(token)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
