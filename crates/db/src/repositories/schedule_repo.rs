use sqlx::PgPool;
use rollcall_core::types::DbId;

use crate::models::schedule::AttendanceSchedule;

const COLUMNS: &str = "\
    id, tenant_id, name, start_time, end_time, late_threshold, \
    very_late_threshold, days_of_week, is_active, is_default";

pub struct ScheduleRepo;

impl ScheduleRepo {
    /// Every active schedule of a tenant. Weekday filtering is done by the
    /// policy engine.
    pub async fn list_active(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> Result<Vec<AttendanceSchedule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendance_schedules \
             WHERE tenant_id = $1 AND is_active \
             ORDER BY id"
        );
        sqlx::query_as::<_, AttendanceSchedule>(&query)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
