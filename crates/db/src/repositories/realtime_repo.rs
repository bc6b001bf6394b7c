//! Read queries behind the live dashboard and the public display.

use chrono::NaiveDate;
use sqlx::PgPool;
use rollcall_core::realtime::{AttendanceStats, LeaderboardEntry, LiveFeedEntry};
use rollcall_core::types::DbId;

use crate::models::realtime::{LeaderboardRow, LiveFeedRow, StatusCounts};

pub struct RealtimeRepo;

impl RealtimeRepo {
    /// Most recent activity first. A row with a check-out shows as a
    /// check-out at that time.
    pub async fn live_feed(
        pool: &PgPool,
        tenant_id: DbId,
        class_id: Option<DbId>,
        date: NaiveDate,
        limit: i64,
    ) -> Result<Vec<LiveFeedEntry>, sqlx::Error> {
        let rows = sqlx::query_as::<_, LiveFeedRow>(
            "SELECT a.id, a.student_id, s.name AS student_name, s.class_id, \
                    c.name AS class_name, \
                    COALESCE(a.check_out_time, a.check_in_time) AS event_time, \
                    a.status, (a.check_out_time IS NOT NULL) AS checked_out \
             FROM attendances a \
             JOIN students s ON s.id = a.student_id \
             LEFT JOIN classes c ON c.id = s.class_id \
             WHERE a.tenant_id = $1 AND a.date = $2 \
               AND a.check_in_time IS NOT NULL \
               AND ($3::BIGINT IS NULL OR s.class_id = $3) \
             ORDER BY event_time DESC, a.id DESC \
             LIMIT $4",
        )
        .bind(tenant_id)
        .bind(date)
        .bind(class_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().filter_map(LiveFeedRow::into_entry).collect())
    }

    /// Today's aggregate, counting each student once by their first row.
    pub async fn stats(
        pool: &PgPool,
        tenant_id: DbId,
        class_id: Option<DbId>,
        date: NaiveDate,
    ) -> Result<AttendanceStats, sqlx::Error> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM students \
             WHERE tenant_id = $1 AND is_active \
               AND ($2::BIGINT IS NULL OR class_id = $2)",
        )
        .bind(tenant_id)
        .bind(class_id)
        .fetch_one(pool)
        .await?;

        let counts = sqlx::query_as::<_, StatusCounts>(
            "WITH firsts AS ( \
                 SELECT DISTINCT ON (a.student_id) a.status \
                 FROM attendances a \
                 JOIN students s ON s.id = a.student_id \
                 WHERE a.tenant_id = $1 AND a.date = $2 \
                   AND ($3::BIGINT IS NULL OR s.class_id = $3) \
                 ORDER BY a.student_id, a.check_in_time ASC NULLS LAST, a.id \
             ) \
             SELECT \
                 COUNT(*) FILTER (WHERE status = 'on_time') AS on_time, \
                 COUNT(*) FILTER (WHERE status = 'late') AS late, \
                 COUNT(*) FILTER (WHERE status = 'very_late') AS very_late \
             FROM firsts",
        )
        .bind(tenant_id)
        .bind(date)
        .bind(class_id)
        .fetch_one(pool)
        .await?;

        Ok(AttendanceStats::from_counts(
            total.0,
            counts.on_time,
            counts.late,
            counts.very_late,
        ))
    }

    /// Earliest on-time arrivals of the day, one entry per student.
    pub async fn leaderboard(
        pool: &PgPool,
        tenant_id: DbId,
        date: NaiveDate,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT ROW_NUMBER() OVER (ORDER BY f.arrival_time, f.student_id) AS rank, \
                    f.student_id, f.student_name, f.class_name, f.arrival_time \
             FROM ( \
                 SELECT DISTINCT ON (a.student_id) \
                        a.student_id, s.name AS student_name, c.name AS class_name, \
                        a.check_in_time AS arrival_time \
                 FROM attendances a \
                 JOIN students s ON s.id = a.student_id \
                 LEFT JOIN classes c ON c.id = s.class_id \
                 WHERE a.tenant_id = $1 AND a.date = $2 \
                   AND a.check_in_time IS NOT NULL \
                   AND a.status = 'on_time' \
                 ORDER BY a.student_id, a.check_in_time \
             ) f \
             ORDER BY f.arrival_time, f.student_id \
             LIMIT $3",
        )
        .bind(tenant_id)
        .bind(date)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(LeaderboardEntry::from).collect())
    }
}
