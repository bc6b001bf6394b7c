use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Converts UTC instants into the school's wall-clock time.
///
/// Schedules are configured in local time and attendance rows are keyed by
/// local date, so every classification goes through one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    /// Build from an offset in minutes east of UTC. Out-of-range values fall
    /// back to UTC.
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or(Utc.fix());
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn local(&self, at: Timestamp) -> NaiveDateTime {
        at.with_timezone(&self.offset).naive_local()
    }

    pub fn local_date(&self, at: Timestamp) -> NaiveDate {
        self.local(at).date()
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone};

    use super::*;

    #[test]
    fn applies_positive_offset_across_midnight() {
        let clock = LocalClock::from_offset_minutes(7 * 60);
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(clock.local_date(at), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(clock.local(at).time(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
    }

    #[test]
    fn out_of_range_offset_is_utc() {
        assert_eq!(LocalClock::from_offset_minutes(100_000), LocalClock::utc());
    }
}
