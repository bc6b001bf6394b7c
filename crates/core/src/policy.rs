//! Attendance Policy Engine.
//!
//! Given a tenant's schedules and a local tap timestamp, pick the schedule
//! that governs the tap and classify it as on time, late, or very late.
//! Everything here is a pure function of its inputs.

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::attendance::AttendanceStatus;
use crate::schedule::{ScheduleWindow, WeekdaySet};
use crate::types::DbId;

/// Built-in window used when a tenant has no usable schedule.
pub const BUILTIN_START: (u32, u32) = (7, 0);
pub const BUILTIN_END: (u32, u32) = (16, 0);
pub const BUILTIN_LATE_THRESHOLD: i32 = 30;
pub const BUILTIN_VERY_LATE_THRESHOLD: i32 = 60;

/// Result of classifying one tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// `None` when the built-in window was used.
    pub schedule_id: Option<DbId>,
    pub status: AttendanceStatus,
    /// Whole minutes after the window start (negative when early).
    pub minutes_elapsed: i64,
}

/// The window applied when a tenant has configured nothing usable for the day.
pub fn builtin_window() -> ScheduleWindow {
    let time = |(h, m): (u32, u32)| NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN);
    ScheduleWindow {
        id: 0,
        name: "Default".to_string(),
        start: time(BUILTIN_START),
        end: time(BUILTIN_END),
        late_threshold: BUILTIN_LATE_THRESHOLD,
        very_late_threshold: Some(BUILTIN_VERY_LATE_THRESHOLD),
        weekdays: WeekdaySet::ALL,
        is_active: true,
        is_default: true,
    }
}

/// Pick the schedule governing a tap at local time `at`.
///
/// Among schedules active on the tap's date whose window contains the tap,
/// explicit schedules win over defaults and lower ids win ties. When no
/// window contains the tap, the active default with the lowest id is used.
pub fn select_schedule(schedules: &[ScheduleWindow], at: NaiveDateTime) -> Option<&ScheduleWindow> {
    let date = at.date();
    let time = at.time();

    let matching = schedules
        .iter()
        .filter(|s| s.is_active_on(date) && s.contains(time))
        .min_by_key(|s| (s.is_default, s.id));

    matching.or_else(|| {
        schedules
            .iter()
            .filter(|s| s.is_default && s.is_active_on(date))
            .min_by_key(|s| s.id)
    })
}

/// Whole minutes elapsed from the window start to `time`, truncated.
///
/// For windows that span midnight, a time after midnight counts from the
/// previous evening's start.
pub fn minutes_elapsed(window: &ScheduleWindow, time: NaiveTime) -> i64 {
    let elapsed = time.signed_duration_since(window.start);
    let elapsed = if window.spans_midnight() && time <= window.end {
        elapsed + chrono::Duration::days(1)
    } else {
        elapsed
    };
    elapsed.num_minutes()
}

/// Classify a tap time against a single window.
pub fn classify(window: &ScheduleWindow, time: NaiveTime) -> AttendanceStatus {
    status_for_elapsed(
        minutes_elapsed(window, time),
        window.late_threshold,
        window.very_late_threshold,
    )
}

/// Threshold rule applied to elapsed minutes.
pub fn status_for_elapsed(elapsed: i64, late: i32, very_late: Option<i32>) -> AttendanceStatus {
    if elapsed <= 0 {
        return AttendanceStatus::OnTime;
    }
    if let Some(very_late) = very_late {
        if elapsed >= i64::from(very_late) {
            return AttendanceStatus::VeryLate;
        }
    }
    if elapsed >= i64::from(late) {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::OnTime
    }
}

/// Select a schedule (falling back to the built-in window) and classify.
pub fn classify_tap(schedules: &[ScheduleWindow], at: NaiveDateTime) -> Classification {
    let builtin;
    let (schedule_id, window) = match select_schedule(schedules, at) {
        Some(window) => (Some(window.id), window),
        None => {
            builtin = builtin_window();
            (None, &builtin)
        }
    };

    let elapsed = minutes_elapsed(window, at.time());
    Classification {
        schedule_id,
        status: status_for_elapsed(elapsed, window.late_threshold, window.very_late_threshold),
        minutes_elapsed: elapsed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;

    fn window(id: DbId, start: &str, end: &str, late: i32, very_late: Option<i32>) -> ScheduleWindow {
        ScheduleWindow::from_parts(id, "w", start, end, late, very_late, "", true, false).unwrap()
    }

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn morning_entry_thresholds() {
        let schedules = vec![window(1, "07:00", "08:00", 10, Some(30))];
        assert_eq!(classify_tap(&schedules, monday(7, 5)).status, AttendanceStatus::OnTime);
        assert_eq!(classify_tap(&schedules, monday(7, 12)).status, AttendanceStatus::Late);
        assert_eq!(classify_tap(&schedules, monday(7, 35)).status, AttendanceStatus::VeryLate);
    }

    #[test]
    fn boundaries_are_inclusive_of_threshold() {
        let w = window(1, "07:00", "08:00", 10, Some(30));
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(classify(&w, t(7, 0)), AttendanceStatus::OnTime);
        assert_eq!(classify(&w, t(7, 9)), AttendanceStatus::OnTime);
        assert_eq!(classify(&w, t(7, 10)), AttendanceStatus::Late);
        assert_eq!(classify(&w, t(7, 29)), AttendanceStatus::Late);
        assert_eq!(classify(&w, t(7, 30)), AttendanceStatus::VeryLate);
    }

    #[test]
    fn partial_minutes_are_truncated() {
        let w = window(1, "07:00", "08:00", 10, None);
        let t = NaiveTime::from_hms_opt(7, 10, 59).unwrap();
        assert_eq!(minutes_elapsed(&w, t), 10);
        let t = NaiveTime::from_hms_opt(7, 9, 59).unwrap();
        assert_eq!(classify(&w, t), AttendanceStatus::OnTime);
    }

    #[test]
    fn zero_late_threshold_marks_any_delay_late() {
        let w = window(1, "07:00", "08:00", 0, None);
        assert_eq!(classify(&w, NaiveTime::from_hms_opt(7, 0, 30).unwrap()), AttendanceStatus::OnTime);
        assert_eq!(classify(&w, NaiveTime::from_hms_opt(7, 1, 0).unwrap()), AttendanceStatus::Late);
    }

    #[test]
    fn without_very_late_threshold_stays_late() {
        let w = window(1, "07:00", "16:00", 10, None);
        assert_eq!(classify(&w, NaiveTime::from_hms_opt(15, 0, 0).unwrap()), AttendanceStatus::Late);
    }

    #[test]
    fn explicit_match_beats_default() {
        let mut default = window(1, "06:00", "18:00", 30, None);
        default.is_default = true;
        let explicit = window(5, "07:00", "08:00", 10, None);
        let schedules = vec![default, explicit];
        assert_eq!(select_schedule(&schedules, monday(7, 30)).unwrap().id, 5);
    }

    #[test]
    fn overlapping_explicit_windows_pick_lowest_id() {
        let schedules = vec![
            window(9, "07:00", "09:00", 10, None),
            window(3, "06:30", "08:00", 10, None),
        ];
        assert_eq!(select_schedule(&schedules, monday(7, 30)).unwrap().id, 3);
    }

    #[test]
    fn selection_is_order_independent() {
        let a = window(4, "07:00", "09:00", 10, None);
        let b = window(2, "07:00", "09:00", 10, None);
        let forward = vec![a.clone(), b.clone()];
        let backward = vec![b, a];
        assert_eq!(
            select_schedule(&forward, monday(7, 30)).map(|s| s.id),
            select_schedule(&backward, monday(7, 30)).map(|s| s.id)
        );
    }

    #[test]
    fn falls_back_to_default_outside_every_window() {
        let mut default = window(2, "07:00", "08:00", 10, None);
        default.is_default = true;
        let schedules = vec![window(1, "12:00", "13:00", 10, None), default];
        let chosen = select_schedule(&schedules, monday(15, 0)).unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn inactive_and_off_day_schedules_are_ignored() {
        let mut inactive = window(1, "07:00", "08:00", 10, None);
        inactive.is_active = false;
        let weekend = ScheduleWindow::from_parts(2, "w", "07:00", "08:00", 10, None, "0,6", true, false)
            .unwrap();
        let schedules = vec![inactive, weekend];
        assert!(select_schedule(&schedules, monday(7, 30)).is_none());
    }

    #[test]
    fn builtin_window_applies_without_schedules() {
        let c = classify_tap(&[], monday(7, 45));
        assert_eq!(c.schedule_id, None);
        assert_eq!(c.status, AttendanceStatus::Late);
        assert_eq!(classify_tap(&[], monday(8, 0)).status, AttendanceStatus::VeryLate);
        assert_eq!(classify_tap(&[], monday(6, 50)).status, AttendanceStatus::OnTime);
    }

    #[test]
    fn overnight_window_counts_across_midnight() {
        let w = window(1, "22:00", "02:00", 10, Some(120));
        assert_eq!(minutes_elapsed(&w, NaiveTime::from_hms_opt(0, 30, 0).unwrap()), 150);
        assert_eq!(classify(&w, NaiveTime::from_hms_opt(0, 30, 0).unwrap()), AttendanceStatus::VeryLate);
        assert_eq!(classify(&w, NaiveTime::from_hms_opt(22, 5, 0).unwrap()), AttendanceStatus::OnTime);
    }

    // -- properties ---------------------------------------------------------

    fn arb_window() -> impl Strategy<Value = ScheduleWindow> {
        (0u32..20, 0u32..60, 0i32..120, proptest::option::of(0i32..240)).prop_map(
            |(h, m, late, extra)| ScheduleWindow {
                id: 1,
                name: "p".to_string(),
                start: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
                end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
                late_threshold: late,
                very_late_threshold: extra.map(|e| late + e),
                weekdays: WeekdaySet::ALL,
                is_active: true,
                is_default: false,
            },
        )
    }

    proptest! {
        #[test]
        fn taps_before_start_are_on_time(w in arb_window(), before in 1i64..600) {
            let at = w.start - chrono::Duration::minutes(before);
            prop_assume!(at < w.start);
            prop_assert_eq!(classify(&w, at), AttendanceStatus::OnTime);
        }

        #[test]
        fn elapsed_between_thresholds_is_late(w in arb_window(), offset in 0i64..240) {
            let late = i64::from(w.late_threshold.max(1));
            let elapsed = late + offset;
            if let Some(vl) = w.very_late_threshold {
                prop_assume!(elapsed < i64::from(vl));
            }
            prop_assert_eq!(
                status_for_elapsed(elapsed, w.late_threshold, w.very_late_threshold),
                AttendanceStatus::Late
            );
        }

        #[test]
        fn elapsed_at_or_past_very_late_is_very_late(w in arb_window(), offset in 0i64..600) {
            if let Some(vl) = w.very_late_threshold {
                let elapsed = i64::from(vl.max(1)) + offset;
                prop_assert_eq!(
                    status_for_elapsed(elapsed, w.late_threshold, w.very_late_threshold),
                    AttendanceStatus::VeryLate
                );
            }
        }

        #[test]
        fn status_never_improves_with_time(w in arb_window(), a in -600i64..600, b in -600i64..600) {
            let rank = |s: AttendanceStatus| match s {
                AttendanceStatus::OnTime => 0,
                AttendanceStatus::Late => 1,
                AttendanceStatus::VeryLate => 2,
                AttendanceStatus::Absent => 3,
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let s_lo = status_for_elapsed(lo, w.late_threshold, w.very_late_threshold);
            let s_hi = status_for_elapsed(hi, w.late_threshold, w.very_late_threshold);
            prop_assert!(rank(s_lo) <= rank(s_hi));
        }
    }
}
