use crate::model::break_time::BreakTime;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use strum_macros::{Display, EnumString};

/// One row per (user, work_date). `break_minutes` is a cached total that
/// is recomputed after clock-out, break-out and any admin/approval merge.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: u64,
    pub user_id: u64,
    pub work_date: NaiveDate,
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    pub break_minutes: Option<u32>,
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Off,
    Working,
    OnBreak,
    ClockedOut,
}

impl Attendance {
    pub fn status(&self) -> AttendanceStatus {
        self.status.parse().unwrap_or(AttendanceStatus::Off)
    }

    /// Clocked in and not yet out; breaks may only be taken in this state.
    pub fn is_working_day(&self) -> bool {
        self.start_at.is_some() && self.end_at.is_none()
    }
}

/* =========================
Aggregation engine
========================= */

/// Total break minutes for a record, from an explicitly passed interval
/// set. Open intervals count up to `now`. When the work span is fully
/// bounded each interval is clipped to [start_at, end_at]; an open day
/// counts intervals unclipped. Returns 0 when start_at is absent.
pub fn calc_break_minutes(att: &Attendance, breaks: &[BreakTime], now: NaiveDateTime) -> i64 {
    if att.start_at.is_none() {
        return 0;
    }

    let span = match (att.start_at, att.end_at) {
        (Some(s), Some(e)) => Some((s, e)),
        _ => None,
    };

    let mut sum = 0i64;
    for br in breaks {
        let b_start = br.start_at;
        let b_end = br.end_at.unwrap_or(now);

        let (s, e) = match span {
            Some((ws, we)) => (b_start.max(ws), b_end.min(we)),
            None => (b_start, b_end),
        };

        if e > s {
            sum += (e - s).num_minutes();
        }
    }
    sum
}

/// Net worked minutes for a completed day: 0 unless both punch times are
/// set, otherwise the span minus breaks, never negative. The cached
/// break_minutes is preferred when non-null.
pub fn calc_work_minutes(att: &Attendance, breaks: &[BreakTime], now: NaiveDateTime) -> i64 {
    let (Some(start), Some(end)) = (att.start_at, att.end_at) else {
        return 0;
    };

    let total = (end - start).num_minutes();
    let break_min = match att.break_minutes {
        Some(m) => m as i64,
        None => calc_break_minutes(att, breaks, now),
    };

    (total - break_min).max(0)
}

/// Break minutes for display: cached value preferred, live recompute for
/// in-progress days, None when the day has no clock-in at all.
pub fn display_break_minutes(att: &Attendance, breaks: &[BreakTime], now: NaiveDateTime) -> Option<i64> {
    att.start_at?;
    Some(match att.break_minutes {
        Some(m) => m as i64,
        None => calc_break_minutes(att, breaks, now),
    })
}

/// Worked minutes for display, counting an open day up to `now`.
/// None when there is no clock-in.
pub fn live_work_minutes(att: &Attendance, breaks: &[BreakTime], now: NaiveDateTime) -> Option<i64> {
    let start = att.start_at?;
    let end = att.end_at.unwrap_or(now);
    let total = (end - start).num_minutes().max(0);
    let break_min = display_break_minutes(att, breaks, now).unwrap_or(0);
    Some((total - break_min).max(0))
}

/* =========================
Punch state machine decisions
========================= */

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ClockInStep {
    CreateRecord,
    SetStartTime,
    AlreadyWorking,
    AlreadyClockedOut,
}

pub fn clock_in_decision(existing: Option<&Attendance>) -> ClockInStep {
    match existing {
        None => ClockInStep::CreateRecord,
        Some(a) if a.start_at.is_some() && a.end_at.is_some() => ClockInStep::AlreadyClockedOut,
        Some(a) if a.start_at.is_none() => ClockInStep::SetStartTime,
        Some(_) => ClockInStep::AlreadyWorking,
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ClockOutGate {
    Ok,
    NotClockedIn,
    AlreadyClockedOut,
}

pub fn clock_out_decision(existing: Option<&Attendance>) -> ClockOutGate {
    match existing {
        None => ClockOutGate::NotClockedIn,
        Some(a) if a.start_at.is_none() => ClockOutGate::NotClockedIn,
        Some(a) if a.end_at.is_some() => ClockOutGate::AlreadyClockedOut,
        Some(_) => ClockOutGate::Ok,
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BreakInGate {
    Ok,
    NotWorking,
    AlreadyOnBreak,
}

pub fn break_in_decision(existing: Option<&Attendance>, has_open_break: bool) -> BreakInGate {
    match existing {
        Some(a) if a.is_working_day() => {
            if has_open_break {
                BreakInGate::AlreadyOnBreak
            } else {
                BreakInGate::Ok
            }
        }
        _ => BreakInGate::NotWorking,
    }
}

/// Break-out additionally requires the owning day to still be open.
pub fn break_out_allowed(att: &Attendance) -> bool {
    att.is_working_day()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn record(start: Option<&str>, end: Option<&str>, cached: Option<u32>) -> Attendance {
        Attendance {
            id: 1,
            user_id: 10,
            work_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            start_at: start.map(dt),
            end_at: end.map(dt),
            break_minutes: cached,
            status: "working".into(),
            note: None,
        }
    }

    fn interval(start: &str, end: Option<&str>) -> BreakTime {
        BreakTime {
            id: 0,
            attendance_id: 1,
            start_at: dt(start),
            end_at: end.map(dt),
        }
    }

    #[test]
    fn full_day_with_one_break() {
        // clock-in 09:00, break 12:00-12:30, clock-out 18:00
        let att = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 18:00:00"), None);
        let breaks = vec![interval("2025-10-01 12:00:00", Some("2025-10-01 12:30:00"))];
        let now = dt("2025-10-01 19:00:00");

        assert_eq!(calc_break_minutes(&att, &breaks, now), 30);
        // 540 minutes on the clock minus the 30-minute break
        assert_eq!(calc_work_minutes(&att, &breaks, now), 510);
    }

    #[test]
    fn cached_break_minutes_wins_over_recompute() {
        let att = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 18:00:00"), Some(60));
        let breaks = vec![interval("2025-10-01 12:00:00", Some("2025-10-01 12:30:00"))];
        let now = dt("2025-10-01 19:00:00");

        assert_eq!(calc_work_minutes(&att, &breaks, now), 480);
        assert_eq!(display_break_minutes(&att, &breaks, now), Some(60));
    }

    #[test]
    fn breaks_clip_to_bounded_span() {
        let att = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 18:00:00"), None);
        let breaks = vec![
            // started before clock-in, only the in-span part counts
            interval("2025-10-01 08:30:00", Some("2025-10-01 09:20:00")),
            // entirely outside the span contributes nothing
            interval("2025-10-01 19:00:00", Some("2025-10-01 19:30:00")),
        ];
        let now = dt("2025-10-01 20:00:00");

        assert_eq!(calc_break_minutes(&att, &breaks, now), 20);
    }

    #[test]
    fn open_break_counts_to_now_on_open_day() {
        let att = record(Some("2025-10-01 09:00:00"), None, None);
        let breaks = vec![interval("2025-10-01 12:00:00", None)];
        let now = dt("2025-10-01 12:45:00");

        assert_eq!(calc_break_minutes(&att, &breaks, now), 45);
        // open day: canonical work minutes are 0, live figure runs to now
        assert_eq!(calc_work_minutes(&att, &breaks, now), 0);
        assert_eq!(live_work_minutes(&att, &breaks, now), Some(180));
    }

    #[test]
    fn no_clock_in_means_no_minutes() {
        let att = record(None, None, None);
        let breaks = vec![interval("2025-10-01 12:00:00", Some("2025-10-01 12:30:00"))];
        let now = dt("2025-10-01 13:00:00");

        assert_eq!(calc_break_minutes(&att, &breaks, now), 0);
        assert_eq!(display_break_minutes(&att, &breaks, now), None);
        assert_eq!(live_work_minutes(&att, &breaks, now), None);
    }

    #[test]
    fn work_minutes_never_negative() {
        let att = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 09:10:00"), Some(60));
        let now = dt("2025-10-01 10:00:00");
        assert_eq!(calc_work_minutes(&att, &[], now), 0);
    }

    #[test]
    fn clock_in_transitions() {
        assert_eq!(clock_in_decision(None), ClockInStep::CreateRecord);

        let fresh = record(None, None, None);
        assert_eq!(clock_in_decision(Some(&fresh)), ClockInStep::SetStartTime);

        // second clock-in while working is a no-op
        let working = record(Some("2025-10-01 09:00:00"), None, None);
        assert_eq!(clock_in_decision(Some(&working)), ClockInStep::AlreadyWorking);

        let done = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 18:00:00"), None);
        assert_eq!(clock_in_decision(Some(&done)), ClockInStep::AlreadyClockedOut);
    }

    #[test]
    fn clock_out_requires_prior_clock_in() {
        assert_eq!(clock_out_decision(None), ClockOutGate::NotClockedIn);

        let fresh = record(None, None, None);
        assert_eq!(clock_out_decision(Some(&fresh)), ClockOutGate::NotClockedIn);

        let done = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 18:00:00"), None);
        assert_eq!(clock_out_decision(Some(&done)), ClockOutGate::AlreadyClockedOut);

        let working = record(Some("2025-10-01 09:00:00"), None, None);
        assert_eq!(clock_out_decision(Some(&working)), ClockOutGate::Ok);
    }

    #[test]
    fn break_gates() {
        let working = record(Some("2025-10-01 09:00:00"), None, None);
        assert_eq!(break_in_decision(Some(&working), false), BreakInGate::Ok);
        assert_eq!(break_in_decision(Some(&working), true), BreakInGate::AlreadyOnBreak);

        let done = record(Some("2025-10-01 09:00:00"), Some("2025-10-01 18:00:00"), None);
        assert_eq!(break_in_decision(Some(&done), false), BreakInGate::NotWorking);
        assert_eq!(break_in_decision(None, false), BreakInGate::NotWorking);

        assert!(break_out_allowed(&working));
        assert!(!break_out_allowed(&done));
    }

    #[test]
    fn status_string_round_trip() {
        let mut att = record(None, None, None);
        att.status = "on_break".into();
        assert_eq!(att.status(), AttendanceStatus::OnBreak);
        att.status = "???".into();
        assert_eq!(att.status(), AttendanceStatus::Off);
        assert_eq!(AttendanceStatus::ClockedOut.to_string(), "clocked_out");
    }
}
