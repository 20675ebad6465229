use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Strict `HH:MM` parser used by submission validation.
///
/// Only two-digit hours and minutes are accepted; anything else is a
/// reportable format error on the submitting side.
pub fn parse_hm_strict(value: &str) -> Option<NaiveTime> {
    let b = value.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return None;
    }
    if !(b[0].is_ascii_digit() && b[1].is_ascii_digit() && b[3].is_ascii_digit() && b[4].is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Lenient time-of-day parser used on the read/merge side:
/// `H:MM`, `HH:MM` and `HH:MM:SS` are all accepted.
pub fn parse_time_flexible(value: &str) -> Option<NaiveTime> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return None;
    }
    if parts[0].is_empty() || parts[0].len() > 2 || parts[1].len() != 2 {
        return None;
    }
    if parts.len() == 3 && parts[2].len() != 2 {
        return None;
    }
    if !parts.iter().all(|p| p.bytes().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let h: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    let s: u32 = if parts.len() == 3 { parts[2].parse().ok()? } else { 0 };
    NaiveTime::from_hms_opt(h, m, s)
}

/// Full-timestamp parser. Unparsable values come back as None; the
/// merge path treats them as absent instead of erroring.
pub fn parse_datetime_lenient(value: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    None
}

/// Interprets a payload value against a work date: a bare time of day is
/// anchored to that date, a full timestamp is used as-is.
pub fn anchor_to_date(work_date: NaiveDate, value: &str) -> Option<NaiveDateTime> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if let Some(t) = parse_time_flexible(v) {
        return Some(work_date.and_time(t));
    }
    parse_datetime_lenient(v)
}

/// Rounds a raw payload time to `HH:MM` for listings; None when blank
/// or unparsable.
pub fn hm_display(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if let Some(t) = parse_time_flexible(v) {
        return Some(t.format("%H:%M").to_string());
    }
    parse_datetime_lenient(v).map(|dt| dt.format("%H:%M").to_string())
}

pub fn fmt_hm(dt: NaiveDateTime) -> String {
    dt.format("%H:%M").to_string()
}

pub fn fmt_full(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `YYYY-MM` to the first day of that month.
pub fn parse_month(value: &str) -> Option<NaiveDate> {
    let b = value.as_bytes();
    if b.len() != 7 || b[4] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// First and last day of the month containing `first`.
pub fn month_bounds(first: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (y, m) = (chrono::Datelike::year(&first), chrono::Datelike::month(&first));
    let next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    // from_ymd_opt only fails at the far edges of the calendar
    let last = next.and_then(|n| n.pred_opt()).unwrap_or(first);
    let start = NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(first);
    (start, last)
}

pub fn prev_month(first: NaiveDate) -> NaiveDate {
    first.pred_opt().map(|d| month_bounds(d).0).unwrap_or(first)
}

pub fn next_month(first: NaiveDate) -> NaiveDate {
    let (_, last) = month_bounds(first);
    last.succ_opt().unwrap_or(first)
}

pub fn month_label(first: NaiveDate) -> String {
    first.format("%Y-%m").to_string()
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

pub fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_minutes()
}

pub fn plus_minutes(dt: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    dt + Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn strict_parser_requires_two_digit_fields() {
        assert!(parse_hm_strict("09:15").is_some());
        assert!(parse_hm_strict("9:15").is_none());
        assert!(parse_hm_strict("09:5").is_none());
        assert!(parse_hm_strict("0915").is_none());
        assert!(parse_hm_strict("25:00").is_none());
        assert!(parse_hm_strict("").is_none());
    }

    #[test]
    fn flexible_parser_accepts_short_hours_and_seconds() {
        assert_eq!(parse_time_flexible("9:15"), NaiveTime::from_hms_opt(9, 15, 0));
        assert_eq!(parse_time_flexible("09:15:30"), NaiveTime::from_hms_opt(9, 15, 30));
        assert!(parse_time_flexible("9:1").is_none());
        assert!(parse_time_flexible("junk").is_none());
    }

    #[test]
    fn anchoring_prefers_time_of_day_over_timestamp() {
        let wd = d("2025-10-01");
        assert_eq!(
            anchor_to_date(wd, "09:15"),
            NaiveDateTime::parse_from_str("2025-10-01 09:15:00", "%Y-%m-%d %H:%M:%S").ok()
        );
        assert_eq!(
            anchor_to_date(wd, "2025-09-30 22:00:00"),
            NaiveDateTime::parse_from_str("2025-09-30 22:00:00", "%Y-%m-%d %H:%M:%S").ok()
        );
        assert_eq!(anchor_to_date(wd, "not a time"), None);
        assert_eq!(anchor_to_date(wd, "  "), None);
    }

    #[test]
    fn month_helpers() {
        assert_eq!(parse_month("2025-10"), Some(d("2025-10-01")));
        assert_eq!(parse_month("2025-13"), None);
        assert_eq!(parse_month("202510"), None);
        assert_eq!(month_bounds(d("2025-02-01")), (d("2025-02-01"), d("2025-02-28")));
        assert_eq!(prev_month(d("2025-01-01")), d("2024-12-01"));
        assert_eq!(next_month(d("2024-12-01")), d("2025-01-01"));
    }

    #[test]
    fn hm_display_rounds_or_rejects() {
        assert_eq!(hm_display("9:05"), Some("09:05".into()));
        assert_eq!(hm_display("2025-10-01 18:05:00"), Some("18:05".into()));
        assert_eq!(hm_display(""), None);
        assert_eq!(hm_display("garbage"), None);
    }
}
