use crate::model::attendance::Attendance;
use crate::utils::time::{anchor_to_date, plus_minutes};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Change keyed by payload key *presence*: an absent key leaves the
/// field untouched, a present key assigns whatever its value parses to
/// (unparsable values read as None, clearing the field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange<T> {
    Untouched,
    Set(Option<T>),
}

impl<T: Copy> FieldChange<T> {
    pub fn apply(&self, current: Option<T>) -> Option<T> {
        match self {
            FieldChange::Untouched => current,
            FieldChange::Set(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakChange {
    /// Keep the stored intervals; break_minutes is recomputed from them.
    Untouched,
    /// Wholesale replacement; break_minutes becomes the exact sum.
    Replace {
        rows: Vec<(NaiveDateTime, NaiveDateTime)>,
        total_minutes: i64,
    },
}

/// The computed effect of merging a request's payload_current into its
/// attendance record. Pure data; the approval transaction applies it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub start_at: FieldChange<NaiveDateTime>,
    pub end_at: FieldChange<NaiveDateTime>,
    pub breaks: BreakChange,
    /// None = untouched; Some("") is an explicit clear.
    pub note: Option<String>,
}

/// Resolves key aliases once: the primary key wins unless its value is
/// null, then the alias is consulted.
fn aliased<'a>(
    obj: &'a serde_json::Map<String, Value>,
    primary: &str,
    alias: &str,
) -> Option<&'a Value> {
    if !obj.contains_key(primary) && !obj.contains_key(alias) {
        return None;
    }
    Some(
        obj.get(primary)
            .filter(|v| !v.is_null())
            .or_else(|| obj.get(alias))
            .unwrap_or(&Value::Null),
    )
}

/// Non-blank string content of a break-row side, honoring the
/// `start`/`start_at` (`end`/`end_at`) aliases.
fn row_side(obj: &serde_json::Map<String, Value>, primary: &str, alias: &str) -> Option<String> {
    let v = obj
        .get(primary)
        .filter(|v| !v.is_null())
        .or_else(|| obj.get(alias).filter(|v| !v.is_null()))?;
    let s = v.as_str()?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

fn time_field(
    obj: &serde_json::Map<String, Value>,
    primary: &str,
    alias: &str,
    work_date: NaiveDate,
) -> FieldChange<NaiveDateTime> {
    match aliased(obj, primary, alias) {
        None => FieldChange::Untouched,
        Some(v) => FieldChange::Set(
            v.as_str().and_then(|s| anchor_to_date(work_date, s)),
        ),
    }
}

pub fn merge_plan(payload: Option<&Value>, work_date: NaiveDate) -> MergePlan {
    let empty = serde_json::Map::new();
    let obj = payload.and_then(|v| v.as_object()).unwrap_or(&empty);

    let start_at = time_field(obj, "start_at", "clock_in_at", work_date);
    let end_at = time_field(obj, "end_at", "clock_out_at", work_date);

    let breaks = match obj.get("breaks") {
        None => BreakChange::Untouched,
        Some(raw) => plan_breaks(raw, work_date),
    };

    let note = match obj.get("note") {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    MergePlan { start_at, end_at, breaks, note }
}

fn plan_breaks(raw: &Value, work_date: NaiveDate) -> BreakChange {
    // payload columns occasionally hold the array double-encoded
    let rows: Vec<Value> = match raw {
        Value::Array(a) => a.clone(),
        Value::String(s) => serde_json::from_str::<Value>(s)
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let filtered: Vec<(Option<String>, Option<String>)> = rows
        .iter()
        .filter_map(|r| {
            let o = r.as_object()?;
            let s = row_side(o, "start", "start_at");
            let e = row_side(o, "end", "end_at");
            if s.is_none() && e.is_none() { None } else { Some((s, e)) }
        })
        .collect();

    // key present but every row blank: keep the stored intervals
    if filtered.is_empty() {
        return BreakChange::Untouched;
    }

    let mut out = Vec::new();
    let mut total = 0i64;
    for (s_raw, e_raw) in filtered {
        let mut bs = s_raw.as_deref().and_then(|s| anchor_to_date(work_date, s));
        let mut be = e_raw.as_deref().and_then(|s| anchor_to_date(work_date, s));

        // single-sided rows are completed ten minutes from the given side
        if let (Some(s), None) = (bs, be) {
            be = Some(plus_minutes(s, 10));
        }
        if let (None, Some(e)) = (bs, be) {
            bs = Some(plus_minutes(e, -10));
        }

        if let (Some(s), Some(e)) = (bs, be) {
            if s < e {
                total += (e - s).num_minutes();
                out.push((s, e));
            }
        }
    }

    BreakChange::Replace { rows: out, total_minutes: total }
}

/* =========================
Preview overlay (render-only)
========================= */

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreviewBreak {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub start_at: Option<NaiveDateTime>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub end_at: Option<NaiveDateTime>,
}

impl From<&crate::model::break_time::BreakTime> for PreviewBreak {
    fn from(b: &crate::model::break_time::BreakTime) -> Self {
        PreviewBreak { start_at: Some(b.start_at), end_at: b.end_at }
    }
}

/// Overlays payload_current onto an in-memory snapshot for display.
/// Same alias/anchoring rules as the merge, but nothing is completed,
/// discarded or persisted.
pub fn apply_preview(att: &mut Attendance, breaks: &mut Vec<PreviewBreak>, payload: &Value) {
    let Some(obj) = payload.as_object() else { return };
    let work_date = att.work_date;

    if let Some(s) = obj.get("start_at").and_then(Value::as_str) {
        if !s.trim().is_empty() {
            att.start_at = anchor_to_date(work_date, s);
        }
    }
    if let Some(s) = obj.get("end_at").and_then(Value::as_str) {
        if !s.trim().is_empty() {
            att.end_at = anchor_to_date(work_date, s);
        }
    }

    if let Some(rows) = obj.get("breaks").and_then(Value::as_array) {
        if !rows.is_empty() {
            *breaks = rows
                .iter()
                .filter_map(|r| r.as_object())
                .map(|o| PreviewBreak {
                    start_at: row_side(o, "start_at", "start")
                        .and_then(|s| anchor_to_date(work_date, &s)),
                    end_at: row_side(o, "end_at", "end")
                        .and_then(|s| anchor_to_date(work_date, &s)),
                })
                .collect();
        }
    }

    if let Some(v) = obj.get("note") {
        if let Some(s) = v.as_str() {
            att.note = Some(s.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wd() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn bare_times_are_anchored_to_the_work_date() {
        let payload = json!({
            "start_at": "09:15",
            "end_at": "18:05",
            "breaks": [{"start": "12:00", "end": "12:30"}],
            "note": "fixed",
        });
        let plan = merge_plan(Some(&payload), wd());

        assert_eq!(plan.start_at, FieldChange::Set(Some(dt("2025-10-01 09:15:00"))));
        assert_eq!(plan.end_at, FieldChange::Set(Some(dt("2025-10-01 18:05:00"))));
        assert_eq!(
            plan.breaks,
            BreakChange::Replace {
                rows: vec![(dt("2025-10-01 12:00:00"), dt("2025-10-01 12:30:00"))],
                total_minutes: 30,
            }
        );
        assert_eq!(plan.note, Some("fixed".to_string()));
    }

    #[test]
    fn full_timestamps_pass_through_and_aliases_resolve() {
        let payload = json!({
            "clock_in_at": "2025-09-30 22:00:00",
            "breaks": [{"start_at": "23:00", "end_at": "23:15"}],
        });
        let plan = merge_plan(Some(&payload), wd());

        assert_eq!(plan.start_at, FieldChange::Set(Some(dt("2025-09-30 22:00:00"))));
        assert_eq!(plan.end_at, FieldChange::Untouched);
        assert_eq!(plan.note, None);
        match plan.breaks {
            BreakChange::Replace { rows, total_minutes } => {
                assert_eq!(rows, vec![(dt("2025-10-01 23:00:00"), dt("2025-10-01 23:15:00"))]);
                assert_eq!(total_minutes, 15);
            }
            other => panic!("expected replacement, got {other:?}"),
        }
    }

    #[test]
    fn absent_keys_leave_everything_untouched() {
        let plan = merge_plan(Some(&json!({})), wd());
        assert_eq!(plan.start_at, FieldChange::Untouched);
        assert_eq!(plan.end_at, FieldChange::Untouched);
        assert_eq!(plan.breaks, BreakChange::Untouched);
        assert_eq!(plan.note, None);

        let plan = merge_plan(None, wd());
        assert_eq!(plan.breaks, BreakChange::Untouched);
    }

    #[test]
    fn blank_break_rows_keep_stored_intervals() {
        let payload = json!({"breaks": [{"start": "", "end": ""}, {"start": "  "}]});
        let plan = merge_plan(Some(&payload), wd());
        assert_eq!(plan.breaks, BreakChange::Untouched);
    }

    #[test]
    fn single_sided_rows_are_completed_by_ten_minutes() {
        let payload = json!({"breaks": [
            {"start": "12:00"},
            {"end": "15:30"},
        ]});
        let plan = merge_plan(Some(&payload), wd());
        assert_eq!(
            plan.breaks,
            BreakChange::Replace {
                rows: vec![
                    (dt("2025-10-01 12:00:00"), dt("2025-10-01 12:10:00")),
                    (dt("2025-10-01 15:20:00"), dt("2025-10-01 15:30:00")),
                ],
                total_minutes: 20,
            }
        );
    }

    #[test]
    fn inverted_rows_are_discarded_but_the_replacement_still_happens() {
        let payload = json!({"breaks": [
            {"start": "13:00", "end": "12:00"},
            {"start": "12:00", "end": "12:00"},
            {"start": "14:00", "end": "14:45"},
        ]});
        let plan = merge_plan(Some(&payload), wd());
        assert_eq!(
            plan.breaks,
            BreakChange::Replace {
                rows: vec![(dt("2025-10-01 14:00:00"), dt("2025-10-01 14:45:00"))],
                total_minutes: 45,
            }
        );
    }

    #[test]
    fn unparsable_time_reads_as_a_clear_not_an_error() {
        let payload = json!({"start_at": "banana", "end_at": null});
        let plan = merge_plan(Some(&payload), wd());
        assert_eq!(plan.start_at, FieldChange::Set(None));
        assert_eq!(plan.end_at, FieldChange::Set(None));
    }

    #[test]
    fn empty_note_is_an_explicit_clear_and_non_strings_are_ignored() {
        let plan = merge_plan(Some(&json!({"note": ""})), wd());
        assert_eq!(plan.note, Some(String::new()));

        let plan = merge_plan(Some(&json!({"note": 42})), wd());
        assert_eq!(plan.note, None);
    }

    #[test]
    fn double_encoded_breaks_are_unwrapped() {
        let payload = json!({"breaks": "[{\"start\":\"12:00\",\"end\":\"12:30\"}]"});
        let plan = merge_plan(Some(&payload), wd());
        match plan.breaks {
            BreakChange::Replace { total_minutes, .. } => assert_eq!(total_minutes, 30),
            other => panic!("expected replacement, got {other:?}"),
        }
    }

    #[test]
    fn field_change_application() {
        let keep: FieldChange<i32> = FieldChange::Untouched;
        assert_eq!(keep.apply(Some(1)), Some(1));
        assert_eq!(FieldChange::Set(Some(2)).apply(Some(1)), Some(2));
        assert_eq!(FieldChange::Set(None).apply(Some(1)), None);
    }

    #[test]
    fn preview_overlays_without_completion() {
        let mut att = Attendance {
            id: 1,
            user_id: 10,
            work_date: wd(),
            start_at: Some(dt("2025-10-01 09:00:00")),
            end_at: None,
            break_minutes: None,
            status: "working".into(),
            note: None,
        };
        let mut breaks = vec![PreviewBreak {
            start_at: Some(dt("2025-10-01 12:00:00")),
            end_at: Some(dt("2025-10-01 12:30:00")),
        }];

        let payload = json!({
            "start_at": "09:15",
            "breaks": [{"start": "13:00"}],
            "note": "preview",
        });
        apply_preview(&mut att, &mut breaks, &payload);

        assert_eq!(att.start_at, Some(dt("2025-10-01 09:15:00")));
        assert_eq!(att.end_at, None);
        assert_eq!(att.note.as_deref(), Some("preview"));
        // the single-sided row is rendered as-is, not repaired
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].start_at, Some(dt("2025-10-01 13:00:00")));
        assert_eq!(breaks[0].end_at, None);
    }
}
