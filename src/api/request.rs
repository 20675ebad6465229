use crate::api::{load_breaks, page_offset};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, FieldErrors, push_field_error};
use crate::model::attendance::Attendance;
use crate::utils::time::{end_of_day, fmt_full, month_bounds, parse_hm_strict, parse_month};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

const MSG_PUNCH_TIME: &str = "clock-in or clock-out time is invalid";
const MSG_BREAK_TIME: &str = "break time is invalid";
const MSG_BREAK_OR_OUT: &str = "break time or clock-out time is invalid";
const MSG_NOTE_REQUIRED: &str = "a note is required";
const MSG_NOTE_TOO_LONG: &str = "note must be 255 characters or fewer";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BreakRowForm {
    #[schema(example = "12:00", value_type = Option<String>)]
    #[serde(default)]
    pub start_at: Option<String>,
    #[schema(example = "12:30", value_type = Option<String>)]
    #[serde(default)]
    pub end_at: Option<String>,
}

/// Correction proposal for one past attendance record. Times are sent
/// as `HH:MM` of the record's work date.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CorrectionForm {
    #[schema(example = 1)]
    pub attendance_id: u64,
    #[schema(example = "09:15", value_type = Option<String>)]
    #[serde(default)]
    pub start_at: Option<String>,
    #[schema(example = "18:05", value_type = Option<String>)]
    #[serde(default)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub breaks: Vec<BreakRowForm>,
    #[schema(example = "forgot to punch out", value_type = Option<String>)]
    #[serde(default)]
    pub note: Option<String>,
}

/// Submission-side parse state. Strict here; the read/merge side is
/// deliberately lenient instead.
enum Hm {
    Empty,
    Invalid,
    Valid(NaiveTime),
}

fn parse_field(raw: Option<&str>) -> Hm {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Hm::Empty,
        Some(v) => match parse_hm_strict(v) {
            Some(t) => Hm::Valid(t),
            None => Hm::Invalid,
        },
    }
}

/// All checks run; every failure is reported, and any failure rejects
/// the whole submission.
pub fn validate_correction(form: &CorrectionForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let start = parse_field(form.start_at.as_deref());
    let end = parse_field(form.end_at.as_deref());

    if matches!(start, Hm::Invalid) {
        push_field_error(&mut errors, "start_at", MSG_PUNCH_TIME);
    }
    if matches!(end, Hm::Invalid) {
        push_field_error(&mut errors, "end_at", MSG_PUNCH_TIME);
    }
    if let (Hm::Valid(s), Hm::Valid(e)) = (&start, &end) {
        if s > e {
            push_field_error(&mut errors, "start_at", MSG_PUNCH_TIME);
            push_field_error(&mut errors, "end_at", MSG_PUNCH_TIME);
        }
    }

    for (i, row) in form.breaks.iter().enumerate() {
        let s_raw = row.start_at.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let e_raw = row.end_at.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if s_raw.is_none() && e_raw.is_none() {
            continue;
        }

        // a break row without a clock-out time makes no sense
        if matches!(end, Hm::Empty) {
            push_field_error(&mut errors, "end_at", MSG_BREAK_OR_OUT);
        }

        // pair completeness
        if s_raw.is_none() {
            push_field_error(&mut errors, format!("breaks.{i}.start_at"), MSG_BREAK_TIME);
        }
        if e_raw.is_none() {
            push_field_error(&mut errors, format!("breaks.{i}.end_at"), MSG_BREAK_OR_OUT);
        }

        let b_start = match s_raw {
            Some(v) => match parse_hm_strict(v) {
                Some(t) => Some(t),
                None => {
                    push_field_error(&mut errors, format!("breaks.{i}.start_at"), MSG_BREAK_TIME);
                    None
                }
            },
            None => None,
        };
        let b_end = match e_raw {
            Some(v) => match parse_hm_strict(v) {
                Some(t) => Some(t),
                None => {
                    push_field_error(&mut errors, format!("breaks.{i}.end_at"), MSG_BREAK_OR_OUT);
                    None
                }
            },
            None => None,
        };

        if let (Some(bs), Hm::Valid(s)) = (&b_start, &start) {
            if bs < s {
                push_field_error(&mut errors, format!("breaks.{i}.start_at"), MSG_BREAK_TIME);
            }
        }
        if let (Some(bs), Hm::Valid(e)) = (&b_start, &end) {
            if bs > e {
                push_field_error(&mut errors, format!("breaks.{i}.start_at"), MSG_BREAK_TIME);
            }
        }
        if let (Some(be), Hm::Valid(e)) = (&b_end, &end) {
            if be > e {
                push_field_error(&mut errors, format!("breaks.{i}.end_at"), MSG_BREAK_OR_OUT);
            }
        }
        if let (Some(bs), Some(be)) = (&b_start, &b_end) {
            if be < bs {
                push_field_error(&mut errors, format!("breaks.{i}.end_at"), MSG_BREAK_TIME);
            }
        }
    }

    match form.note.as_deref().map(str::trim) {
        None | Some("") => push_field_error(&mut errors, "note", MSG_NOTE_REQUIRED),
        Some(note) if note.chars().count() > 255 => {
            push_field_error(&mut errors, "note", MSG_NOTE_TOO_LONG);
        }
        Some(_) => {}
    }

    errors
}

/// Submit a correction request
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body(
        content = CorrectionForm,
        description = "Correction request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Correction request queued", body = Object, example = json!({
            "message": "correction request submitted",
            "status": "pending"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Attendance not found"),
        (status = 409, description = "A pending request already exists", body = Object, example = json!({
            "message": "a correction is already awaiting approval for this day"
        })),
        (status = 422, description = "Validation failed", body = Object, example = json!({
            "message": "validation failed",
            "errors": {"note": ["a note is required"]}
        }))
    ),
    security(("identity_headers" = [])),
    tag = "Requests"
)]
pub async fn submit_correction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CorrectionForm>,
) -> Result<HttpResponse, AppError> {
    let form = payload.into_inner();

    let errors = validate_correction(&form);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let att = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, user_id, work_date, start_at, end_at, break_minutes, status, note
        FROM attendances
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(form.attendance_id)
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("attendance not found"))?;

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM requests WHERE attendance_id = ? AND user_id = ? AND status = 'pending'",
    )
    .bind(att.id)
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await?;
    if pending > 0 {
        return Err(AppError::conflict(
            "a correction is already awaiting approval for this day",
        ));
    }

    let breaks = load_breaks(pool.get_ref(), att.id).await?;

    // audit-only snapshot of the record as submitted against
    let payload_before = serde_json::json!({
        "start_at": att.start_at.map(fmt_full),
        "end_at": att.end_at.map(fmt_full),
        "breaks": breaks.iter().map(|b| serde_json::json!({
            "start_at": fmt_full(b.start_at),
            "end_at": b.end_at.map(fmt_full),
        })).collect::<Vec<_>>(),
        "note": att.note,
    });

    let non_blank = |v: &Option<String>| {
        v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    };
    let after_breaks: Vec<serde_json::Value> = form
        .breaks
        .iter()
        .filter_map(|row| {
            let s = non_blank(&row.start_at);
            let e = non_blank(&row.end_at);
            if s.is_none() && e.is_none() {
                None
            } else {
                Some(serde_json::json!({ "start_at": s, "end_at": e }))
            }
        })
        .collect();

    let payload_current = serde_json::json!({
        "start_at": non_blank(&form.start_at),
        "end_at": non_blank(&form.end_at),
        "breaks": after_breaks,
        "note": form.note,
    });

    sqlx::query(
        r#"
        INSERT INTO requests (user_id, attendance_id, status, payload_before, payload_current)
        VALUES (?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(att.id)
    .bind(payload_before)
    .bind(payload_current)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, attendance_id = att.id,
            "Failed to store correction request");
        AppError::Db(e)
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "correction request submitted",
        "status": "pending",
    })))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RequestListQuery {
    /// Month filter on created_at, YYYY-MM; invalid values fall back to
    /// the current month
    pub month: Option<String>,
    /// pending (default) or approved; anything else coerces to pending
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct MyRequestRow {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 7)]
    pub attendance_id: u64,
    #[schema(example = "pending", value_type = String)]
    pub status: String,
    #[schema(example = "2025-10-01", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(value_type = Object)]
    pub payload_current: Option<serde_json::Value>,
    #[schema(example = "2025-10-02T08:00:00", format = "date-time", value_type = Option<String>)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Serialize, ToSchema)]
pub struct RequestListResponse {
    pub data: Vec<MyRequestRow>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// Own correction requests, newest first
#[utoipa::path(
    get,
    path = "/api/requests",
    params(RequestListQuery),
    responses(
        (status = 200, description = "Paginated request list", body = RequestListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("identity_headers" = [])),
    tag = "Requests"
)]
pub async fn list_my_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RequestListQuery>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();

    let status = match query.status.as_deref() {
        Some("approved") => "approved",
        _ => "pending",
    };
    let first = query
        .month
        .as_deref()
        .and_then(parse_month)
        .unwrap_or_else(|| month_bounds(now.date()).0);
    let (start, last) = month_bounds(first);
    let period_start = start.and_time(chrono::NaiveTime::MIN);
    let period_end = end_of_day(last);

    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = page_offset(page, per_page);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM requests
        WHERE user_id = ? AND status = ? AND created_at BETWEEN ? AND ?
        "#,
    )
    .bind(auth.user_id)
    .bind(status)
    .bind(period_start)
    .bind(period_end)
    .fetch_one(pool.get_ref())
    .await?;

    let data = sqlx::query_as::<_, MyRequestRow>(
        r#"
        SELECT r.id, r.attendance_id, r.status, a.work_date, r.payload_current, r.created_at
        FROM requests r
        JOIN attendances a ON a.id = r.attendance_id
        WHERE r.user_id = ? AND r.status = ? AND r.created_at BETWEEN ? AND ?
        ORDER BY r.created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(auth.user_id)
    .bind(status)
    .bind(period_start)
    .bind(period_end)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(RequestListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(
        start: Option<&str>,
        end: Option<&str>,
        breaks: Vec<(Option<&str>, Option<&str>)>,
        note: Option<&str>,
    ) -> CorrectionForm {
        CorrectionForm {
            attendance_id: 1,
            start_at: start.map(str::to_string),
            end_at: end.map(str::to_string),
            breaks: breaks
                .into_iter()
                .map(|(s, e)| BreakRowForm {
                    start_at: s.map(str::to_string),
                    end_at: e.map(str::to_string),
                })
                .collect(),
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn a_clean_submission_passes() {
        let f = form(
            Some("09:00"),
            Some("18:00"),
            vec![(Some("12:00"), Some("12:30"))],
            Some("fixed the missing punch"),
        );
        assert!(validate_correction(&f).is_empty());
    }

    #[test]
    fn every_failure_is_reported_at_once() {
        // malformed start, inverted break, missing note
        let f = form(
            Some("9:00"),
            Some("18:00"),
            vec![(Some("13:00"), Some("12:00"))],
            None,
        );
        let errors = validate_correction(&f);
        assert!(errors.contains_key("start_at"));
        assert!(errors.contains_key("breaks.0.end_at"));
        assert!(errors.contains_key("note"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn inverted_work_span_flags_both_fields() {
        let f = form(Some("18:00"), Some("09:00"), vec![], Some("note"));
        let errors = validate_correction(&f);
        assert_eq!(errors.get("start_at").map(Vec::len), Some(1));
        assert_eq!(errors.get("end_at").map(Vec::len), Some(1));
    }

    #[test]
    fn incomplete_break_pair_is_rejected() {
        let f = form(
            Some("09:00"),
            Some("18:00"),
            vec![(Some("12:00"), None)],
            Some("note"),
        );
        let errors = validate_correction(&f);
        assert!(errors.contains_key("breaks.0.end_at"));
    }

    #[test]
    fn blank_break_rows_are_ignored() {
        let f = form(
            Some("09:00"),
            Some("18:00"),
            vec![(Some(""), Some("  ")), (None, None)],
            Some("note"),
        );
        assert!(validate_correction(&f).is_empty());
    }

    #[test]
    fn breaks_must_sit_inside_the_work_span() {
        let f = form(
            Some("09:00"),
            Some("18:00"),
            vec![
                (Some("08:00"), Some("08:30")),
                (Some("17:50"), Some("18:10")),
            ],
            Some("note"),
        );
        let errors = validate_correction(&f);
        assert!(errors.contains_key("breaks.0.start_at"));
        assert!(errors.contains_key("breaks.1.end_at"));
    }

    #[test]
    fn break_rows_require_a_clock_out_time() {
        let f = form(
            Some("09:00"),
            None,
            vec![(Some("12:00"), Some("12:30"))],
            Some("note"),
        );
        let errors = validate_correction(&f);
        assert_eq!(
            errors.get("end_at").map(|v| v.as_slice()),
            Some([MSG_BREAK_OR_OUT.to_string()].as_slice())
        );
    }

    #[test]
    fn note_length_is_capped() {
        let long = "x".repeat(256);
        let f = form(Some("09:00"), Some("18:00"), vec![], Some(&long));
        let errors = validate_correction(&f);
        assert!(errors.contains_key("note"));
    }

    #[test]
    fn strict_format_asymmetry_rejects_what_the_merge_would_accept() {
        // "9:00" merges fine but must not validate
        let f = form(Some("9:00"), Some("18:00"), vec![], Some("note"));
        assert!(validate_correction(&f).contains_key("start_at"));
    }
}
