use crate::api::{find_attendance_for_day, load_breaks};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{Attendance, display_break_minutes, live_work_minutes};
use crate::model::break_time::BreakTime;
use crate::model::payload::{PreviewBreak, apply_preview};
use crate::utils::time::{
    fmt_hm, month_bounds, month_label, next_month, parse_date, parse_month, prev_month,
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TimesheetQuery {
    /// Month to display, YYYY-MM; invalid or absent falls back to the
    /// current month
    pub month: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DayQuery {
    /// Pending request id whose payload is overlaid for preview
    pub request_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct TimesheetRow {
    #[schema(example = "2025-10-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00", value_type = Option<String>)]
    pub clock_in: Option<String>,
    #[schema(example = "18:00", value_type = Option<String>)]
    pub clock_out: Option<String>,
    /// Cached value preferred; live recompute for in-progress days;
    /// null when there was no clock-in
    #[schema(example = 30)]
    pub break_minutes: Option<i64>,
    #[schema(example = 510)]
    pub work_minutes: Option<i64>,
    pub attendance_id: Option<u64>,
    #[schema(example = "clocked_out", value_type = Option<String>)]
    pub status: Option<String>,
}

/// One row per calendar day of the requested month.
#[utoipa::path(
    get,
    path = "/api/timesheet",
    params(TimesheetQuery),
    responses(
        (status = 200, description = "Month of attendance rows", body = Object),
        (status = 401, description = "Unauthorized")
    ),
    security(("identity_headers" = [])),
    tag = "Timesheet"
)]
pub async fn month_index(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimesheetQuery>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();
    let first = query
        .month
        .as_deref()
        .and_then(parse_month)
        .unwrap_or_else(|| month_bounds(now.date()).0);
    let (start, last) = month_bounds(first);

    let attendances = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, user_id, work_date, start_at, end_at, break_minutes, status, note
        FROM attendances
        WHERE user_id = ? AND work_date BETWEEN ? AND ?
        ORDER BY work_date
        "#,
    )
    .bind(auth.user_id)
    .bind(start)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?;

    let break_rows = sqlx::query_as::<_, BreakTime>(
        r#"
        SELECT b.id, b.attendance_id, b.start_at, b.end_at
        FROM breaks b
        JOIN attendances a ON a.id = b.attendance_id
        WHERE a.user_id = ? AND a.work_date BETWEEN ? AND ?
        ORDER BY b.start_at
        "#,
    )
    .bind(auth.user_id)
    .bind(start)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?;

    let mut breaks_by_attendance: HashMap<u64, Vec<BreakTime>> = HashMap::new();
    for b in break_rows {
        breaks_by_attendance.entry(b.attendance_id).or_default().push(b);
    }
    let by_date: HashMap<NaiveDate, Attendance> =
        attendances.into_iter().map(|a| (a.work_date, a)).collect();

    let mut rows = Vec::new();
    let mut day = start;
    loop {
        let row = match by_date.get(&day) {
            Some(att) => {
                let empty = Vec::new();
                let breaks = breaks_by_attendance.get(&att.id).unwrap_or(&empty);
                TimesheetRow {
                    date: day,
                    clock_in: att.start_at.map(fmt_hm),
                    clock_out: att.end_at.map(fmt_hm),
                    break_minutes: display_break_minutes(att, breaks, now),
                    work_minutes: live_work_minutes(att, breaks, now),
                    attendance_id: Some(att.id),
                    status: Some(att.status.clone()),
                }
            }
            None => TimesheetRow {
                date: day,
                clock_in: None,
                clock_out: None,
                break_minutes: None,
                work_minutes: None,
                attendance_id: None,
                status: None,
            },
        };
        rows.push(row);

        if day >= last {
            break;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "month": month_label(first),
        "prev_month": month_label(prev_month(first)),
        "next_month": month_label(next_month(first)),
        "rows": rows,
    })))
}

/// Single day view. With `request_id` the pending payload is overlaid
/// onto the snapshot for preview; nothing is persisted.
#[utoipa::path(
    get,
    path = "/api/timesheet/{date}",
    params(
        ("date" = String, Path, description = "Work date, YYYY-MM-DD"),
        DayQuery
    ),
    responses(
        (status = 200, description = "Day snapshot, possibly previewed", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Malformed date")
    ),
    security(("identity_headers" = [])),
    tag = "Timesheet"
)]
pub async fn show_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    query: web::Query<DayQuery>,
) -> Result<HttpResponse, AppError> {
    let date = parse_date(&path.into_inner())
        .ok_or_else(|| AppError::not_found("not found"))?;

    let attendance = find_attendance_for_day(pool.get_ref(), auth.user_id, date).await?;

    let Some(mut att) = attendance else {
        // no record yet: an empty snapshot keeps the day renderable
        return Ok(HttpResponse::Ok().json(serde_json::json!({
            "work_date": date,
            "attendance": serde_json::Value::Null,
            "breaks": [],
            "is_pending_approval": false,
        })));
    };

    let breaks = load_breaks(pool.get_ref(), att.id).await?;
    let mut view: Vec<PreviewBreak> = breaks.iter().map(PreviewBreak::from).collect();

    if let Some(request_id) = query.request_id {
        let payload: Option<Option<serde_json::Value>> = sqlx::query_scalar(
            "SELECT payload_current FROM requests WHERE id = ? AND attendance_id = ? AND user_id = ?",
        )
        .bind(request_id)
        .bind(att.id)
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await?;

        if let Some(Some(payload)) = payload {
            apply_preview(&mut att, &mut view, &payload);
        }
    }

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM requests WHERE attendance_id = ? AND user_id = ? AND status = 'pending'",
    )
    .bind(att.id)
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "work_date": date,
        "attendance": att,
        "breaks": view,
        "is_pending_approval": pending > 0,
    })))
}
