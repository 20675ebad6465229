use crate::api::{find_attendance_by_id, load_breaks, page_offset};
use crate::auth::auth::AuthUser;
use crate::error::{AppError, FieldErrors, push_field_error};
use crate::model::attendance::{
    Attendance, calc_break_minutes, display_break_minutes, live_work_minutes,
};
use crate::model::payload::{BreakChange, merge_plan};
use crate::model::timesheet_request::{ApprovalGate, TimesheetRequest, approval_gate};
use crate::utils::time::{fmt_hm, hm_display, minutes_between, parse_date, parse_hm_strict};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{MySql, MySqlPool, Transaction};
use utoipa::{IntoParams, ToSchema};

const MSG_DATE: &str = "work date is invalid";
const MSG_PUNCH_TIME: &str = "clock-in or clock-out time is invalid";
const MSG_BREAK_TIME: &str = "break time is invalid";

/* =========================
Request review
========================= */

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminRequestQuery {
    /// pending (default) or closed
    pub tab: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, sqlx::FromRow)]
struct RequestJoinRow {
    id: u64,
    user_id: u64,
    attendance_id: u64,
    status: String,
    payload_current: Option<Value>,
    created_at: Option<NaiveDateTime>,
    work_date: NaiveDate,
    att_start_at: Option<NaiveDateTime>,
    att_end_at: Option<NaiveDateTime>,
    att_note: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminRequestRow {
    pub id: u64,
    pub user_id: u64,
    pub attendance_id: u64,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(example = "2025-10-01", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    /// Proposed times for pending rows; merged times for closed ones
    #[schema(example = "09:15", value_type = Option<String>)]
    pub after_start_at: Option<String>,
    #[schema(example = "18:05", value_type = Option<String>)]
    pub after_end_at: Option<String>,
    #[schema(example = "forgot to punch out")]
    pub note: String,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<NaiveDateTime>,
}

fn payload_str<'a>(payload: Option<&'a Value>, key: &str) -> Option<&'a str> {
    payload?.as_object()?.get(key)?.as_str()
}

fn request_row(row: RequestJoinRow) -> AdminRequestRow {
    let pending = row.status == "pending";

    // pending rows show what was asked for, closed rows what was merged
    let (after_start_at, after_end_at) = if pending {
        (
            payload_str(row.payload_current.as_ref(), "start_at").and_then(hm_display),
            payload_str(row.payload_current.as_ref(), "end_at").and_then(hm_display),
        )
    } else {
        (row.att_start_at.map(fmt_hm), row.att_end_at.map(fmt_hm))
    };

    let note = payload_str(row.payload_current.as_ref(), "note")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| row.att_note.clone())
        .unwrap_or_else(|| "-".to_string());

    AdminRequestRow {
        id: row.id,
        user_id: row.user_id,
        attendance_id: row.attendance_id,
        status: row.status,
        work_date: row.work_date,
        after_start_at,
        after_end_at,
        note,
        created_at: row.created_at,
    }
}

/// Review queue across all users
#[utoipa::path(
    get,
    path = "/api/admin/requests",
    params(AdminRequestQuery),
    responses(
        (status = 200, description = "Paginated review queue", body = Object, example = json!({
            "data": [],
            "tab": "pending",
            "pending_count": 0,
            "closed_count": 0,
            "page": 1,
            "per_page": 20,
            "total": 0
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("identity_headers" = [])),
    tag = "Admin"
)]
pub async fn list_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AdminRequestQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let tab = match query.tab.as_deref() {
        Some("closed") => "closed",
        _ => "pending",
    };
    let status = if tab == "closed" { "approved" } else { "pending" };

    let pending_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM requests WHERE status = 'pending'")
            .fetch_one(pool.get_ref())
            .await?;
    let closed_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM requests WHERE status = 'approved'")
            .fetch_one(pool.get_ref())
            .await?;

    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = page_offset(page, per_page);

    let rows = sqlx::query_as::<_, RequestJoinRow>(
        r#"
        SELECT r.id, r.user_id, r.attendance_id, r.status, r.payload_current, r.created_at,
               a.work_date,
               a.start_at AS att_start_at,
               a.end_at AS att_end_at,
               a.note AS att_note
        FROM requests r
        JOIN attendances a ON a.id = r.attendance_id
        WHERE r.status = ?
        ORDER BY r.created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(status)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await?;

    let total = if tab == "closed" { closed_count } else { pending_count };
    let data: Vec<AdminRequestRow> = rows.into_iter().map(request_row).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "data": data,
        "tab": tab,
        "pending_count": pending_count,
        "closed_count": closed_count,
        "page": page,
        "per_page": per_page,
        "total": total,
    })))
}

async fn lock_attendance(
    tx: &mut Transaction<'_, MySql>,
    id: u64,
) -> Result<Option<Attendance>, sqlx::Error> {
    sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, user_id, work_date, start_at, end_at, break_minutes, status, note
        FROM attendances
        WHERE id = ?
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

fn merged_status(att: &Attendance) -> &'static str {
    status_for(att.start_at, att.end_at)
}

/// Approve one request and merge its payload
#[utoipa::path(
    post,
    path = "/api/admin/requests/{id}/approve",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Merged and marked approved", body = Object, example = json!({
            "message": "request approved"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Request or attendance not found"),
        (status = 409, description = "Already processed or superseded", body = Object, example = json!({
            "message": "this request has already been processed"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("identity_headers" = [])),
    tag = "Admin"
)]
pub async fn approve_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let request_id = path.into_inner();
    let now = Local::now().naive_local();

    let request = sqlx::query_as::<_, TimesheetRequest>(
        r#"
        SELECT id, user_id, attendance_id, status, payload_before, payload_current, created_at
        FROM requests
        WHERE id = ?
        "#,
    )
    .bind(request_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("request not found"))?;

    if request.status != "pending" {
        return Err(AppError::conflict("this request has already been processed"));
    }

    let mut tx = pool.begin().await?;

    // lock order: attendance row first, then its request set
    let att = lock_attendance(&mut tx, request.attendance_id)
        .await?
        .ok_or_else(|| AppError::not_found("related attendance not found"))?;

    let siblings: Vec<(u64, String)> = sqlx::query_as(
        "SELECT id, status FROM requests WHERE attendance_id = ? FOR UPDATE",
    )
    .bind(request.attendance_id)
    .fetch_all(&mut *tx)
    .await?;

    match approval_gate(request.id, &siblings) {
        ApprovalGate::Superseded => {
            return Err(AppError::conflict("this request was superseded by another approval"));
        }
        ApprovalGate::AlreadyProcessed => {
            return Err(AppError::conflict("this request has already been processed"));
        }
        ApprovalGate::Ok => {}
    }

    // the newly approved request becomes the day's sole audit trail
    sqlx::query("DELETE FROM requests WHERE attendance_id = ? AND status = 'approved' AND id != ?")
        .bind(request.attendance_id)
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

    let plan = merge_plan(request.payload_current.as_ref(), att.work_date);

    let mut merged = att.clone();
    merged.start_at = plan.start_at.apply(att.start_at);
    merged.end_at = plan.end_at.apply(att.end_at);

    let break_minutes: i64 = match &plan.breaks {
        BreakChange::Replace { rows, total_minutes } => {
            sqlx::query("DELETE FROM breaks WHERE attendance_id = ?")
                .bind(att.id)
                .execute(&mut *tx)
                .await?;
            for (s, e) in rows {
                sqlx::query("INSERT INTO breaks (attendance_id, start_at, end_at) VALUES (?, ?, ?)")
                    .bind(att.id)
                    .bind(s)
                    .bind(e)
                    .execute(&mut *tx)
                    .await?;
            }
            *total_minutes
        }
        BreakChange::Untouched => {
            let breaks = load_breaks(&mut *tx, att.id).await?;
            calc_break_minutes(&merged, &breaks, now)
        }
    };

    let note = match plan.note {
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(s),
        None => att.note.clone(),
    };

    sqlx::query(
        r#"
        UPDATE attendances
        SET start_at = ?, end_at = ?, break_minutes = ?, note = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(merged.start_at)
    .bind(merged.end_at)
    .bind(break_minutes)
    .bind(&note)
    .bind(merged_status(&merged))
    .bind(att.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE requests SET status = 'approved' WHERE id = ?")
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(request_id = request.id, attendance_id = att.id, admin_id = auth.user_id,
        "Correction request approved");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "request approved"
    })))
}

/* =========================
Attendance administration
========================= */

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminDayQuery {
    /// Work date, YYYY-MM-DD; defaults to today
    pub date: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminAttendanceRow {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2025-10-01", format = "date", value_type = String)]
    pub work_date: NaiveDate,
    #[schema(example = "09:00", value_type = Option<String>)]
    pub clock_in: Option<String>,
    #[schema(example = "18:00", value_type = Option<String>)]
    pub clock_out: Option<String>,
    pub break_minutes: Option<i64>,
    pub work_minutes: Option<i64>,
    #[schema(example = "clocked_out")]
    pub status: String,
    pub note: Option<String>,
}

fn attendance_row(
    att: &Attendance,
    breaks: &[crate::model::break_time::BreakTime],
    now: NaiveDateTime,
) -> AdminAttendanceRow {
    AdminAttendanceRow {
        id: att.id,
        user_id: att.user_id,
        work_date: att.work_date,
        clock_in: att.start_at.map(fmt_hm),
        clock_out: att.end_at.map(fmt_hm),
        break_minutes: display_break_minutes(att, breaks, now),
        work_minutes: live_work_minutes(att, breaks, now),
        status: att.status.clone(),
        note: att.note.clone(),
    }
}

/// All attendance records of one day
#[utoipa::path(
    get,
    path = "/api/admin/attendances",
    params(AdminDayQuery),
    responses(
        (status = 200, description = "Records of the day", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("identity_headers" = [])),
    tag = "Admin"
)]
pub async fn list_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AdminDayQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let now = Local::now().naive_local();

    let date = query
        .date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or_else(|| now.date());

    let attendances = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, user_id, work_date, start_at, end_at, break_minutes, status, note
        FROM attendances
        WHERE work_date = ?
        ORDER BY user_id
        "#,
    )
    .bind(date)
    .fetch_all(pool.get_ref())
    .await?;

    let mut rows = Vec::with_capacity(attendances.len());
    for att in &attendances {
        let breaks = load_breaks(pool.get_ref(), att.id).await?;
        rows.push(attendance_row(att, &breaks, now));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "date": date,
        "data": rows,
    })))
}

/// One record with its break intervals
#[utoipa::path(
    get,
    path = "/api/admin/attendances/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    responses(
        (status = 200, description = "Record detail", body = Object),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance not found")
    ),
    security(("identity_headers" = [])),
    tag = "Admin"
)]
pub async fn show_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let now = Local::now().naive_local();

    let att = find_attendance_by_id(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("attendance not found"))?;
    let breaks = load_breaks(pool.get_ref(), att.id).await?;

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM requests WHERE attendance_id = ? AND status = 'pending'",
    )
    .bind(att.id)
    .fetch_one(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "attendance": att,
        "breaks": breaks,
        "summary": attendance_row(&att, &breaks, now),
        "is_pending_approval": pending > 0,
    })))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminBreakRow {
    #[serde(default, alias = "start")]
    #[schema(example = "12:00", value_type = Option<String>)]
    pub start_at: Option<String>,
    #[serde(default, alias = "end")]
    #[schema(example = "12:30", value_type = Option<String>)]
    pub end_at: Option<String>,
}

/// Admin-entered record. Times are `HH:MM` of the work date; break rows
/// must be complete pairs.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminAttendanceForm {
    #[schema(example = 10)]
    pub user_id: u64,
    #[schema(example = "2025-10-01", value_type = String)]
    pub work_date: String,
    #[serde(default)]
    #[schema(example = "09:00", value_type = Option<String>)]
    pub start_at: Option<String>,
    #[serde(default)]
    #[schema(example = "18:00", value_type = Option<String>)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub breaks: Vec<AdminBreakRow>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminAttendanceUpdate {
    #[serde(default)]
    #[schema(example = "09:00", value_type = Option<String>)]
    pub start_at: Option<String>,
    #[serde(default)]
    #[schema(example = "18:00", value_type = Option<String>)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub breaks: Vec<AdminBreakRow>,
    #[serde(default)]
    pub note: Option<String>,
}

struct ValidatedTimes {
    start_at: Option<chrono::NaiveTime>,
    end_at: Option<chrono::NaiveTime>,
    breaks: Vec<(chrono::NaiveTime, chrono::NaiveTime)>,
}

/// Shared validation for admin create and update. Unlike user
/// corrections a note is optional and break rows must be full pairs
/// outright, no completion happens later.
fn validate_times(
    start_at: Option<&str>,
    end_at: Option<&str>,
    breaks: &[AdminBreakRow],
    errors: &mut FieldErrors,
) -> ValidatedTimes {
    let parse = |raw: Option<&str>| -> Result<Option<chrono::NaiveTime>, ()> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(v) => parse_hm_strict(v).map(Some).ok_or(()),
        }
    };

    let start = parse(start_at);
    let end = parse(end_at);
    if start.is_err() {
        push_field_error(errors, "start_at", MSG_PUNCH_TIME);
    }
    if end.is_err() {
        push_field_error(errors, "end_at", MSG_PUNCH_TIME);
    }
    let start = start.unwrap_or(None);
    let end = end.unwrap_or(None);
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            push_field_error(errors, "start_at", MSG_PUNCH_TIME);
            push_field_error(errors, "end_at", MSG_PUNCH_TIME);
        }
    }

    let mut pairs = Vec::new();
    for (i, row) in breaks.iter().enumerate() {
        let s_raw = row.start_at.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let e_raw = row.end_at.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if s_raw.is_none() && e_raw.is_none() {
            continue;
        }

        let bs = s_raw.and_then(parse_hm_strict);
        let be = e_raw.and_then(parse_hm_strict);
        if bs.is_none() {
            push_field_error(errors, format!("breaks.{i}.start_at"), MSG_BREAK_TIME);
        }
        if be.is_none() {
            push_field_error(errors, format!("breaks.{i}.end_at"), MSG_BREAK_TIME);
        }
        let (Some(bs), Some(be)) = (bs, be) else { continue };

        if be <= bs {
            push_field_error(errors, format!("breaks.{i}.end_at"), MSG_BREAK_TIME);
            continue;
        }
        pairs.push((bs, be));
    }

    ValidatedTimes { start_at: start, end_at: end, breaks: pairs }
}

async fn replace_breaks(
    tx: &mut Transaction<'_, MySql>,
    attendance_id: u64,
    work_date: NaiveDate,
    pairs: &[(chrono::NaiveTime, chrono::NaiveTime)],
) -> Result<i64, sqlx::Error> {
    sqlx::query("DELETE FROM breaks WHERE attendance_id = ?")
        .bind(attendance_id)
        .execute(&mut **tx)
        .await?;

    let mut total = 0i64;
    for (s, e) in pairs {
        let (s, e) = (work_date.and_time(*s), work_date.and_time(*e));
        total += minutes_between(s, e);
        sqlx::query("INSERT INTO breaks (attendance_id, start_at, end_at) VALUES (?, ?, ?)")
            .bind(attendance_id)
            .bind(s)
            .bind(e)
            .execute(&mut **tx)
            .await?;
    }
    Ok(total)
}

fn status_for(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> &'static str {
    match (start, end) {
        (Some(_), Some(_)) => "clocked_out",
        (Some(_), None) => "working",
        _ => "off",
    }
}

/// Create a record on a user's behalf
#[utoipa::path(
    post,
    path = "/api/admin/attendances",
    request_body(content = AdminAttendanceForm, content_type = "application/json"),
    responses(
        (status = 200, description = "Record created", body = Object, example = json!({
            "message": "attendance created",
            "id": 1
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Record already exists for that user and date"),
        (status = 422, description = "Validation failed")
    ),
    security(("identity_headers" = [])),
    tag = "Admin"
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AdminAttendanceForm>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let form = payload.into_inner();

    let mut errors = FieldErrors::new();
    let work_date = parse_date(form.work_date.trim());
    if work_date.is_none() {
        push_field_error(&mut errors, "work_date", MSG_DATE);
    }
    let times = validate_times(
        form.start_at.as_deref(),
        form.end_at.as_deref(),
        &form.breaks,
        &mut errors,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let Some(work_date) = work_date else {
        return Err(AppError::Validation(errors));
    };

    let start_at = times.start_at.map(|t| work_date.and_time(t));
    let end_at = times.end_at.map(|t| work_date.and_time(t));
    let note = form.note.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendances (user_id, work_date, start_at, end_at, status, note)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(form.user_id)
    .bind(work_date)
    .bind(start_at)
    .bind(end_at)
    .bind(status_for(start_at, end_at))
    .bind(note)
    .execute(&mut *tx)
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Err(AppError::conflict(
                        "an attendance already exists for this user and date",
                    ));
                }
            }
            tracing::error!(error = %e, user_id = form.user_id, "Admin attendance insert failed");
            return Err(AppError::Db(e));
        }
    };
    let id = result.last_insert_id();

    let total = replace_breaks(&mut tx, id, work_date, &times.breaks).await?;
    sqlx::query("UPDATE attendances SET break_minutes = ? WHERE id = ?")
        .bind(total)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "attendance created",
        "id": id,
    })))
}

/// Wholesale replace of punches, breaks and note
#[utoipa::path(
    put,
    path = "/api/admin/attendances/{id}",
    params(("id" = u64, Path, description = "Attendance id")),
    request_body(content = AdminAttendanceUpdate, content_type = "application/json"),
    responses(
        (status = 200, description = "Record updated", body = Object, example = json!({
            "message": "attendance updated",
            "break_minutes": 30
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Attendance not found"),
        (status = 422, description = "Validation failed")
    ),
    security(("identity_headers" = [])),
    tag = "Admin"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AdminAttendanceUpdate>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let form = payload.into_inner();

    let mut tx = pool.begin().await?;

    let att = lock_attendance(&mut tx, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("attendance not found"))?;

    let mut errors = FieldErrors::new();
    let times = validate_times(
        form.start_at.as_deref(),
        form.end_at.as_deref(),
        &form.breaks,
        &mut errors,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let start_at = times.start_at.map(|t| att.work_date.and_time(t));
    let end_at = times.end_at.map(|t| att.work_date.and_time(t));
    let note = form.note.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let total = replace_breaks(&mut tx, att.id, att.work_date, &times.breaks).await?;

    sqlx::query(
        r#"
        UPDATE attendances
        SET start_at = ?, end_at = ?, break_minutes = ?, note = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(start_at)
    .bind(end_at)
    .bind(total)
    .bind(note)
    .bind(status_for(start_at, end_at))
    .bind(att.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(attendance_id = att.id, admin_id = auth.user_id, "Attendance edited");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "attendance updated",
        "break_minutes": total,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(v: Vec<(Option<&str>, Option<&str>)>) -> Vec<AdminBreakRow> {
        v.into_iter()
            .map(|(s, e)| AdminBreakRow {
                start_at: s.map(str::to_string),
                end_at: e.map(str::to_string),
            })
            .collect()
    }

    #[test]
    fn clean_times_validate_and_anchor() {
        let mut errors = FieldErrors::new();
        let t = validate_times(
            Some("09:00"),
            Some("18:00"),
            &rows(vec![(Some("12:00"), Some("12:30"))]),
            &mut errors,
        );
        assert!(errors.is_empty());
        assert_eq!(t.breaks.len(), 1);
        assert!(t.start_at.is_some() && t.end_at.is_some());
    }

    #[test]
    fn admin_breaks_must_be_complete_pairs() {
        let mut errors = FieldErrors::new();
        let t = validate_times(
            Some("09:00"),
            Some("18:00"),
            &rows(vec![(Some("12:00"), None)]),
            &mut errors,
        );
        assert!(errors.contains_key("breaks.0.end_at"));
        assert!(t.breaks.is_empty());
    }

    #[test]
    fn inverted_and_empty_rows() {
        let mut errors = FieldErrors::new();
        let t = validate_times(
            None,
            None,
            &rows(vec![
                (Some("13:00"), Some("12:00")),
                (Some(""), Some("  ")),
            ]),
            &mut errors,
        );
        assert!(errors.contains_key("breaks.0.end_at"));
        assert!(!errors.contains_key("breaks.1.start_at"));
        assert!(t.breaks.is_empty());
    }

    #[test]
    fn inverted_work_span_is_rejected() {
        let mut errors = FieldErrors::new();
        validate_times(Some("18:00"), Some("09:00"), &[], &mut errors);
        assert!(errors.contains_key("start_at"));
        assert!(errors.contains_key("end_at"));
    }

    #[test]
    fn status_follows_the_punches() {
        let dt = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(status_for(None, None), "off");
        assert_eq!(status_for(Some(dt("2025-10-01 09:00:00")), None), "working");
        assert_eq!(
            status_for(Some(dt("2025-10-01 09:00:00")), Some(dt("2025-10-01 18:00:00"))),
            "clocked_out"
        );
    }

    #[test]
    fn pending_listing_reads_the_payload_and_closed_reads_the_record() {
        let dt = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        let base = || RequestJoinRow {
            id: 1,
            user_id: 10,
            attendance_id: 7,
            status: "pending".into(),
            payload_current: Some(json!({"start_at": "9:15", "end_at": "18:05", "note": "fix"})),
            created_at: None,
            work_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            att_start_at: Some(dt("2025-10-01 09:00:00")),
            att_end_at: Some(dt("2025-10-01 18:00:00")),
            att_note: Some("old".into()),
        };

        let pending = request_row(base());
        assert_eq!(pending.after_start_at.as_deref(), Some("09:15"));
        assert_eq!(pending.after_end_at.as_deref(), Some("18:05"));
        assert_eq!(pending.note, "fix");

        let mut closed = base();
        closed.status = "approved".into();
        let closed = request_row(closed);
        assert_eq!(closed.after_start_at.as_deref(), Some("09:00"));
        assert_eq!(closed.after_end_at.as_deref(), Some("18:00"));
    }

    #[test]
    fn note_falls_back_to_the_record_then_a_dash() {
        let row = |att_note: Option<&str>| RequestJoinRow {
            id: 1,
            user_id: 10,
            attendance_id: 7,
            status: "pending".into(),
            payload_current: Some(json!({"note": "  "})),
            created_at: None,
            work_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            att_start_at: None,
            att_end_at: None,
            att_note: att_note.map(str::to_string),
        };

        assert_eq!(request_row(row(Some("record note"))).note, "record note");
        assert_eq!(request_row(row(None)).note, "-");
    }
}
