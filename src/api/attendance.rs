use crate::api::{find_attendance_by_id, find_attendance_for_day, load_breaks};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{
    BreakInGate, ClockInStep, ClockOutGate, break_in_decision, break_out_allowed,
    calc_break_minutes, calc_work_minutes, clock_in_decision, clock_out_decision,
};
use crate::model::break_time::BreakTime;
use actix_web::{HttpResponse, web};
use chrono::Local;
use sqlx::MySqlPool;

/// Today's punch state. Purely a read: the attendance row is created
/// lazily on the first clock-in (or by an admin), never by viewing.
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Current punch state for today", body = Object, example = json!({
            "attendance": null,
            "breaks": [],
            "is_clocked_in": false,
            "is_clocked_out": false,
            "is_on_break": false
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("identity_headers" = [])),
    tag = "Attendance"
)]
pub async fn punch_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();
    let today = now.date();

    let attendance = find_attendance_for_day(pool.get_ref(), auth.user_id, today).await?;

    let breaks = match &attendance {
        Some(att) => load_breaks(pool.get_ref(), att.id).await?,
        None => Vec::new(),
    };

    let is_clocked_in = attendance
        .as_ref()
        .map(|a| a.start_at.is_some() && a.end_at.is_none())
        .unwrap_or(false);
    let is_clocked_out = attendance
        .as_ref()
        .map(|a| a.end_at.is_some())
        .unwrap_or(false);
    let is_on_break = breaks.iter().any(|b| b.end_at.is_none());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "attendance": attendance,
        "breaks": breaks,
        "is_clocked_in": is_clocked_in,
        "is_clocked_out": is_clocked_out,
        "is_on_break": is_on_break,
    })))
}

/// Clock-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    responses(
        (status = 200, description = "Clocked in (idempotent while working)", body = Object, example = json!({
            "message": "clocked in"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already clocked out for today", body = Object, example = json!({
            "message": "already clocked out for today"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("identity_headers" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();
    let today = now.date();

    let existing = find_attendance_for_day(pool.get_ref(), auth.user_id, today).await?;

    match clock_in_decision(existing.as_ref()) {
        ClockInStep::CreateRecord => {
            let result = sqlx::query(
                r#"
                INSERT INTO attendances (user_id, work_date, start_at, status)
                VALUES (?, ?, ?, 'working')
                "#,
            )
            .bind(auth.user_id)
            .bind(today)
            .bind(now)
            .execute(pool.get_ref())
            .await;

            if let Err(e) = result {
                // Unique (user_id, work_date): a concurrent punch won the insert
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(AppError::conflict("already clocked in today"));
                    }
                }
                tracing::error!(error = %e, user_id = auth.user_id, "Clock-in failed");
                return Err(AppError::Db(e));
            }
        }
        ClockInStep::SetStartTime => {
            if let Some(att) = &existing {
                sqlx::query("UPDATE attendances SET start_at = ?, status = 'working' WHERE id = ?")
                    .bind(now)
                    .bind(att.id)
                    .execute(pool.get_ref())
                    .await?;
            }
        }
        ClockInStep::AlreadyWorking => {
            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "already clocked in"
            })));
        }
        ClockInStep::AlreadyClockedOut => {
            return Err(AppError::conflict("already clocked out for today"));
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "clocked in"
    })))
}

/// Clock-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    responses(
        (status = 200, description = "Clocked out; minutes finalized", body = Object, example = json!({
            "message": "clocked out",
            "break_minutes": 30,
            "work_minutes": 510
        })),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Not clocked in, or already clocked out", body = Object, example = json!({
            "message": "not clocked in today"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("identity_headers" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();
    let today = now.date();

    let mut tx = pool.begin().await?;

    let existing = find_attendance_for_day(&mut *tx, auth.user_id, today).await?;
    match clock_out_decision(existing.as_ref()) {
        ClockOutGate::NotClockedIn => return Err(AppError::conflict("not clocked in today")),
        ClockOutGate::AlreadyClockedOut => {
            return Err(AppError::conflict("already clocked out for today"));
        }
        ClockOutGate::Ok => {}
    }
    let Some(mut att) = existing else {
        return Err(AppError::conflict("not clocked in today"));
    };

    let mut breaks = load_breaks(&mut *tx, att.id).await?;

    // force-close an open break at the clock-out instant
    let open_id = breaks
        .iter()
        .filter(|b| b.end_at.is_none())
        .max_by_key(|b| b.start_at)
        .map(|b| b.id);
    if let Some(id) = open_id {
        sqlx::query("UPDATE breaks SET end_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for b in breaks.iter_mut() {
            if b.id == id {
                b.end_at = Some(now);
            }
        }
    }

    att.end_at = Some(now);
    let break_minutes = calc_break_minutes(&att, &breaks, now);

    sqlx::query(
        "UPDATE attendances SET end_at = ?, status = 'clocked_out', break_minutes = ? WHERE id = ?",
    )
    .bind(now)
    .bind(break_minutes)
    .bind(att.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    att.break_minutes = Some(break_minutes.max(0) as u32);
    let work_minutes = calc_work_minutes(&att, &breaks, now);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "clocked out",
        "break_minutes": break_minutes,
        "work_minutes": work_minutes,
    })))
}

/// Break-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/break-in",
    responses(
        (status = 200, description = "Break opened", body = Object, example = json!({
            "message": "break started"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Not working, or already on break", body = Object, example = json!({
            "message": "already on break"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("identity_headers" = [])),
    tag = "Attendance"
)]
pub async fn break_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();
    let today = now.date();

    let mut tx = pool.begin().await?;

    let existing = find_attendance_for_day(&mut *tx, auth.user_id, today).await?;
    let open_count: i64 = match &existing {
        Some(att) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM breaks WHERE attendance_id = ? AND end_at IS NULL")
                .bind(att.id)
                .fetch_one(&mut *tx)
                .await?
        }
        None => 0,
    };

    match break_in_decision(existing.as_ref(), open_count > 0) {
        BreakInGate::NotWorking => {
            return Err(AppError::conflict("breaks can only start while clocked in"));
        }
        BreakInGate::AlreadyOnBreak => return Err(AppError::conflict("already on break")),
        BreakInGate::Ok => {}
    }
    let Some(att) = existing else {
        return Err(AppError::conflict("breaks can only start while clocked in"));
    };

    sqlx::query("INSERT INTO breaks (attendance_id, start_at) VALUES (?, ?)")
        .bind(att.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE attendances SET status = 'on_break' WHERE id = ?")
        .bind(att.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "break started"
    })))
}

/// Break-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/break-out",
    responses(
        (status = 200, description = "Break closed; total recomputed", body = Object, example = json!({
            "message": "break ended",
            "break_minutes": 30
        })),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "No open break", body = Object, example = json!({
            "message": "no open break"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("identity_headers" = [])),
    tag = "Attendance"
)]
pub async fn break_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now().naive_local();

    let mut tx = pool.begin().await?;

    let open = sqlx::query_as::<_, BreakTime>(
        r#"
        SELECT b.id, b.attendance_id, b.start_at, b.end_at
        FROM breaks b
        JOIN attendances a ON a.id = b.attendance_id
        WHERE a.user_id = ? AND b.end_at IS NULL
        ORDER BY b.start_at DESC
        LIMIT 1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(open) = open else {
        return Err(AppError::conflict("no open break"));
    };

    let att = find_attendance_by_id(&mut *tx, open.attendance_id)
        .await?
        .ok_or_else(|| AppError::not_found("attendance not found"))?;

    if !break_out_allowed(&att) {
        return Err(AppError::conflict("breaks can only end while clocked in"));
    }

    sqlx::query("UPDATE breaks SET end_at = ? WHERE id = ?")
        .bind(now)
        .bind(open.id)
        .execute(&mut *tx)
        .await?;

    let breaks = load_breaks(&mut *tx, att.id).await?;
    let break_minutes = calc_break_minutes(&att, &breaks, now);

    sqlx::query("UPDATE attendances SET status = 'working', break_minutes = ? WHERE id = ?")
        .bind(break_minutes)
        .bind(att.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "break ended",
        "break_minutes": break_minutes,
    })))
}
