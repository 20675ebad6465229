pub mod admin;
pub mod attendance;
pub mod request;
pub mod timesheet;

use crate::model::attendance::Attendance;
use crate::model::break_time::BreakTime;
use chrono::NaiveDate;
use sqlx::MySql;

pub(crate) async fn find_attendance_for_day<'e, E>(
    executor: E,
    user_id: u64,
    date: NaiveDate,
) -> Result<Option<Attendance>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, user_id, work_date, start_at, end_at, break_minutes, status, note
        FROM attendances
        WHERE user_id = ? AND work_date = ?
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_attendance_by_id<'e, E>(
    executor: E,
    id: u64,
) -> Result<Option<Attendance>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, user_id, work_date, start_at, end_at, break_minutes, status, note
        FROM attendances
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Offset for a 1-based page; saturates instead of overflowing on
/// hostile query values.
pub(crate) fn page_offset(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(per_page)
}

/// Break intervals of one attendance, oldest first.
pub(crate) async fn load_breaks<'e, E>(
    executor: E,
    attendance_id: u64,
) -> Result<Vec<BreakTime>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    sqlx::query_as::<_, BreakTime>(
        r#"
        SELECT id, attendance_id, start_at, end_at
        FROM breaks
        WHERE attendance_id = ?
        ORDER BY start_at
        "#,
    )
    .bind(attendance_id)
    .fetch_all(executor)
    .await
}
