use chrono::NaiveDateTime;
use serde::Serialize;

/// One break interval owned by an attendance record. `end_at` is NULL
/// while the break is still open; at most one open row per attendance.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BreakTime {
    pub id: u64,
    pub attendance_id: u64,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
}
