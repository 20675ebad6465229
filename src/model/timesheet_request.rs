use chrono::NaiveDateTime;
use serde::Serialize;
use strum_macros::{Display, EnumString};

/// A user-submitted correction proposal. `payload_before` is an
/// audit-only snapshot taken at submission time and is never replayed;
/// `payload_current` holds the desired new values.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TimesheetRequest {
    pub id: u64,
    pub user_id: u64,
    pub attendance_id: u64,
    pub status: String,
    pub payload_before: Option<serde_json::Value>,
    pub payload_current: Option<serde_json::Value>,
    pub created_at: Option<NaiveDateTime>,
}

/// No rejection state: a request is pending until approved, and an
/// approved request only disappears through supersession.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
}

impl TimesheetRequest {
    pub fn status(&self) -> RequestStatus {
        self.status.parse().unwrap_or(RequestStatus::Pending)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApprovalGate {
    Ok,
    /// Deleted by a concurrent supersession while we waited on the lock.
    Superseded,
    /// Approved by a concurrent admin while we waited on the lock.
    AlreadyProcessed,
}

/// Re-check the target request against the locked sibling set. Run after
/// taking the attendance row lock and the sibling read-lock, so a second
/// approver that queued behind a commit sees its outcome here.
pub fn approval_gate(target_id: u64, locked_siblings: &[(u64, String)]) -> ApprovalGate {
    match locked_siblings.iter().find(|(id, _)| *id == target_id) {
        None => ApprovalGate::Superseded,
        Some((_, status)) if status != "pending" => ApprovalGate::AlreadyProcessed,
        Some(_) => ApprovalGate::Ok,
    }
}
