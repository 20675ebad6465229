pub mod attendance;
pub mod break_time;
pub mod payload;
pub mod role;
pub mod timesheet_request;
