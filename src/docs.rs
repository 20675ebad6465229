use crate::api::admin::{
    AdminAttendanceForm, AdminAttendanceRow, AdminAttendanceUpdate, AdminBreakRow, AdminRequestRow,
};
use crate::api::request::{
    BreakRowForm, CorrectionForm, MyRequestRow, RequestListResponse,
};
use crate::api::timesheet::TimesheetRow;
use crate::model::payload::PreviewBreak;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Punchclock API",
        version = "1.0.0",
        description = r#"
## Attendance & Timesheet Service

Tracks daily punches, breaks and correction requests for every user.

### Key Features
- **Punch Clock**
  - Clock-in, clock-out and paired break intervals with strict state transitions
- **Timesheet**
  - Month view with live break/work minute totals and per-day detail
- **Correction Requests**
  - Propose fixes to past days; an admin approval merges them in one transaction
- **Administration**
  - Review queue, manual attendance entry and wholesale edits

### Security
Identity is established upstream; every request carries the trusted
`X-Auth-User` and `X-Auth-Role` headers.

### Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints
"#,
    ),
    paths(
        crate::api::attendance::punch_status,
        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::break_in,
        crate::api::attendance::break_out,

        crate::api::timesheet::month_index,
        crate::api::timesheet::show_day,

        crate::api::request::submit_correction,
        crate::api::request::list_my_requests,

        crate::api::admin::list_requests,
        crate::api::admin::approve_request,
        crate::api::admin::list_day,
        crate::api::admin::show_attendance,
        crate::api::admin::create_attendance,
        crate::api::admin::update_attendance
    ),
    components(
        schemas(
            TimesheetRow,
            PreviewBreak,
            CorrectionForm,
            BreakRowForm,
            MyRequestRow,
            RequestListResponse,
            AdminRequestRow,
            AdminAttendanceRow,
            AdminAttendanceForm,
            AdminAttendanceUpdate,
            AdminBreakRow
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Punch clock APIs"),
        (name = "Timesheet", description = "Timesheet display APIs"),
        (name = "Requests", description = "Correction request APIs"),
        (name = "Admin", description = "Administration APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "identity_headers",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Auth-User"))),
            );
        }
    }
}
