use crate::api::agent::AgentQuery;
use crate::api::attendance::{AttendanceQuery, CheckAttendanceReqDto, UpdateAttendanceReqDto};
use crate::api::rfid::{CardHolder, ScanAttendance, ScanReqDto};
use crate::auth::handlers::LoginResponse;
use crate::model::agent::{Agent, AgentStatus, AgentWithOffice};
use crate::model::attendance::{
    AttendanceAction, AttendanceRecord, AttendanceRecordDetail, AttendanceSource,
    AttendanceStats, AttendanceStatus, PresenceState,
};
use crate::model::office::{CheckInMethod, Office, OfficeSummary};
use crate::model::role::Role;
use crate::model::user::User;
use crate::models::{BootstrapReqDto, LoginReqDto, RfidLoginReqDto};
use crate::service::agent::AgentPayload;
use crate::service::office::OfficePayload;
use crate::service::report::AttendanceReport;
use crate::service::user::{CreateUserPayload, UpdateRolePayload};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Tracker API",
        version = "1.0.0",
        description = r#"
## Multi-office Attendance Tracker

Records when field agents check in and out at their offices, either by
tapping an RFID card on a reader or through a manual entry by staff.

### 🔹 Key Features
- **RFID scans**
  - One endpoint per reader; each scan alternates check-in and check-out within the local day
- **Manual attendance**
  - Staff check agents in/out, correct and delete records
- **Reports**
  - Records by date range, office, status and agent with late/early/on-time counts
- **Offices, agents and users**
  - Per-office expected hours and allowed check-in methods

### 🔐 Security
Staff endpoints need a **JWT Bearer** access token.
**HR** users only see the offices assigned to them. Reader endpoints under
`/api/rfid` are rate limited but not authenticated.

### 📦 Response Format
`{"success": true, "data": ..., "message"?: ...}` on success,
`{"success": false, "message": ...}` on failure.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh,
        crate::auth::handlers::logout,
        crate::auth::handlers::rfid_login,
        crate::auth::handlers::bootstrap,

        crate::api::rfid::check_card,
        crate::api::rfid::scan,

        crate::api::attendance::check_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::latest_status,

        crate::api::office::list_offices,
        crate::api::office::create_office,
        crate::api::office::update_office,
        crate::api::office::delete_office,

        crate::api::agent::list_agents,
        crate::api::agent::get_agent,
        crate::api::agent::create_agent,
        crate::api::agent::update_agent,
        crate::api::agent::delete_agent,

        crate::api::user::profile,
        crate::api::user::list_users,
        crate::api::user::create_user,
        crate::api::user::update_role,
        crate::api::user::delete_user
    ),
    components(
        schemas(
            LoginReqDto,
            RfidLoginReqDto,
            BootstrapReqDto,
            LoginResponse,
            ScanReqDto,
            CardHolder,
            ScanAttendance,
            CheckAttendanceReqDto,
            AttendanceQuery,
            UpdateAttendanceReqDto,
            AttendanceReport,
            AttendanceRecord,
            AttendanceRecordDetail,
            AttendanceStats,
            AttendanceAction,
            AttendanceSource,
            AttendanceStatus,
            PresenceState,
            OfficePayload,
            Office,
            OfficeSummary,
            CheckInMethod,
            AgentQuery,
            AgentPayload,
            Agent,
            AgentWithOffice,
            AgentStatus,
            CreateUserPayload,
            UpdateRolePayload,
            User,
            Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and bootstrap"),
        (name = "RFID", description = "Card reader endpoints"),
        (name = "Attendance", description = "Attendance records and reports"),
        (name = "Office", description = "Office management APIs"),
        (name = "Agent", description = "Agent management APIs"),
        (name = "User", description = "Staff account management APIs"),
    )
)]
pub struct ApiDoc;

/// Prefix the staff paths are declared under in [`ApiDoc`].
const DOCUMENTED_PREFIX: &str = "/api";

/// The API document with staff paths moved under `api_prefix`.
pub fn openapi_for(api_prefix: &str) -> openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if api_prefix != DOCUMENTED_PREFIX {
        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| (relocate(&path, api_prefix), item))
            .collect();
    }
    doc
}

fn relocate(path: &str, api_prefix: &str) -> String {
    if path.starts_with("/api/rfid") {
        return path.to_string();
    }
    match path.strip_prefix(DOCUMENTED_PREFIX) {
        Some(rest) if rest.starts_with('/') => {
            format!("{}{rest}", api_prefix.trim_end_matches('/'))
        }
        _ => path.to_string(),
    }
}

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/api/rfid/scan",
            "/api/attendance/check",
            "/api/attendance/latest-status",
            "/api/offices/{id}",
            "/api/agents",
            "/api/users/{id}/role",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn staff_paths_follow_the_configured_prefix() {
        let doc = openapi_for("/v1/");
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/v1/offices/{id}"));
        assert!(paths.contains_key("/v1/attendance/check"));
        assert!(!paths.contains_key("/api/offices/{id}"));
        // readers and auth keep their fixed mounts
        assert!(paths.contains_key("/api/rfid/scan"));
        assert!(paths.contains_key("/auth/login"));

        assert_eq!(openapi_for("/api").paths.paths.len(), ApiDoc::openapi().paths.paths.len());
    }
}
