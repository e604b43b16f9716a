use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CheckInMethod {
    Manual,
    Rfid,
}

pub const DEFAULT_CHECK_IN: &str = "09:00";
pub const DEFAULT_CHECK_OUT: &str = "17:00";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 1,
    "name": "Kosti",
    "location": "Kosti",
    "checkInMethods": ["MANUAL", "RFID"],
    "expectedCheckIn": "09:00",
    "expectedCheckOut": "17:00"
}))]
pub struct Office {
    pub id: u64,
    pub name: String,
    pub location: String,
    pub check_in_methods: Vec<CheckInMethod>,
    /// 24-hour `HH:MM`
    pub expected_check_in: String,
    /// 24-hour `HH:MM`
    pub expected_check_out: String,
}

impl Office {
    pub fn schedule(&self) -> OfficeSchedule {
        OfficeSchedule {
            expected_check_in: self.expected_check_in.clone(),
            expected_check_out: self.expected_check_out.clone(),
        }
    }
}

/// The pair of expected times a status is evaluated against. Copied onto every
/// attendance record so later office changes leave history untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeSchedule {
    pub expected_check_in: String,
    pub expected_check_out: String,
}

/// Office row plus the number of agents it owns, as listed on the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfficeSummary {
    #[serde(flatten)]
    pub office: Office,
    pub agent_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewOffice {
    pub name: String,
    pub location: String,
    pub check_in_methods: Vec<CheckInMethod>,
    pub expected_check_in: String,
    pub expected_check_out: String,
}

/// Joins check-in methods into the comma separated column form.
pub fn join_methods(methods: &[CheckInMethod]) -> String {
    methods
        .iter()
        .map(|m| m.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Unknown entries are dropped rather than failing the whole row.
pub fn split_methods(raw: &str) -> Vec<CheckInMethod> {
    raw.split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}
