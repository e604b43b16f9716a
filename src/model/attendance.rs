use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceAction {
    CheckIn,
    CheckOut,
}

impl AttendanceAction {
    pub fn verb(&self) -> &'static str {
        match self {
            AttendanceAction::CheckIn => "Check-in",
            AttendanceAction::CheckOut => "Check-out",
        }
    }
}

/// Where a record came from. Card readers tag their own scans (`RFIDR`) and
/// operator overrides on the reader side (`RFIDO`).
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
pub enum AttendanceSource {
    #[serde(rename = "RFID")]
    #[strum(serialize = "RFID")]
    Rfid,
    #[serde(rename = "RFIDR")]
    #[strum(serialize = "RFIDR")]
    RfidReader,
    #[serde(rename = "RFIDO")]
    #[strum(serialize = "RFIDO")]
    RfidOverride,
    #[serde(rename = "MANUAL")]
    #[strum(serialize = "MANUAL")]
    Manual,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    Early,
}

/// Whether an agent is currently in the building, derived from today's last record.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceState {
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub agent_id: u64,
    pub action: AttendanceAction,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
    pub source: AttendanceSource,
    pub recorded_by: Option<String>,
    pub expected_in: String,
    pub expected_out: String,
    pub status: AttendanceStatus,
    pub working_hours: Option<f64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_check_in: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub agent_id: u64,
    pub action: AttendanceAction,
    pub timestamp: DateTime<Utc>,
    pub source: AttendanceSource,
    pub recorded_by: Option<String>,
    pub expected_in: String,
    pub expected_out: String,
    pub status: AttendanceStatus,
    pub working_hours: Option<f64>,
    pub last_check_in: Option<DateTime<Utc>>,
}

/// A record joined with the agent and office it belongs to.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordDetail {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub agent_name: String,
    pub office_id: u64,
    pub office_name: String,
}

/// Fields an operator may correct on an existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChanges {
    pub timestamp: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub working_hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_records: usize,
    pub late_check_ins: usize,
    pub early_departures: usize,
    pub on_time: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(AttendanceAction::CheckIn.to_string(), "CHECK_IN");
        assert_eq!(AttendanceStatus::OnTime.as_ref(), "ON_TIME");
        assert_eq!(
            AttendanceSource::from_str("RFIDR").unwrap(),
            AttendanceSource::RfidReader
        );
        assert_eq!(
            serde_json::to_value(AttendanceSource::RfidOverride).unwrap(),
            serde_json::json!("RFIDO")
        );
        assert_eq!(
            serde_json::to_value(PresenceState::CheckedIn).unwrap(),
            serde_json::json!("CHECKED_IN")
        );
    }
}
