use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::office::Office;

#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, Display, EnumString,
    AsRefStr, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 7,
    "name": "Amira Hassan",
    "email": "amira@kosti.com",
    "rfidCode": "0042",
    "status": "ACTIVE",
    "officeId": 1
}))]
pub struct Agent {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub rfid_code: Option<String>,
    pub status: AgentStatus,
    pub office_id: u64,
}

/// An agent together with the office it belongs to.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentWithOffice {
    #[serde(flatten)]
    pub agent: Agent,
    pub office: Office,
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub email: Option<String>,
    pub rfid_code: Option<String>,
    pub status: AgentStatus,
    pub office_id: u64,
}
