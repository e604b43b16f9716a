use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    Hr,
    /// Only ever carried by tokens issued through RFID login, never stored on a user.
    Agent,
}

impl Role {
    /// Roles a staff account may hold.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Hr)
    }
}
