use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "admin@kosti.com")]
    pub email: String,
    #[schema(example = "123456")]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RfidLoginReqDto {
    #[schema(example = "0042")]
    pub rfid_code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BootstrapReqDto {
    #[schema(example = "admin@kosti.com")]
    pub email: String,
    pub password: String,
    #[schema(example = "Admin")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// email for staff, agent name for RFID-issued tokens
    pub sub: String,
    pub role: Role,
    #[serde(default)]
    pub offices: Vec<u64>,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
