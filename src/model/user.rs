use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

/// Staff account as exposed over the API. The password hash is only ever
/// read through [`UserCredentials`].
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub office_ids: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub office_ids: Vec<u64>,
}
