use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::model::role::Role;
use crate::model::user::{NewUser, User};
use crate::store::Store;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[schema(example = "hr@kosti.com", format = "email")]
    pub email: Option<String>,
    #[schema(example = "123456")]
    pub password: Option<String>,
    #[schema(example = "Kosti HR")]
    pub name: Option<String>,
    pub role: Option<Role>,
    pub office_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRolePayload {
    pub role: Option<Role>,
    /// Replaces the current assignment when present.
    pub office_ids: Option<Vec<u64>>,
}

fn staff_role(role: Role) -> AppResult<Role> {
    if role.is_staff() {
        Ok(role)
    } else {
        Err(AppError::validation("Users must have a staff role"))
    }
}

async fn check_offices(store: &dyn Store, office_ids: &[u64]) -> AppResult<()> {
    for id in office_ids {
        if store.get_office(*id).await?.is_none() {
            return Err(AppError::not_found(format!("Office {id} not found")));
        }
    }
    Ok(())
}

async fn insert_user(store: &dyn Store, user: NewUser) -> AppResult<User> {
    let email = user.email.clone();
    store.create_user(user).await.map_err(|err| match err {
        AppError::Conflict(_) => AppError::Conflict(format!("User {email} already exists")),
        other => other,
    })
}

pub async fn profile(store: &dyn Store, principal: &AuthUser) -> AppResult<User> {
    principal.require_staff()?;
    store
        .get_user(principal.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn list_users(store: &dyn Store, principal: &AuthUser) -> AppResult<Vec<User>> {
    principal.require_admin()?;
    store.list_users().await
}

pub async fn create_user(
    store: &dyn Store,
    principal: &AuthUser,
    payload: CreateUserPayload,
) -> AppResult<User> {
    principal.require_admin()?;

    let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(email), Some(password), Some(name), Some(role)) = (
        non_blank(payload.email),
        payload.password.filter(|p| !p.is_empty()),
        non_blank(payload.name),
        payload.role,
    ) else {
        return Err(AppError::validation(
            "Missing required fields: email, password, name, role",
        ));
    };
    let role = staff_role(role)?;
    let office_ids = payload.office_ids.unwrap_or_default();
    check_offices(store, &office_ids).await?;

    let user = insert_user(
        store,
        NewUser {
            email: email.to_lowercase(),
            password_hash: hash_password(&password)?,
            name,
            role,
            office_ids,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, email = %user.email, role = %user.role, "User created");
    Ok(user)
}

pub async fn update_user_role(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
    payload: UpdateRolePayload,
) -> AppResult<User> {
    principal.require_admin()?;
    let role = staff_role(
        payload
            .role
            .ok_or_else(|| AppError::validation("Role is required"))?,
    )?;
    if let Some(ids) = &payload.office_ids {
        check_offices(store, ids).await?;
    }

    let user = store
        .update_user_role(id, role, payload.office_ids)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    tracing::info!(
        user_id = id,
        role = %user.role,
        offices = ?user.office_ids,
        "User role updated"
    );
    Ok(user)
}

pub async fn delete_user(store: &dyn Store, principal: &AuthUser, id: u64) -> AppResult<()> {
    principal.require_admin()?;
    if !store.delete_user(id).await? {
        return Err(AppError::not_found("User not found"));
    }
    tracing::info!(user_id = id, "User deleted");
    Ok(())
}

/// Creates the first ADMIN; refused once any user exists.
pub async fn bootstrap_admin(
    store: &dyn Store,
    email: &str,
    password: &str,
    name: &str,
) -> AppResult<User> {
    if store.count_users().await? > 0 {
        return Err(AppError::Conflict("Users already exist".to_string()));
    }
    let (email, name) = (email.trim().to_lowercase(), name.trim().to_string());
    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Err(AppError::validation("Email, password and name are required"));
    }

    let user = insert_user(
        store,
        NewUser {
            email,
            password_hash: hash_password(password)?,
            name,
            role: Role::Admin,
            office_ids: Vec::new(),
        },
    )
    .await?;
    tracing::info!(user_id = user.id, email = %user.email, "Bootstrap admin created");
    Ok(user)
}
