use actix_web::{HttpResponse, http::StatusCode, web};
use serde_json::json;

use crate::api::{message, success, success_with_message};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::service::user::{self, CreateUserPayload, UpdateRolePayload};
use crate::store::Store;

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/users/profile",
    responses(
        (status = 200, description = "The caller's account", body = Object, example = json!({
            "success": true,
            "data": { "user": {
                "id": 2, "email": "hr@kosti.com", "name": "Kosti HR",
                "role": "HR", "officeIds": [1]
            }}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn profile(
    auth: AuthUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let user = user::profile(store.get_ref(), &auth).await?;
    Ok(success(json!({ "user": user })))
}

/// List users (Admin)
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All staff accounts"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn list_users(
    auth: AuthUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let users = user::list_users(store.get_ref(), &auth).await?;
    Ok(success(json!({ "users": users })))
}

/// Create user (Admin)
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserPayload,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Missing required fields: email, password, name, role"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Assigned office not found"),
        (status = 409, description = "Email already registered")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn create_user(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<CreateUserPayload>,
) -> Result<HttpResponse, AppError> {
    let user = user::create_user(store.get_ref(), &auth, payload.into_inner()).await?;
    Ok(success_with_message(
        StatusCode::CREATED,
        json!({ "user": user }),
        "User created successfully",
    ))
}

/// Change a user's role and office assignment (Admin)
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(
        ("id" = u64, Path, description = "User id")
    ),
    request_body = UpdateRolePayload,
    responses(
        (status = 200, description = "User updated"),
        (status = 400, description = "Role is required"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User or office not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn update_role(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    payload: web::Json<UpdateRolePayload>,
) -> Result<HttpResponse, AppError> {
    let user =
        user::update_user_role(store.get_ref(), &auth, path.into_inner(), payload.into_inner())
            .await?;
    Ok(success(json!({ "user": user })))
}

/// Delete user (Admin)
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = u64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "User"
)]
pub async fn delete_user(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    user::delete_user(store.get_ref(), &auth, path.into_inner()).await?;
    Ok(message("User deleted successfully"))
}
