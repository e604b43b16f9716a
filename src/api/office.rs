use actix_web::{HttpResponse, http::StatusCode, web};
use serde_json::json;

use crate::api::{message, success, success_with_message};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::service::office::{self, OfficePayload};
use crate::store::Store;

/// List offices
///
/// Admins and managers see every office, HR only their assigned ones.
#[utoipa::path(
    get,
    path = "/api/offices",
    responses(
        (status = 200, description = "Offices with their agent counts", body = Object, example = json!({
            "success": true,
            "data": { "offices": [{
                "id": 1, "name": "Kosti", "location": "Kosti",
                "checkInMethods": ["MANUAL", "RFID"],
                "expectedCheckIn": "09:00", "expectedCheckOut": "17:00",
                "agentCount": 12
            }]}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn list_offices(
    auth: AuthUser,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let offices = office::list_offices(store.get_ref(), &auth).await?;
    Ok(success(json!({ "offices": offices })))
}

/// Create office (Admin)
#[utoipa::path(
    post,
    path = "/api/offices",
    request_body = OfficePayload,
    responses(
        (status = 201, description = "Office created successfully"),
        (status = 400, description = "Missing name/location or malformed HH:MM time"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn create_office(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<OfficePayload>,
) -> Result<HttpResponse, AppError> {
    let office = office::create_office(store.get_ref(), &auth, payload.into_inner()).await?;
    Ok(success_with_message(
        StatusCode::CREATED,
        json!({ "office": office }),
        "Office created successfully",
    ))
}

/// Update office (Admin)
#[utoipa::path(
    put,
    path = "/api/offices/{id}",
    params(
        ("id" = u64, Path, description = "Office id")
    ),
    request_body = OfficePayload,
    responses(
        (status = 200, description = "Office updated successfully"),
        (status = 400, description = "Missing name/location or malformed HH:MM time"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Office not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn update_office(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    payload: web::Json<OfficePayload>,
) -> Result<HttpResponse, AppError> {
    let office =
        office::update_office(store.get_ref(), &auth, path.into_inner(), payload.into_inner())
            .await?;
    Ok(success_with_message(
        StatusCode::OK,
        json!({ "office": office }),
        "Office updated successfully",
    ))
}

/// Delete office (Admin)
///
/// Also deletes the office's agents and their attendance records.
#[utoipa::path(
    delete,
    path = "/api/offices/{id}",
    params(
        ("id" = u64, Path, description = "Office id")
    ),
    responses(
        (status = 200, description = "Office deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Office not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn delete_office(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    office::delete_office(store.get_ref(), &auth, path.into_inner()).await?;
    Ok(message("Office deleted successfully"))
}
