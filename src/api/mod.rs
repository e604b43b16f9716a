pub mod agent;
pub mod attendance;
pub mod office;
pub mod rfid;
pub mod user;

use actix_web::{HttpResponse, http::StatusCode, web};
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;

/// `{"success": true, "data": ...}`
pub fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub fn success_with_message<T: Serialize>(
    status: StatusCode,
    data: T,
    message: &str,
) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "success": true,
        "data": data,
        "message": message,
    }))
}

pub fn message(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": message }))
}

// Extractor failures answer with the same envelope as every other error.

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected request body");
        AppError::validation(format!("Invalid request body: {err}")).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected query string");
        AppError::validation(format!("Invalid query: {err}")).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid path: {err}")).into()
    })
}
