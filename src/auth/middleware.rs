use crate::auth::auth::authenticate;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// Verifies the bearer access token and stores the principal in the request
/// extensions for the [`AuthUser`](crate::auth::auth::AuthUser) extractor.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let result = {
        let config = req
            .app_data::<Data<Config>>()
            .ok_or_else(|| AppError::Internal("App config missing".into()))?;
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());
        authenticate(header, &config.jwt_secret)
    };

    match result {
        Ok(auth_user) => {
            req.extensions_mut().insert(auth_user);
            next.call(req).await
        }
        Err(err) => {
            tracing::debug!(path = req.path(), reason = %err, "Rejected bearer token");
            Ok(req.into_response(err.error_response()))
        }
    }
}
