use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::AppError,
    model::{role::Role, user::User},
    models::{BootstrapReqDto, LoginReqDto, RfidLoginReqDto, TokenType},
    service::{
        scan::{CardCode, find_card_holder},
        user::bootstrap_admin,
    },
    store::Store,
};
use actix_web::{HttpRequest, HttpResponse, http::StatusCode, web};
use chrono::DateTime;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::api::success_with_message;

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(err: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token signing failed: {err}"))
}

/// Issues an access/refresh pair for a staff account and records the refresh jti.
async fn issue_session(
    store: &dyn Store,
    config: &Config,
    user: User,
) -> Result<LoginResponse, AppError> {
    let access_token = generate_access_token(
        user.id,
        &user.email,
        user.role,
        user.office_ids.clone(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user.id,
        &user.email,
        user.role,
        user.office_ids.clone(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(token_error)?;

    let expires_at = DateTime::from_timestamp(refresh_claims.exp as i64, 0)
        .ok_or_else(|| AppError::Internal("refresh token expiry out of range".into()))?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store
        .store_refresh_token(user.id, &refresh_claims.jti, expires_at)
        .await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        user,
    })
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Access and refresh tokens", body = LoginResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, payload),
    fields(email = %payload.email)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let credentials = match store.find_credentials(&email).await? {
        Some(c) => c,
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if verify_password(&payload.password, &credentials.password_hash).is_err() {
        info!(user_id = credentials.user.id, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let session = issue_session(store.get_ref(), &config, credentials.user).await?;
    info!(user_id = session.user.id, "Login successful");

    Ok(HttpResponse::Ok().json(session))
}

/// Rotate a refresh token
///
/// Send the refresh token as the bearer credential. It is revoked and a new
/// pair is issued; presenting it again fails.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New access and refresh tokens", body = LoginResponse),
        (status = 401, description = "Missing, invalid, expired or already used refresh token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh(
    req: HttpRequest,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    if !store.consume_refresh_token(&claims.jti).await? {
        warn!(user_id = claims.user_id, jti = %claims.jti, "Refresh token reused or revoked");
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    // role and offices may have changed since the previous login
    let user = store
        .get_user(claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;

    let session = issue_session(store.get_ref(), &config, user).await?;
    info!(user_id = session.user.id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(session))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out, whether or not the token was valid")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // only refresh tokens can logout
    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    if let Err(e) = store.revoke_refresh_token(&claims.jti).await {
        warn!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

/// Log in an agent with their RFID code
///
/// Returns a short-lived access token for the agent. Agent tokens are not
/// accepted by staff endpoints.
#[utoipa::path(
    post,
    path = "/auth/rfid",
    request_body = RfidLoginReqDto,
    responses(
        (status = 200, description = "Agent access token", body = Object, example = json!({
            "access_token": "eyJ...",
            "agent": { "id": 7, "name": "Amira Hassan", "officeId": 1 }
        })),
        (status = 400, description = "RFID code missing"),
        (status = 401, description = "Invalid RFID code")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_rfid_login", skip_all)]
pub async fn rfid_login(
    payload: web::Json<RfidLoginReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let card = CardCode::new(&payload.rfid_code)?;

    let holder = find_card_holder(store.get_ref(), &card)
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => AppError::Unauthorized("Invalid RFID code".into()),
            other => other,
        })?;
    let agent = holder.agent;

    let access_token = generate_access_token(
        agent.id,
        &agent.name,
        Role::Agent,
        vec![agent.office_id],
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(token_error)?;

    info!(agent_id = agent.id, "RFID login successful");

    Ok(HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "agent": {
            "id": agent.id,
            "name": agent.name,
            "officeId": agent.office_id,
        },
    })))
}

/// Create the first administrator
///
/// Only allowed while no user exists.
#[utoipa::path(
    post,
    path = "/auth/bootstrap",
    request_body = BootstrapReqDto,
    responses(
        (status = 201, description = "Admin created", body = Object, example = json!({
            "success": true,
            "data": { "user": {
                "id": 1, "email": "admin@kosti.com", "name": "Admin",
                "role": "ADMIN", "officeIds": []
            } },
            "message": "Admin created successfully"
        })),
        (status = 400, description = "Email, password and name are required"),
        (status = 409, description = "Users already exist")
    ),
    tag = "Auth"
)]
pub async fn bootstrap(
    payload: web::Json<BootstrapReqDto>,
    store: web::Data<dyn Store>,
) -> Result<HttpResponse, AppError> {
    let user = bootstrap_admin(
        store.get_ref(),
        &payload.email,
        &payload.password,
        &payload.name,
    )
    .await?;

    Ok(success_with_message(
        StatusCode::CREATED,
        json!({ "user": user }),
        "Admin created successfully",
    ))
}
