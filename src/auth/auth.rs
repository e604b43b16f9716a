use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// User id, or the agent id for tokens issued by RFID login
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    /// Offices assigned at login; only meaningful for HR
    pub office_ids: Vec<u64>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role: claims.role,
            office_ids: claims.offices,
        }
    }
}

/// Validates a bearer access token and turns it into a principal.
pub fn authenticate(header: Option<&str>, secret: &str) -> Result<AuthUser, AppError> {
    let token = header
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            AppError::Unauthorized("Authorization header must start with Bearer".into())
        })?;

    let claims = verify_token(token, secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Access token required".into()));
    }

    Ok(claims.into())
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on the protected scope
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(AppError::Internal("Config missing".into()).into()));
            }
        };

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        ready(authenticate(header, &config.jwt_secret).map_err(Into::into))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require_any(&[Role::Admin])
    }

    /// Any staff role: ADMIN, MANAGER or HR.
    pub fn require_staff(&self) -> Result<(), AppError> {
        self.require_any(&[Role::Admin, Role::Manager, Role::Hr])
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = self.user_id, role = %self.role, "Role not permitted");
            Err(AppError::forbidden("Insufficient role for this operation"))
        }
    }
}
