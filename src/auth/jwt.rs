use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    model::role::Role,
    models::{Claims, TokenType},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

fn issue(
    user_id: u64,
    subject: &str,
    role: Role,
    offices: Vec<u64>,
    secret: &str,
    ttl: usize,
    token_type: TokenType,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: subject.to_string(),
        role,
        offices,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    subject: &str,
    role: Role,
    offices: Vec<u64>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    issue(user_id, subject, role, offices, secret, ttl, TokenType::Access).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user_id: u64,
    subject: &str,
    role: Role,
    offices: Vec<u64>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(user_id, subject, role, offices, secret, ttl, TokenType::Refresh)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
