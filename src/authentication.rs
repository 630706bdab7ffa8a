use std::sync::Arc;

use anyhow::{Context, Result};
use argon2::PasswordVerifier;
use argon2::{password_hash::SaltString, Argon2, PasswordHash};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db_helpers::get_user_by_id;
use crate::errors::RequestError;
use crate::AppState;

const JWT_EXPIRY_DURATION: time::Duration = time::Duration::days(90);

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaim {
    id: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// The signed-in user, if the request carries `Authorization: Token <jwt>`.
pub struct MaybeUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = match parts.headers.get("Authorization") {
            Some(header) => header,
            None => return Ok(MaybeUser(None)),
        };
        let header = header.to_str().map_err(|_| {
            tracing::debug!("authorization header is not valid ascii");
            RequestError::NotAuthorized("Invalid token")
        })?;

        let token = header.strip_prefix("Token ").ok_or_else(|| {
            tracing::debug!("authorization header without Token prefix");
            RequestError::NotAuthorized("Invalid token")
        })?;

        let state = parts
            .extensions
            .get::<Arc<AppState>>()
            .ok_or(RequestError::ServerError)?;
        let id = verify_jwt_token(&state.config.jwt_secret, token)?;

        // A signature alone does not prove the account still exists.
        let user = get_user_by_id(&state.pool, id).await?.ok_or_else(|| {
            tracing::debug!(user_id = id, "token for an unknown user");
            RequestError::NotAuthorized("Invalid token")
        })?;

        Ok(MaybeUser(Some(AuthUser {
            id: user.id,
            username: user.username,
        })))
    }
}

pub fn get_jwt_token(secret: &str, id: i64) -> Result<String> {
    let expiry_date = OffsetDateTime::now_utc() + JWT_EXPIRY_DURATION;
    let claim = AuthClaim {
        id,
        exp: expiry_date.unix_timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claim,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_ref()),
    )
    .context("Failed to generate jwt token")
}

pub fn verify_jwt_token(secret: &str, token: &str) -> Result<i64, RequestError> {
    let token_data = jsonwebtoken::decode::<AuthClaim>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected jwt");
        RequestError::NotAuthorized("Invalid token")
    })?;
    let claim = token_data.claims;
    if claim.exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(RequestError::NotAuthorized("Token expired"));
    }
    Ok(claim.id)
}

pub async fn verify_password_argon2(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let hash = PasswordHash::new(hash.as_str())
            .map_err(|_| anyhow::anyhow!("Failed to verify password"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await
    .context("Failed to verify password")?
}

pub async fn hash_password_argon2(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(rand::thread_rng());
        let hash = PasswordHash::generate(Argon2::default(), password, salt.as_salt())
            .map_err(|_| anyhow::anyhow!("Failed to hash password"))?;
        Ok(hash.to_string())
    })
    .await
    .context("Failed to hash password")?
}
