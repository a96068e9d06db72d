use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Session lifetime.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Header carrying the administrative key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Claims
///
/// Payload of the session token handed out at register/login.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id.
    pub sub: Uuid,
    /// Role at issue time. The extractor re-reads the stored role anyway.
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// issue_token
///
/// Signs an HS256 session token for `user` with the configured secret.
pub fn issue_token(config: &AppConfig, user: &User) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("token signing error: {:?}", e);
        AppError::TokenIssue
    })
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Its `id` is the asserted owner for
/// every ownership-guarded mutation and the acting user for every interaction.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Only poets author poems and galleries.
    pub fn require_poet(&self) -> Result<(), AppError> {
        match self.role {
            Role::Poet => Ok(()),
            Role::Reader => Err(AppError::Forbidden),
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. Bearer token extraction and validation.
/// 3. DB lookup, so tokens of removed users stop working.
///
/// Rejection: `AppError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected session token");
            AppError::Unauthorized
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

/// AdminKey
///
/// Proof that the request carries the configured administrative key. Without a configured
/// key every request is refused.
#[derive(Debug, Clone, Copy)]
pub struct AdminKey;

impl<S> FromRequestParts<S> for AdminKey
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let expected = config.admin_api_key.as_deref().ok_or(AppError::Forbidden)?;

        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Forbidden)?;

        if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(AdminKey)
        } else {
            tracing::warn!("administrative request with a wrong key");
            Err(AppError::Forbidden)
        }
    }
}
