//! # Authentication and Authorization
//!
//! Verifies HS256 session tokens issued by the login flow and exposes the
//! caller as axum extractors. Tokens are read from the `Authorization: Bearer`
//! header or, for browser redirects, from the `session` cookie.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, header::COOKIE, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ApiError, forbidden, unauthorized};
use crate::models::user::Role;
use crate::server::AppState;

/// Cookie carrying the session token for browser flows
pub const SESSION_COOKIE: &str = "session";

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub org: Option<Uuid>,
    pub exp: i64,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Organization the caller acts for; 403 when the user has none
    pub fn require_organization(&self) -> Result<Uuid, ApiError> {
        self.organization_id
            .ok_or_else(|| forbidden(Some("User is not part of an organization")))
    }
}

/// Authenticated caller with the admin role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Issue a session token; used by the login flow and tests.
pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    email: &str,
    role: Role,
    organization_id: Option<Uuid>,
    ttl: chrono::Duration,
) -> Result<String, ApiError> {
    let secret = jwt_secret(config)?;
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role: role.as_str().to_string(),
        org: organization_id,
        exp: (Utc::now() + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::from(anyhow::anyhow!("failed to sign session token: {e}")))
}

/// Decode and validate a session token
pub fn verify_token(config: &AppConfig, token: &str) -> Result<AuthUser, ApiError> {
    let secret = jwt_secret(config)?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 30;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "session token rejected");
        unauthorized(Some("Invalid or expired session token"))
    })?;

    Ok(AuthUser {
        user_id: data.claims.sub,
        email: data.claims.email,
        role: Role::parse(&data.claims.role),
        organization_id: data.claims.org,
    })
}

fn jwt_secret(config: &AppConfig) -> Result<&str, ApiError> {
    config
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| unauthorized(Some("Authentication is not configured")))
}

fn extract_token(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let header = value
            .to_str()
            .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;
        return header
            .strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")));
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| unauthorized(Some("Missing session token")))
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<AppConfig>::from_ref(state);
        let token = extract_token(&parts.headers)?;
        let user = verify_token(&config, &token)?;
        tracing::Span::current().record("user_id", tracing::field::display(user.user_id));
        Ok(user)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AppConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(forbidden(Some("Administrator role required")));
        }
        Ok(AdminUser(user))
    }
}
