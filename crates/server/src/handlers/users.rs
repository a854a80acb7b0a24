//! User registration, login and identity.

use crate::auth::{Caller, hash_token, secret_key, sha256_hex};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use depot_core::ContentHash;
use depot_metadata::models::{SessionRow, UserRow};
use depot_metadata::{SessionRepo, UserRepo};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Permissions granted to self-registered users.
const DEFAULT_USER_PERMISSIONS: &str = "r";

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// When false, `password` is already the hex SHA-256 of the password.
    #[serde(default = "default_raw")]
    pub raw: bool,
}

fn default_raw() -> bool {
    true
}

impl Credentials {
    /// The stored form of the password.
    pub fn password_hash(&self) -> ApiResult<String> {
        if self.raw {
            return Ok(sha256_hex(&self.password));
        }
        ContentHash::from_hex(&self.password)
            .map(|h| h.to_hex())
            .map_err(|_| ApiError::BadRequest("pre-hashed password must be 64 hex characters".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
}

/// POST /v1/users/register - Create an account with read permission.
pub async fn register_user(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<UserInfo>)> {
    if creds.username.is_empty() || creds.username.len() > 64 {
        return Err(ApiError::BadRequest(
            "username must be 1 to 64 characters".to_string(),
        ));
    }
    if creds.raw && creds.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".to_string()));
    }

    let user = UserRow {
        username: creds.username.clone(),
        password_hash: creds.password_hash()?,
        permissions: DEFAULT_USER_PERMISSIONS.to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    state.metadata.create_user(&user).await?;
    tracing::info!(username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(UserInfo {
            username: user.username,
            permissions: user.permissions,
            session_expires_at: None,
        }),
    ))
}

/// POST /v1/users/login - Exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::Unauthorized("invalid username or password".to_string());

    let user = state
        .metadata
        .get_user(&creds.username)
        .await?
        .ok_or_else(invalid)?;
    if creds.password_hash().map_err(|_| invalid())? != user.password_hash {
        tracing::info!(username = %creds.username, "login rejected");
        return Err(invalid());
    }

    let token = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
    let now = OffsetDateTime::now_utc();
    let expires_at = now + state.config.server.session_ttl();

    state
        .metadata
        .create_session(&SessionRow {
            token_hash: hash_token(&secret_key(&state).await?, &token),
            username: user.username.clone(),
            created_at: now,
            expires_at,
        })
        .await?;
    tracing::info!(username = %user.username, "user logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at: expires_at
            .format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format expires_at: {e}")))?,
    }))
}

/// GET /v1/users/me - The authenticated caller.
pub async fn current_user(Caller(user): Caller) -> ApiResult<Json<UserInfo>> {
    Ok(Json(UserInfo {
        username: user.username,
        permissions: user.permissions.to_string(),
        session_expires_at: user.expires_at.format(&Rfc3339).ok(),
    }))
}
