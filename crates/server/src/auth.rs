//! Authentication and authorization middleware.
//!
//! Bearer tokens are random strings issued at login. Only a peppered digest
//! (`sha256(secret_key || token)`) is stored, so rotating `secret_key`
//! invalidates every session.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use depot_core::{Access, ContentHash, DEFAULT_SECRET_KEY, Permission, PermissionSet, keys};
use depot_metadata::{ConfigRepoExt, SessionRepo, UserRepo};
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub username: String,
    pub permissions: PermissionSet,
    pub expires_at: OffsetDateTime,
}

impl AuthenticatedUser {
    /// Require a permission, returning an error if not granted.
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        if self.permissions.has(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "missing required permission: {}",
                permission.as_char()
            )))
        }
    }
}

impl Access for AuthenticatedUser {
    fn allows(&self, permission: Permission) -> bool {
        self.permissions.has(permission)
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    ContentHash::compute(data.as_ref()).to_hex()
}

/// Digest under which a session token is stored.
pub fn hash_token(secret_key: &str, token: &str) -> String {
    let mut hasher = ContentHash::hasher();
    hasher.update(secret_key.as_bytes());
    hasher.update(token.as_bytes());
    hasher.finalize().to_hex()
}

/// Current token-signing secret.
pub async fn secret_key(state: &AppState) -> ApiResult<String> {
    Ok(state
        .metadata
        .get_config_or(keys::SECRET_KEY, DEFAULT_SECRET_KEY.to_string())
        .await?)
}

/// Authentication middleware that validates tokens and sets up trace context.
///
/// A missing token is not an error here; handlers decide via [`Caller`].
/// A token that is present but unknown or expired is rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    if let Some(token) = extract_bearer_token(&req) {
        let token_hash = hash_token(&secret_key(&state).await?, token);

        let session = state
            .metadata
            .get_session(&token_hash)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("invalid token".to_string()))?;
        if !session.is_valid_at(OffsetDateTime::now_utc()) {
            return Err(ApiError::Unauthorized("token expired".to_string()));
        }

        let user = state
            .metadata
            .get_user(&session.username)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_string()))?;
        let permissions = PermissionSet::parse(&user.permissions).unwrap_or_else(|e| {
            tracing::warn!(username = %user.username, error = %e, "stored permissions invalid, granting none");
            PermissionSet::none()
        });

        req.extensions_mut().insert(AuthenticatedUser {
            username: user.username,
            permissions,
            expires_at: session.expires_at,
        });
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Extractor for the authenticated caller. Rejects anonymous requests.
pub struct Caller(pub AuthenticatedUser);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}
