//! # Authentication Middleware
//!
//! Resolves the calling principal from a bearer token. Session issuance is
//! handled upstream; this service only verifies what it is handed.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {user_id}:{secret}  : AUTH_TOKEN configured
//! Bearer {user_id}           : development mode (no AUTH_TOKEN)
//! ```
//!
//! A request without an `Authorization` header proceeds anonymously.
//! Handlers that need a principal take [`CallerIdentity`], which rejects
//! anonymous requests with 401; handlers that only tailor their output
//! take `Option<CallerIdentity>`. A header that is present but invalid is
//! rejected here.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use courier_core::UserId;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated principal, injected into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CallerIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CallerIdentity>().cloned())
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Resolve a bearer token to a principal.
pub fn parse_bearer_token(provided: &str, expected_secret: Option<&str>) -> Result<CallerIdentity, String> {
    let (user, secret) = match provided.split_once(':') {
        Some((user, secret)) => (user, Some(secret)),
        None => (provided, None),
    };

    match (expected_secret, secret) {
        (Some(expected), Some(secret)) if constant_time_token_eq(secret, expected) => {}
        (Some(_), _) => return Err("invalid bearer token".into()),
        (None, Some(_)) => return Err("development mode expects Bearer {user_id}".into()),
        (None, None) => {}
    }

    let user_id = UserId::new(user).map_err(|e| format!("invalid principal: {e}"))?;
    Ok(CallerIdentity { user_id })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Verify the `Authorization` header, if any, and inject [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_owned));

    match auth_header {
        None => next.run(request).await,
        Some(Ok(value)) => match value.strip_prefix("Bearer ") {
            Some(provided) => {
                match parse_bearer_token(provided, config.token.as_deref().map(String::as_str)) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                }
            }
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                unauthorized_response("authorization header must use Bearer scheme")
            }
        },
        Some(Err(_)) => {
            tracing::warn!("authentication failed: unreadable authorization header");
            unauthorized_response("authorization header is not valid ASCII")
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHENTICATED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
