//! Request authentication.
//!
//! Skycut runs behind an authenticating proxy that verifies credentials
//! and forwards the caller's identity in the `X-Auth-Request-User` header.
//! The API itself never sees credentials; a missing or empty header means
//! the proxy is misconfigured and the request is rejected.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use skycut_core::Error;

use crate::error::ApiError;

/// Header set by the authenticating proxy.
pub const AUTH_USER_HEADER: &str = "X-Auth-Request-User";

/// The authenticated user identity, extracted from request headers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTH_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|user| !user.is_empty())
            .map(|user| AuthUser(user.to_string()))
            .ok_or_else(|| {
                ApiError::from(Error::Unauthorized(format!(
                    "Missing {} header",
                    AUTH_USER_HEADER
                )))
            })
    }
}
