//! Caller identity
//!
//! User authentication lives in an upstream layer that attaches an
//! `AuthenticatedCaller` to the request. This service only recognises one
//! credential itself: the platform admin bearer token used for operational
//! endpoints.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Subject recorded for callers presenting the platform admin token
pub const ADMIN_TOKEN_SUBJECT: &str = "platform-admin-token";

/// Identity of the caller, as established by authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller {
    pub subject: String,
    pub platform_admin: bool,
}

impl AuthenticatedCaller {
    pub fn user(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            platform_admin: false,
        }
    }

    pub fn platform_admin(subject: &str) -> Self {
        Self {
            subject: subject.to_string(),
            platform_admin: true,
        }
    }
}

/// Whether the request carries a platform-admin identity
pub fn is_platform_admin(request: &Request) -> bool {
    request
        .extensions()
        .get::<AuthenticatedCaller>()
        .is_some_and(|caller| caller.platform_admin)
}

/// Recognise the platform admin token.
///
/// Never rejects; an identity already attached upstream is left alone.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let already_identified = request.extensions().get::<AuthenticatedCaller>().is_some();

    let admin = match (&state.admin_token_digest, bearer_token(request.headers())) {
        (Some(expected), Some(token)) => token_matches(expected, token),
        _ => false,
    };

    if admin && !already_identified {
        tracing::debug!("Platform admin token accepted");
        request
            .extensions_mut()
            .insert(AuthenticatedCaller::platform_admin(ADMIN_TOKEN_SUBJECT));
    }

    next.run(request).await
}

/// Reject callers that are not platform admins
pub async fn require_platform_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<AuthenticatedCaller>() {
        None => Err(ApiError::Unauthorized),
        Some(caller) if !caller.platform_admin => {
            tracing::warn!(subject = %caller.subject, "Non-admin caller on admin route");
            Err(ApiError::Forbidden)
        }
        Some(_) => Ok(next.run(request).await),
    }
}

/// Hash a token so comparisons always run over equal-length input
pub fn digest_token(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

fn token_matches(expected: &[u8; 32], provided: &str) -> bool {
    digest_token(provided)[..].ct_eq(&expected[..]).into()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_matching() {
        let expected = digest_token("an-admin-token-that-is-long-enough-0123");
        assert!(token_matches(&expected, "an-admin-token-that-is-long-enough-0123"));
        assert!(!token_matches(&expected, "an-admin-token-that-is-long-enough-0124"));
        assert!(!token_matches(&expected, ""));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_caller_constructors() {
        assert!(!AuthenticatedCaller::user("u1").platform_admin);
        assert!(AuthenticatedCaller::platform_admin("ops").platform_admin);
    }
}
