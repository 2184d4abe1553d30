//! # Bearer Token Middleware
//!
//! When an auth token is configured every `/v1/*` request must carry
//! `Authorization: Bearer <token>`. Health probes are mounted outside this
//! layer.

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Injected into request extensions by the router.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match provided.as_deref().and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if constant_time_token_eq(token, &expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!("authentication failed: invalid bearer token");
            AppError::Unauthorized("invalid bearer token".into()).into_response()
        }
        None => {
            tracing::warn!("authentication failed: missing bearer token");
            AppError::Unauthorized("missing bearer token".into()).into_response()
        }
    }
}
