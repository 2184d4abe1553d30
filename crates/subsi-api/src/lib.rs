//! # subsi-api — Axum API for SubsiGenie
//!
//! Drives one subsidy application per session: scheme analysis, wallet
//! retrieval, intake, project plan and budget, attestation signing and
//! submission to RVO.
//!
//! ## API Surface
//!
//! | Prefix                   | Module                      |
//! |--------------------------|-----------------------------|
//! | `/v1/applications/*`     | [`routes::applications`]    |
//! | `/health/*`              | unauthenticated probes      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod session;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use config::{ApiConfig, ApiConfigError};
pub use error::AppError;
pub use state::AppState;

/// Assemble the application router.
///
/// Health probes are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::applications::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Serve [`app`] on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, services = ?state.services, "subsi-api listening");
    axum::serve(listener, app(state)).await
}

async fn liveness() -> &'static str {
    "ok"
}

/// 200 "ready" once the session registry is reachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.len();
    tracing::debug!(sessions, "readiness probe");
    (StatusCode::OK, "ready")
}
