//! # courier-api: HTTP Service for the Courier Marketplace
//!
//! Axum router over a [`courier_engine::Marketplace`]. Handlers translate
//! JSON to domain types, call the engine and map its errors to structured
//! responses; no marketplace rule lives here.
//!
//! ## API Surface
//!
//! | Prefix              | Module                  | Auth        |
//! |---------------------|-------------------------|-------------|
//! | `/v1/users`         | [`routes::users`]       | none        |
//! | `/v1/sensors`       | [`routes::sensors`]     | principal   |
//! | `/v1/sensors/readings` | [`routes::sensors`]  | none        |
//! | `/v1/contracts/*`   | [`routes::contracts`]   | reads optional, writes principal |
//! | `/v1/me/escrows`    | [`routes::escrows`]     | principal   |
//! | `/health/*`, `/metrics` | this module         | none        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## Crate Policy
//!
//! - Sits at the top of the dependency DAG.
//! - The only crate that knows about Postgres (`db`) and the process
//!   environment.
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::{AppConfig, AppState};

use axum::extract::State;
use axum::http::header;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

/// Assemble the full application router.
///
/// Health probes and `/metrics` are mounted outside the auth middleware so
/// they stay reachable without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::users::router())
        .merge(routes::sensors::router())
        .merge(routes::contracts::router())
        .merge(routes::escrows::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config));

    let ops = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics));

    Router::new().merge(ops).merge(api).with_state(state)
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 200 once the repository answers.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.market.ready().await.map_err(|e| {
        tracing::warn!(error = %e, "readiness check failed");
        AppError::Unavailable("repository not reachable".into())
    })?;
    Ok("ready")
}

/// Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::Unavailable("metrics recorder not installed".into()).into_response(),
    }
}
