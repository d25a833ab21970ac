//! # grievance-api — Axum API Service for the Grievance Engine
//!
//! Exposes the grievance lifecycle, agreement step templates, the audit
//! event log and step-duration analytics over HTTP. Every request is scoped
//! to the caller's organization; cross-organization lookups answer 404.
//!
//! ## API Surface
//!
//! | Prefix                               | Module                    | Domain                |
//! |--------------------------------------|---------------------------|-----------------------|
//! | `/v1/grievances/*`                   | [`routes::grievances`]    | Lifecycle transitions |
//! | `/v1/events`                         | [`routes::events`]        | Audit event query     |
//! | `/v1/agreements/*/templates/*`       | [`routes::templates`]     | Step templates        |
//! | `/v1/analytics/*`                    | [`routes::analytics`]     | Duration analytics    |
//! | `/health/*`, `/metrics`              | this module               | Probes and scraping   |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Auto-generated OpenAPI spec via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and `/metrics` are mounted outside the auth
/// middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    // Body size limit: 1 MiB. Template sets are the largest payload.
    let api = Router::new()
        .merge(routes::grievances::router())
        .merge(routes::events::router())
        .merge(routes::templates::router())
        .merge(routes::analytics::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(Extension(auth_config))
        .layer(Extension(metrics.clone()))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics — Prometheus scrape endpoint.
///
/// Renders the installed recorder. Without one (tests, embedded use) only
/// the in-process request counters are reported.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => format!(
            "# TYPE grievance_api_requests counter\ngrievance_api_requests {}\n\
             # TYPE grievance_api_errors counter\ngrievance_api_errors {}\n",
            metrics.requests(),
            metrics.errors()
        )
        .into_response(),
    }
}

/// Liveness probe — the process is up.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 503 when the database is configured but unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }
    (StatusCode::OK, "ready").into_response()
}
