#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use extpulse_store::SessionStore;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

mod client_ip;
mod config;
mod cors;
mod handlers;
mod telemetry;
mod views;

pub use config::{ApiConfig, DEFAULT_PORT};
pub use telemetry::RequestMetrics;
pub use views::Views;

pub const CRATE_NAME: &str = "extpulse-server";

/// Shared request context. The store handle is `None` when storage could
/// not be opened at startup: the process keeps serving and every
/// storage-touching route fails per-request.
#[derive(Clone)]
pub struct AppState {
    pub store: Option<Arc<dyn SessionStore>>,
    pub api: ApiConfig,
    pub metrics: Arc<RequestMetrics>,
    pub request_id_seed: Arc<AtomicU64>,
    pub views: Arc<Views>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Option<Arc<dyn SessionStore>>) -> Self {
        Self::with_config(store, ApiConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Option<Arc<dyn SessionStore>>, api: ApiConfig) -> Self {
        Self {
            store,
            api,
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
            views: Arc::new(Views::default()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard_handler))
        .route("/my-analytics", get(handlers::my_analytics_handler))
        .route("/api/sessions", post(handlers::ingest_session_handler))
        .route("/healthz", get(handlers::healthz_handler))
        .route("/readyz", get(handlers::readyz_handler))
        .route("/version", get(handlers::version_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(from_fn(cors::cors_middleware))
        .layer(DefaultBodyLimit::max(state.api.max_body_bytes))
        .with_state(state)
}
