#![forbid(unsafe_code)]

use extpulse_server::{build_router, ApiConfig, AppState, DEFAULT_PORT};
use extpulse_store::{SessionStore, SqliteSessionStore};
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("EXTPULSE_LOG_JSON", false) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let db_path = env::var("EXTPULSE_DB").unwrap_or_else(|_| "extpulse.sqlite".to_string());
    let port = env_u16("EXTPULSE_PORT", DEFAULT_PORT);
    let api = ApiConfig {
        max_body_bytes: env_usize("EXTPULSE_MAX_BODY_BYTES", 16 * 1024),
        ..ApiConfig::default()
    };

    // An unusable store is not fatal: the process keeps serving and each
    // storage-touching request fails on its own.
    let store: Option<Arc<dyn SessionStore>> = match SqliteSessionStore::open(Path::new(&db_path)) {
        Ok(store) => {
            info!("session store ready at {db_path}");
            Some(Arc::new(store))
        }
        Err(e) => {
            error!("session store open failed: {e}; serving without storage");
            None
        }
    };

    let state = AppState::with_config(store, api);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind failed on {addr}: {e}"))?;
    info!("extpulse-server listening on {addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown_signal())
    .await
    .map_err(|e| format!("server failed: {e}"))
}
