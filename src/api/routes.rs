//! HTTP server setup.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, StoreKind};
use crate::service::TaskService;
use crate::store::{MemoryTaskRepository, SharedTaskRepository, SqliteTaskRepository};

use super::tasks;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tasks: TaskService,
}

impl AppState {
    pub fn new(config: Config, tasks: TaskService) -> Self {
        Self { config, tasks }
    }
}

/// Open the repository selected by `config`.
pub fn open_store(config: &Config) -> anyhow::Result<SharedTaskRepository> {
    let repo: SharedTaskRepository = match &config.store {
        StoreKind::Memory => {
            tracing::info!("Using in-memory task store");
            Arc::new(MemoryTaskRepository::new())
        }
        StoreKind::Sqlite(path) => Arc::new(
            SqliteTaskRepository::open(path)
                .with_context(|| format!("Failed to open task database {}", path.display()))?,
        ),
    };
    Ok(repo)
}

/// CORS for the single configured browser origin.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("Invalid CORS origin: {}", origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any))
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.cors_origin)?;
    Ok(Router::new()
        .merge(tasks::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let repo = open_store(&config)?;
    let state = Arc::new(AppState::new(config.clone(), TaskService::new(repo)));
    let app = router(state)?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("CORS origin: {}", config.cors_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests...");
}
