//! agentchain Server - HTTP trigger surface for linear agent chains
//!
//! A thin axum adapter over `agentchain-core`, providing:
//! - the chain trigger (`POST /api/workflows/execute`)
//! - workflow document and step configuration upload endpoints
//! - recorded step outputs and a health probe
//!
//! Domain logic, persistence and the engine itself live in the core crate.

pub mod api;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use agentchain_core::{AppState, AppStateInner, Database, EngineConfig};

/// Configuration for the agentchain HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub engine: EngineConfig,
    /// When set, step outputs are also appended as JSONL under this directory.
    pub output_log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3220,
            db_path: "agentchain.db".to_string(),
            engine: EngineConfig::default(),
            output_log_dir: None,
        }
    }
}

/// Create a shared `AppState` backed by the HTTP capability executors.
pub fn create_app_state(
    db_path: &str,
    engine: EngineConfig,
    output_log_dir: Option<PathBuf>,
) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;

    let dispatcher = Arc::new(agentchain_core::DispatchTable::from_config(&engine.capabilities));
    Ok(Arc::new(AppStateInner::with_dispatcher(
        db,
        engine,
        dispatcher,
        output_log_dir,
    )))
}

/// The full application router, without binding a listener.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // try_init: the CLI may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentchain=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting agentchain server on {}:{}",
        config.host,
        config.port
    );
    tracing::info!(
        "Step timeout {:?}, at most {} steps per run",
        config.engine.step_timeout,
        config.engine.max_steps
    );

    let state = create_app_state(
        &config.db_path,
        config.engine.clone(),
        config.output_log_dir.clone(),
    )?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("agentchain server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "agentchain-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
