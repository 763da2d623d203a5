use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::GatewayConfig,
    metrics,
    store::{DocumentStore, ElasticsearchStore},
    GatewayError, Result,
};

pub mod configs;
pub mod statistics;
pub mod workflows;

/// Dependencies handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: GatewayConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/configs", get(configs::list_configs))
        .route(
            "/configs/:platform_id",
            get(configs::get_config).put(configs::put_config),
        )
        .route("/workflows", get(workflows::list_workflows))
        .route(
            "/workflows/:workflow_id",
            get(workflows::get_workflow).put(workflows::put_workflow),
        )
        .route(
            "/statistics/:workflow_id",
            get(statistics::workflow_statistics),
        )
        .route(
            "/statistics/:workflow_id/:task_id",
            get(statistics::task_statistics),
        )
        .route(
            "/statistics/:workflow_id/:task_id/:experiment_id",
            get(statistics::experiment_statistics),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn prometheus_metrics() -> Result<String> {
    metrics::render()
}

pub async fn start_server(config: GatewayConfig) -> Result<()> {
    let store = Arc::new(ElasticsearchStore::new(&config.elasticsearch_url)?);
    let addr = config.listen_addr();
    let cors_enabled = config.cors_enabled;

    info!(
        "Using document store at {} (configs: {}, workflows: {})",
        config.elasticsearch_url, config.config_index, config.workflow_index
    );

    let mut app = router(AppState::new(store, config));
    if cors_enabled {
        app = app.layer(CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any));
    }
    app = app.layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        GatewayError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;
    info!("Starting monitoring gateway on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
