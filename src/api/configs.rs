use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::AppState;
use crate::{metrics::RequestTimer, models::Href, GatewayError, Result};

pub async fn list_configs(State(state): State<AppState>) -> Result<Json<Map<String, Value>>> {
    let _timer = RequestTimer::new("list_configs");
    info!("Listing platform configurations");

    let docs = state
        .store
        .list(&state.config.config_index, state.config.list_limit)
        .await?;

    if docs.is_empty() {
        warn!("No platform configurations stored");
        return Err(GatewayError::NotFound(
            "No platform configurations found".to_string(),
        ));
    }

    Ok(Json(docs.into_iter().map(|d| (d.id, d.source)).collect()))
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(platform_id): Path<String>,
) -> Result<Json<Value>> {
    let _timer = RequestTimer::new("get_config");
    info!("Getting configuration for platform {}", platform_id);

    let config = state
        .store
        .get(&state.config.config_index, &platform_id)
        .await?
        .ok_or_else(|| {
            GatewayError::NotFound(format!("Configuration for platform {} not found", platform_id))
        })?;

    Ok(Json(config))
}

pub async fn put_config(
    State(state): State<AppState>,
    Path(platform_id): Path<String>,
    Json(config): Json<Value>,
) -> Result<Json<Href>> {
    let _timer = RequestTimer::new("put_config");
    info!("Storing configuration for platform {}", platform_id);

    if !config.is_object() {
        return Err(GatewayError::InvalidQuery(
            "a platform configuration must be a JSON object".to_string(),
        ));
    }

    state
        .store
        .put(&state.config.config_index, &platform_id, &config)
        .await?;

    Ok(Json(Href::new(state.config.config_href(&platform_id))))
}
