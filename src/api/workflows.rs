use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::AppState;
use crate::{
    metrics::RequestTimer,
    models::{Href, Workflow},
    statistics::validate_identifier,
    GatewayError, Result,
};

pub async fn list_workflows(State(state): State<AppState>) -> Result<Json<BTreeMap<String, Href>>> {
    let _timer = RequestTimer::new("list_workflows");
    info!("Listing workflows");

    let docs = state
        .store
        .list(&state.config.workflow_index, state.config.list_limit)
        .await?;

    if docs.is_empty() {
        warn!("No workflows registered");
        return Err(GatewayError::NotFound("No workflows found".to_string()));
    }

    Ok(Json(
        docs.into_iter()
            .map(|d| {
                let href = Href::new(state.config.workflow_href(&d.id));
                (d.id, href)
            })
            .collect(),
    ))
}

pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Value>> {
    let _timer = RequestTimer::new("get_workflow");
    info!("Getting workflow {}", workflow_id);

    let workflow = state
        .store
        .get(&state.config.workflow_index, &workflow_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("Workflow {} not found", workflow_id)))?;

    Ok(Json(workflow))
}

pub async fn put_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(workflow): Json<Workflow>,
) -> Result<Json<Href>> {
    let _timer = RequestTimer::new("put_workflow");
    info!(
        "Storing workflow {} with tasks {:?}",
        workflow_id,
        workflow.task_names()
    );

    // Task measurements live in `<workflow>_<task>` indices.
    validate_identifier("workflow", &workflow_id)?;
    for task in workflow.task_names() {
        validate_identifier("task", task)?;
    }

    let document = serde_json::to_value(&workflow)?;
    state
        .store
        .put(&state.config.workflow_index, &workflow_id, &document)
        .await?;

    Ok(Json(Href::new(state.config.workflow_href(&workflow_id))))
}
