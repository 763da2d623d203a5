use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::AppState;
use crate::{
    metrics::{self, RequestTimer},
    models::{MetricQuery, MetricSummary, Workflow},
    statistics::{build_query, data_index, flatten, validate_identifier, StatisticsParams},
    GatewayError, Result,
};

type QueryPairs = Query<Vec<(String, String)>>;

/// Statistics across every task of a workflow.
pub async fn workflow_statistics(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Query(pairs): QueryPairs,
) -> Result<Json<Vec<MetricSummary>>> {
    let _timer = RequestTimer::new("workflow_statistics");
    let params = StatisticsParams::from_pairs(pairs)?;
    validate_identifier("workflow", &workflow_id)?;
    info!("Statistics for workflow {}: {:?}", workflow_id, params.metrics);

    let source = state
        .store
        .get(&state.config.workflow_index, &workflow_id)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("Workflow {} not found", workflow_id)))?;
    let workflow: Workflow = serde_json::from_value(source)?;

    let mut indices: Vec<String> = Vec::new();
    for task in workflow.task_names() {
        validate_identifier("task", task)?;
        let index = data_index(&workflow_id, task);
        if !indices.contains(&index) {
            indices.push(index);
        }
    }

    if indices.is_empty() {
        warn!("Workflow {} has no tasks", workflow_id);
        return Err(GatewayError::NotFound(format!(
            "Workflow {} has no tasks",
            workflow_id
        )));
    }

    run_statistics(&state, &workflow_id, indices, params.into_query(None)).await
}

/// Statistics for one task of a workflow.
pub async fn task_statistics(
    State(state): State<AppState>,
    Path((workflow_id, task_id)): Path<(String, String)>,
    Query(pairs): QueryPairs,
) -> Result<Json<Vec<MetricSummary>>> {
    let _timer = RequestTimer::new("task_statistics");
    let params = StatisticsParams::from_pairs(pairs)?;
    info!(
        "Statistics for task {} of workflow {}: {:?}",
        task_id, workflow_id, params.metrics
    );

    let index = task_index(&state, &workflow_id, &task_id).await?;
    run_statistics(&state, &workflow_id, vec![index], params.into_query(None)).await
}

/// Statistics for one experiment of a task, selected by the document `type`.
pub async fn experiment_statistics(
    State(state): State<AppState>,
    Path((workflow_id, task_id, experiment_id)): Path<(String, String, String)>,
    Query(pairs): QueryPairs,
) -> Result<Json<Vec<MetricSummary>>> {
    let _timer = RequestTimer::new("experiment_statistics");
    let params = StatisticsParams::from_pairs(pairs)?;
    info!(
        "Statistics for experiment {} of task {} of workflow {}: {:?}",
        experiment_id, task_id, workflow_id, params.metrics
    );

    let index = task_index(&state, &workflow_id, &task_id).await?;
    let query = params.into_query(Some(experiment_id.as_str()));
    run_statistics(&state, &workflow_id, vec![index], query).await
}

/// Resolves the measurement index of a task and checks that it exists.
async fn task_index(state: &AppState, workflow_id: &str, task_id: &str) -> Result<String> {
    validate_identifier("workflow", workflow_id)?;
    validate_identifier("task", task_id)?;

    let index = data_index(workflow_id, task_id);
    if !state.store.index_exists(&index).await? {
        warn!("No measurements stored in {}", index);
        return Err(GatewayError::NotFound(format!(
            "No data found for task {} of workflow {}",
            task_id, workflow_id
        )));
    }
    Ok(index)
}

async fn run_statistics(
    state: &AppState,
    workflow_id: &str,
    indices: Vec<String>,
    query: MetricQuery,
) -> Result<Json<Vec<MetricSummary>>> {
    let body = build_query(&query)?;
    debug!("Aggregation query on {:?}: {}", indices, body);

    let response = state.store.search(&indices, &body).await?;
    let aggregations = match response.get("aggregations") {
        Some(aggregations) => aggregations,
        None if searched_nothing(&response) => {
            warn!("None of {:?} exist", indices);
            return Err(GatewayError::NotFound(format!(
                "No data found for workflow {}",
                workflow_id
            )));
        }
        None => {
            return Err(GatewayError::MalformedResponse(
                "search response has no aggregations".to_string(),
            ))
        }
    };

    let summaries = flatten(
        aggregations,
        &query.metrics,
        &state.config.workflow_href(workflow_id),
        query.time_range.is_some(),
    )?;

    for summary in summaries.iter().filter(|s| s.is_empty()) {
        metrics::record_empty_metric();
        warn!("No documents for metric {} in {:?}", summary.metric, indices);
    }

    Ok(Json(summaries))
}

/// A search over only unavailable indices touches no shard and omits `aggregations`.
fn searched_nothing(response: &Value) -> bool {
    let shards = response.pointer("/_shards/total").and_then(Value::as_u64);
    let hits = match response.pointer("/hits/total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(total) => total.get("value").and_then(Value::as_u64),
        None => None,
    };
    shards == Some(0) || hits == Some(0)
}
