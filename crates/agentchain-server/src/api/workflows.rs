use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use agentchain_core::error::{EngineError, ServerError};
use agentchain_core::models::workflow::Workflow;
use agentchain_core::AppState;

use super::auth::Caller;

/// Static segments under `/api/workflows` that would shadow `/{id}`.
const RESERVED_IDS: &[&str] = &["execute"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows))
        .route("/execute", post(execute_workflow))
        .route(
            "/{id}",
            get(get_workflow).put(put_workflow).delete(delete_workflow),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    #[serde(alias = "startStepId")]
    start_element_id: String,
}

/// Runs the chain that starts at `startElementId`.
///
/// A walk that fails mid-chain still answers 200 with `success: false`;
/// only setup failures are HTTP errors.
async fn execute_workflow(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let start = body.start_element_id.trim();
    if start.is_empty() {
        return Err(
            ServerError::BadRequest("startElementId is required".to_string()).into_response(),
        );
    }

    let record = state
        .engine
        .run(start, &caller.owner_id)
        .await
        .map_err(EngineError::into_response)?;
    Ok(Json(serde_json::json!({
        "success": record.success,
        "workflowId": record.workflow_id,
        "status": record.status,
        "results": record.results,
    })))
}

async fn list_workflows(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<serde_json::Value>, ServerError> {
    let workflows = state.workflow_store.list_by_owner(&caller.owner_id).await?;
    Ok(Json(serde_json::json!({ "workflows": workflows })))
}

async fn get_workflow(
    State(state): State<AppState>,
    caller: Caller,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Json<Workflow>, ServerError> {
    state
        .workflow_store
        .get(&id, &caller.owner_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))
}

async fn put_workflow(
    State(state): State<AppState>,
    caller: Caller,
    axum::extract::Path(id): axum::extract::Path<String>,
    Json(mut workflow): Json<Workflow>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if RESERVED_IDS.contains(&id.as_str()) {
        return Err(ServerError::BadRequest(format!(
            "'{}' is reserved and cannot be used as a workflow id",
            id
        )));
    }

    // The path and the key decide identity, never the body.
    workflow.id = id;
    workflow.owner_id = caller.owner_id;
    workflow.updated_at = chrono::Utc::now();

    let issues = workflow.validate();
    let fatal: Vec<String> = issues
        .iter()
        .filter(|issue| issue.is_fatal())
        .map(|issue| issue.to_string())
        .collect();
    if !fatal.is_empty() {
        return Err(ServerError::BadRequest(fatal.join("; ")));
    }
    for issue in &issues {
        tracing::warn!("[Workflows] {}: {}", workflow.id, issue);
    }

    state.workflow_store.save(&workflow).await?;
    let warnings: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
    Ok(Json(serde_json::json!({ "workflow": workflow, "warnings": warnings })))
}

async fn delete_workflow(
    State(state): State<AppState>,
    caller: Caller,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if !state.workflow_store.delete(&id, &caller.owner_id).await? {
        return Err(ServerError::NotFound(format!("Workflow {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
