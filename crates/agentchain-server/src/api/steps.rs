use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use agentchain_core::error::ServerError;
use agentchain_core::models::step_config::{Settings, StepConfig};
use agentchain_core::models::workflow::StepKind;
use agentchain_core::AppState;

use super::auth::Caller;

const DEFAULT_OUTPUT_LIMIT: usize = 20;
const MAX_OUTPUT_LIMIT: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{step_id}/config", get(list_step_configs))
        .route(
            "/{step_id}/config/{kind}",
            get(get_step_config).put(put_step_config).delete(delete_step_config),
        )
        .route("/{step_id}/outputs", get(list_step_outputs))
}

fn parse_kind(kind: &str) -> Result<StepKind, ServerError> {
    kind.parse::<StepKind>()
        .map_err(|e| ServerError::BadRequest(e.to_string()))
}

async fn list_step_configs(
    State(state): State<AppState>,
    caller: Caller,
    Path(step_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let configs = state
        .step_config_store
        .list_by_step(&caller.owner_id, &step_id)
        .await?;
    Ok(Json(serde_json::json!({ "configs": configs })))
}

async fn get_step_config(
    State(state): State<AppState>,
    caller: Caller,
    Path((step_id, kind)): Path<(String, String)>,
) -> Result<Json<StepConfig>, ServerError> {
    let kind = parse_kind(&kind)?;
    state
        .step_config_store
        .get(&step_id, kind.as_str(), &caller.owner_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ServerError::NotFound(format!("Step {} has no {} configuration", step_id, kind))
        })
}

/// Saves the settings object as-is; `{{input.*}}` placeholders are kept
/// and only resolved when the step runs.
async fn put_step_config(
    State(state): State<AppState>,
    caller: Caller,
    Path((step_id, kind)): Path<(String, String)>,
    Json(settings): Json<Settings>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let kind = parse_kind(&kind)?;
    let config = StepConfig::new(caller.owner_id, step_id, kind.as_str(), settings);
    state.step_config_store.save(&config).await?;
    Ok(Json(serde_json::json!({ "config": config })))
}

async fn delete_step_config(
    State(state): State<AppState>,
    caller: Caller,
    Path((step_id, kind)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let kind = parse_kind(&kind)?;
    if !state
        .step_config_store
        .delete(&step_id, kind.as_str(), &caller.owner_id)
        .await?
    {
        return Err(ServerError::NotFound(format!(
            "Step {} has no {} configuration",
            step_id, kind
        )));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct OutputsQuery {
    limit: Option<usize>,
}

async fn list_step_outputs(
    State(state): State<AppState>,
    caller: Caller,
    Path(step_id): Path<String>,
    Query(query): Query<OutputsQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_OUTPUT_LIMIT)
        .clamp(1, MAX_OUTPUT_LIMIT);
    let outputs = state
        .step_output_store
        .list_by_step(&caller.owner_id, &step_id, limit)
        .await?;
    Ok(Json(serde_json::json!({ "outputs": outputs })))
}
