//! `agentchain outputs`: recorded outputs of a step, newest first.

use agentchain_core::AppState;

use super::print_serialized;

pub async fn list(state: &AppState, step_id: &str, owner: &str, limit: usize) -> Result<(), String> {
    let outputs = state
        .step_output_store
        .list_by_step(owner, step_id, limit.max(1))
        .await
        .map_err(|e| e.to_string())?;
    print_serialized(&serde_json::json!({ "outputs": outputs }))
}
