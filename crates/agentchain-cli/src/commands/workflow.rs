//! `agentchain workflow`: workflow document management.

use agentchain_core::models::workflow::Workflow;
use agentchain_core::AppState;

use super::{print_json, print_serialized};

/// Load a JSON or YAML document, take ownership of it and save it.
///
/// Returns the stored workflow so callers can inspect what was written.
pub async fn import(
    state: &AppState,
    file: &str,
    owner: &str,
    id: Option<&str>,
) -> Result<Workflow, String> {
    let mut workflow = Workflow::from_file(file)?;
    if let Some(id) = id {
        workflow.id = id.to_string();
    }
    if workflow.id.trim().is_empty() {
        return Err(format!("Workflow in '{}' has no id; pass --id", file));
    }
    workflow.owner_id = owner.to_string();
    workflow.updated_at = chrono::Utc::now();

    let issues = workflow.validate();
    let fatal: Vec<String> = issues
        .iter()
        .filter(|issue| issue.is_fatal())
        .map(|issue| issue.to_string())
        .collect();
    if !fatal.is_empty() {
        return Err(format!("Invalid workflow '{}': {}", workflow.id, fatal.join("; ")));
    }
    for issue in &issues {
        tracing::warn!("[Workflow] {}: {}", workflow.id, issue);
    }

    state
        .workflow_store
        .save(&workflow)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "Imported workflow {} ({} steps, {} connections) for {}",
        workflow.id,
        workflow.steps.len(),
        workflow.connections.len(),
        owner
    );
    Ok(workflow)
}

pub async fn list(state: &AppState, owner: &str) -> Result<(), String> {
    let workflows = state
        .workflow_store
        .list_by_owner(owner)
        .await
        .map_err(|e| e.to_string())?;

    let summaries: Vec<serde_json::Value> = workflows
        .iter()
        .map(|wf| {
            serde_json::json!({
                "id": wf.id,
                "name": wf.name,
                "steps": wf.steps.len(),
                "updatedAt": wf.updated_at,
            })
        })
        .collect();
    print_json(&serde_json::json!({ "workflows": summaries }));
    Ok(())
}

pub async fn show(state: &AppState, id: &str, owner: &str) -> Result<(), String> {
    let workflow = state
        .workflow_store
        .get(id, owner)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Workflow {} not found", id))?;
    print_serialized(&workflow)
}
