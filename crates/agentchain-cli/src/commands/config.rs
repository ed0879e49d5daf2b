//! `agentchain config`: step configuration management.

use agentchain_core::models::step_config::{Settings, StepConfig};
use agentchain_core::models::workflow::StepKind;
use agentchain_core::AppState;

use super::print_serialized;

/// Read settings from `--json` or `--file`; exactly one must be given.
pub fn load_settings(file: Option<&str>, json: Option<&str>) -> Result<Settings, String> {
    let raw = match (file, json) {
        (Some(_), Some(_)) => return Err("Pass either --file or --json, not both".to_string()),
        (Some(path), None) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?,
        (None, Some(json)) => json.to_string(),
        (None, None) => return Err("Pass the settings with --file or --json".to_string()),
    };

    match serde_json::from_str::<serde_json::Value>(&raw)
        .map_err(|e| format!("Settings are not valid JSON: {}", e))?
    {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("Settings must be a JSON object, got {}", other)),
    }
}

pub async fn set(
    state: &AppState,
    step_id: &str,
    kind: &str,
    owner: &str,
    settings: Settings,
) -> Result<(), String> {
    let kind: StepKind = kind.parse().map_err(|e: agentchain_core::EngineError| e.to_string())?;
    let config = StepConfig::new(owner, step_id, kind.as_str(), settings);
    state
        .step_config_store
        .save(&config)
        .await
        .map_err(|e| e.to_string())?;
    println!("Saved {} configuration for step {}", kind, step_id);
    Ok(())
}

pub async fn show(state: &AppState, step_id: &str, kind: &str, owner: &str) -> Result<(), String> {
    let kind: StepKind = kind.parse().map_err(|e: agentchain_core::EngineError| e.to_string())?;
    let config = state
        .step_config_store
        .get(step_id, kind.as_str(), owner)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Step {} has no {} configuration", step_id, kind))?;
    print_serialized(&config)
}
