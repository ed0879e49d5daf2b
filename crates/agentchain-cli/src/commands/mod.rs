//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the agentchain-core stores and engine through `AppState`.

pub mod config;
pub mod key;
pub mod outputs;
pub mod run;
pub mod server;
pub mod workflow;

use std::sync::Arc;

use agentchain_core::{AppState, AppStateInner, Database, EngineConfig};

/// Open the SQLite database and build a shared `AppState` with the HTTP
/// capability executors.
pub fn init_state(db_path: &str, engine: EngineConfig) -> Result<AppState, String> {
    let db = Database::open(db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;
    Ok(Arc::new(AppStateInner::new(db, engine)))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Serialize any value and pretty-print it.
pub fn print_serialized<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_value(value).map_err(|e| format!("Failed to encode output: {}", e))?;
    print_json(&json);
    Ok(())
}
