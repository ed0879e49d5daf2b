use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted step output, written by the result sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutputRecord {
    pub id: String,
    pub owner_id: String,
    pub step_id: String,
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
