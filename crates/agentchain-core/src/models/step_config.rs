use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw key/value settings of a step, as saved by the configuration UI.
/// String values may embed `{{input.<path>}}` placeholders.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// A step's saved configuration, keyed by `(owner_id, step_id, step_kind)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub owner_id: String,
    pub step_id: String,
    pub step_kind: String,
    pub settings: Settings,
    pub updated_at: DateTime<Utc>,
}

impl StepConfig {
    pub fn new(
        owner_id: impl Into<String>,
        step_id: impl Into<String>,
        step_kind: impl Into<String>,
        settings: Settings,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            step_id: step_id.into(),
            step_kind: step_kind.into(),
            settings,
            updated_at: Utc::now(),
        }
    }
}
