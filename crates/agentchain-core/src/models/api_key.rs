use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer key mapping an HTTP caller to the owner id its documents live under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub key: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}
