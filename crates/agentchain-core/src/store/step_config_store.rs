use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::step_config::{Settings, StepConfig};
use crate::models::workflow::StepKind;
use crate::workflow::ports::ConfigSource;

#[derive(Clone)]
pub struct StepConfigStore {
    db: Database,
}

impl StepConfigStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, config: &StepConfig) -> Result<(), ServerError> {
        let c = config.clone();
        let settings = serde_json::to_string(&c.settings)
            .map_err(|e| ServerError::Internal(format!("Failed to encode settings: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO step_configs (owner_id, step_id, step_kind, settings, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(owner_id, step_id, step_kind) DO UPDATE SET
                       settings = excluded.settings,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        c.owner_id,
                        c.step_id,
                        c.step_kind,
                        settings,
                        c.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(
        &self,
        step_id: &str,
        step_kind: &str,
        owner_id: &str,
    ) -> Result<Option<StepConfig>, ServerError> {
        let step_id = step_id.to_string();
        let step_kind = step_kind.to_string();
        let owner_id = owner_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT owner_id, step_id, step_kind, settings, updated_at
                     FROM step_configs WHERE owner_id = ?1 AND step_id = ?2 AND step_kind = ?3",
                    rusqlite::params![owner_id, step_id, step_kind],
                    |row| Ok(row_to_config(row)),
                )
                .optional()
            })
            .await
    }

    /// Every saved configuration of a step, whatever kind it was saved under.
    pub async fn list_by_step(
        &self,
        owner_id: &str,
        step_id: &str,
    ) -> Result<Vec<StepConfig>, ServerError> {
        let owner_id = owner_id.to_string();
        let step_id = step_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT owner_id, step_id, step_kind, settings, updated_at
                     FROM step_configs WHERE owner_id = ?1 AND step_id = ?2 ORDER BY step_kind",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner_id, step_id], |row| Ok(row_to_config(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn delete(
        &self,
        step_id: &str,
        step_kind: &str,
        owner_id: &str,
    ) -> Result<bool, ServerError> {
        let step_id = step_id.to_string();
        let step_kind = step_kind.to_string();
        let owner_id = owner_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "DELETE FROM step_configs WHERE owner_id = ?1 AND step_id = ?2 AND step_kind = ?3",
                    rusqlite::params![owner_id, step_id, step_kind],
                )?;
                Ok(n > 0)
            })
            .await
    }
}

#[async_trait]
impl ConfigSource for StepConfigStore {
    async fn get_config(
        &self,
        step_id: &str,
        kind: StepKind,
        owner_id: &str,
    ) -> Result<Option<Settings>, ServerError> {
        Ok(self
            .get(step_id, kind.as_str(), owner_id)
            .await?
            .map(|config| config.settings))
    }
}

fn row_to_config(row: &rusqlite::Row<'_>) -> StepConfig {
    let settings_str: String = row.get(3).unwrap_or_default();
    let updated_ms: i64 = row.get(4).unwrap_or(0);

    StepConfig {
        owner_id: row.get(0).unwrap_or_default(),
        step_id: row.get(1).unwrap_or_default(),
        step_kind: row.get(2).unwrap_or_default(),
        settings: serde_json::from_str(&settings_str).unwrap_or_default(),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms).unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_config_keyed_by_owner_step_and_kind() {
        let store = StepConfigStore::new(Database::open_in_memory().unwrap());
        let config = StepConfig::new(
            "alice",
            "step-1",
            "mailbox-send",
            settings(json!({ "to": "a@example.com", "subject": "{{input.text}}" })),
        );
        store.save(&config).await.unwrap();

        let found = store
            .get_config("step-1", StepKind::MailboxSend, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["subject"], "{{input.text}}");

        assert!(store
            .get_config("step-1", StepKind::TextGeneration, "alice")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_config("step-1", StepKind::MailboxSend, "bob")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_settings() {
        let store = StepConfigStore::new(Database::open_in_memory().unwrap());
        store
            .save(&StepConfig::new("alice", "s", "text-generation", settings(json!({ "prompt": "one" }))))
            .await
            .unwrap();
        store
            .save(&StepConfig::new("alice", "s", "text-generation", settings(json!({ "prompt": "two" }))))
            .await
            .unwrap();

        let all = store.list_by_step("alice", "s").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].settings["prompt"], "two");
        assert!(store.delete("s", "text-generation", "alice").await.unwrap());
    }
}
