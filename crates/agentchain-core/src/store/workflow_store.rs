use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::workflow::{Connection, Step, Workflow};
use crate::workflow::ports::WorkflowSource;

const WORKFLOW_COLUMNS: &str = "id, owner_id, name, steps, connections, created_at, updated_at";

#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, workflow: &Workflow) -> Result<(), ServerError> {
        let wf = workflow.clone();
        let steps = serde_json::to_string(&wf.steps)
            .map_err(|e| ServerError::Internal(format!("Failed to encode steps: {}", e)))?;
        let connections = serde_json::to_string(&wf.connections)
            .map_err(|e| ServerError::Internal(format!("Failed to encode connections: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, owner_id, name, steps, connections, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(owner_id, id) DO UPDATE SET
                       name = excluded.name,
                       steps = excluded.steps,
                       connections = excluded.connections,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        wf.id,
                        wf.owner_id,
                        wf.name,
                        steps,
                        connections,
                        wf.created_at.timestamp_millis(),
                        wf.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str, owner_id: &str) -> Result<Option<Workflow>, ServerError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!(
                        "SELECT {} FROM workflows WHERE id = ?1 AND owner_id = ?2",
                        WORKFLOW_COLUMNS
                    ),
                    rusqlite::params![id, owner_id],
                    |row| Ok(row_to_workflow(row)),
                )
                .optional()
            })
            .await
    }

    /// All workflows of an owner, oldest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Workflow>, ServerError> {
        let owner_id = owner_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflows WHERE owner_id = ?1 ORDER BY created_at ASC, id ASC",
                    WORKFLOW_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![owner_id], |row| Ok(row_to_workflow(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        let owner_id = owner_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "DELETE FROM workflows WHERE id = ?1 AND owner_id = ?2",
                    rusqlite::params![id, owner_id],
                )?;
                Ok(n > 0)
            })
            .await
    }
}

#[async_trait]
impl WorkflowSource for WorkflowStore {
    async fn load_workflow(
        &self,
        workflow_id: &str,
        owner_id: &str,
    ) -> Result<Option<Workflow>, ServerError> {
        self.get(workflow_id, owner_id).await
    }

    async fn load_workflows_by_owner(&self, owner_id: &str) -> Result<Vec<Workflow>, ServerError> {
        self.list_by_owner(owner_id).await
    }
}

fn row_to_workflow(row: &Row<'_>) -> Workflow {
    let id: String = row.get(0).unwrap_or_default();
    let steps_str: String = row.get(3).unwrap_or_default();
    let connections_str: String = row.get(4).unwrap_or_default();
    let steps: Vec<Step> = decode_column(&id, "steps", &steps_str);
    let connections: Vec<Connection> = decode_column(&id, "connections", &connections_str);
    let created_ms: i64 = row.get(5).unwrap_or(0);
    let updated_ms: i64 = row.get(6).unwrap_or(0);

    Workflow {
        id,
        owner_id: row.get(1).unwrap_or_default(),
        name: row.get(2).unwrap_or_default(),
        steps,
        connections,
        created_at: chrono::DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms).unwrap_or_else(Utc::now),
    }
}

/// A corrupt column loads as empty, so the workflow stays listable.
fn decode_column<T: serde::de::DeserializeOwned>(workflow_id: &str, column: &str, raw: &str) -> Vec<T> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(
            "[WorkflowStore] Workflow {}: cannot decode {} column, treating it as empty: {}",
            workflow_id,
            column,
            e
        );
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::StepKind;

    fn sample(id: &str, owner: &str) -> Workflow {
        Workflow::new(id, owner, "sample")
            .with_step(Step::new("a", StepKind::TextGeneration))
            .with_step(Step::new("b", StepKind::ChatWebhookSend))
            .with_connection("a", "b")
    }

    #[tokio::test]
    async fn test_save_and_get_is_owner_scoped() {
        let store = WorkflowStore::new(Database::open_in_memory().unwrap());
        store.save(&sample("wf-1", "alice")).await.unwrap();

        let loaded = store.get("wf-1", "alice").await.unwrap().unwrap();
        assert_eq!(loaded.steps.len(), 2);
        assert_eq!(loaded.connections, vec![Connection::new("a", "b")]);
        assert!(store.get("wf-1", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_upserts_and_delete() {
        let store = WorkflowStore::new(Database::open_in_memory().unwrap());
        store.save(&sample("wf-1", "alice")).await.unwrap();

        let mut changed = sample("wf-1", "alice");
        changed.name = "renamed".to_string();
        changed.connections.clear();
        store.save(&changed).await.unwrap();

        let all = store.list_by_owner("alice").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "renamed");
        assert!(all[0].connections.is_empty());

        assert!(store.delete("wf-1", "alice").await.unwrap());
        assert!(!store.delete("wf-1", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_steps_column_loads_as_empty_workflow() {
        let store = WorkflowStore::new(Database::open_in_memory().unwrap());
        store.save(&sample("wf-1", "alice")).await.unwrap();
        store
            .db
            .with_conn(|conn| {
                conn.execute("UPDATE workflows SET steps = 'not json' WHERE id = 'wf-1'", [])
            })
            .unwrap();

        let loaded = store.get("wf-1", "alice").await.unwrap().unwrap();
        assert!(loaded.steps.is_empty());
        assert_eq!(loaded.connections, vec![Connection::new("a", "b")]);
        assert_eq!(store.list_by_owner("alice").await.unwrap().len(), 1);
    }

    #[test]
    fn test_decode_column_falls_back_to_empty() {
        let steps: Vec<Step> = decode_column("wf", "steps", "{oops");
        assert!(steps.is_empty());
        let conns: Vec<Connection> = decode_column("wf", "connections", r#"[{"source":"a","target":"b"}]"#);
        assert_eq!(conns.len(), 1);
    }
}
