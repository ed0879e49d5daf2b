use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::step_output::StepOutputRecord;
use crate::workflow::ports::ResultSink;

/// Append-only audit trail of step outputs; the default result sink.
#[derive(Clone)]
pub struct StepOutputStore {
    db: Database,
}

impl StepOutputStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        owner_id: &str,
        step_id: &str,
        output: &serde_json::Value,
    ) -> Result<StepOutputRecord, ServerError> {
        let record = StepOutputRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            step_id: step_id.to_string(),
            output: output.clone(),
            created_at: Utc::now(),
        };
        let r = record.clone();
        let output = serde_json::to_string(&r.output)
            .map_err(|e| ServerError::Internal(format!("Failed to encode output: {}", e)))?;
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO step_outputs (id, owner_id, step_id, output, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![r.id, r.owner_id, r.step_id, output, r.created_at.timestamp_millis()],
                )?;
                Ok(())
            })
            .await?;
        Ok(record)
    }

    /// Most recent outputs of a step, newest first.
    pub async fn list_by_step(
        &self,
        owner_id: &str,
        step_id: &str,
        limit: usize,
    ) -> Result<Vec<StepOutputRecord>, ServerError> {
        let owner_id = owner_id.to_string();
        let step_id = step_id.to_string();
        let limit = limit as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, owner_id, step_id, output, created_at FROM step_outputs
                     WHERE owner_id = ?1 AND step_id = ?2
                     ORDER BY created_at DESC, rowid DESC LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![owner_id, step_id, limit], |row| {
                        Ok(row_to_output(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

#[async_trait]
impl ResultSink for StepOutputStore {
    async fn record_step_output(
        &self,
        owner_id: &str,
        step_id: &str,
        output: &serde_json::Value,
    ) -> Result<(), ServerError> {
        self.record(owner_id, step_id, output).await.map(|_| ())
    }
}

fn row_to_output(row: &rusqlite::Row<'_>) -> StepOutputRecord {
    let output_str: String = row.get(3).unwrap_or_default();
    let created_ms: i64 = row.get(4).unwrap_or(0);

    StepOutputRecord {
        id: row.get(0).unwrap_or_default(),
        owner_id: row.get(1).unwrap_or_default(),
        step_id: row.get(2).unwrap_or_default(),
        output: serde_json::from_str(&output_str).unwrap_or(serde_json::Value::Null),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
    }
}
