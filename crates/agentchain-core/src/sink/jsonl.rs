//! JSONL append-only result sink.
//!
//! Storage path: `<dir>/{YYYY-MM-DD}/outputs-{datetime}.jsonl`, one line per
//! recorded step output. A new file is started when the local date changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ServerError;
use crate::workflow::ports::ResultSink;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputLine {
    pub owner_id: String,
    pub step_id: String,
    pub output: Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JsonlResultSink {
    base_dir: PathBuf,
    current_file: Arc<Mutex<Option<CurrentFile>>>,
}

struct CurrentFile {
    date: String,
    path: PathBuf,
}

impl JsonlResultSink {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            current_file: Arc::new(Mutex::new(None)),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn append(&self, line: &OutputLine) -> Result<PathBuf, ServerError> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let mut current = self.current_file.lock().await;

        let path = match current.as_ref() {
            Some(cf) if cf.date == today => cf.path.clone(),
            _ => {
                let day_dir = self.base_dir.join(&today);
                fs::create_dir_all(&day_dir)
                    .await
                    .map_err(|e| ServerError::Internal(format!("Failed to create output dir: {}", e)))?;
                let path = day_dir.join(format!("outputs-{}.jsonl", Utc::now().format("%Y%m%d-%H%M%S")));
                *current = Some(CurrentFile {
                    date: today,
                    path: path.clone(),
                });
                path
            }
        };

        let mut json = serde_json::to_string(line)
            .map_err(|e| ServerError::Internal(format!("Failed to encode output line: {}", e)))?;
        json.push('\n');

        // Held across the write so lines from concurrent runs never interleave.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to open {}: {}", path.display(), e)))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to write {}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to flush {}: {}", path.display(), e)))?;
        drop(current);

        Ok(path)
    }
}

#[async_trait]
impl ResultSink for JsonlResultSink {
    async fn record_step_output(&self, owner_id: &str, step_id: &str, output: &Value) -> Result<(), ServerError> {
        let line = OutputLine {
            owner_id: owner_id.to_string(),
            step_id: step_id.to_string(),
            output: output.clone(),
            recorded_at: Utc::now(),
        };
        self.append(&line).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_lines_appended_to_one_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlResultSink::new(dir.path());

        sink.record_step_output("alice", "a", &json!({ "text": "one" })).await.unwrap();
        sink.record_step_output("alice", "b", &json!({ "text": "two" })).await.unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        let mut entries = std::fs::read_dir(dir.path().join(&today)).unwrap();
        let file = entries.next().unwrap().unwrap().path();
        assert!(entries.next().is_none());
        assert!(file.file_name().unwrap().to_string_lossy().starts_with("outputs-"));

        let content = std::fs::read_to_string(file).unwrap();
        let lines: Vec<OutputLine> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].step_id, "a");
        assert_eq!(lines[1].output["text"], "two");
    }
}
