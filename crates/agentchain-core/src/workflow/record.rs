//! Per-run trace of visited steps.
//!
//! Serialized entries look like
//!
//! ```json
//! { "stepId": "a", "kind": "text-generation", "result": { "text": "..." } }
//! { "stepId": "b", "kind": "mailbox-send", "error": { "code": "CAPABILITY_ERROR", "message": "..." } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl From<&EngineError> for StepError {
    fn from(err: &EngineError) -> Self {
        let upstream_status = match err {
            EngineError::Capability(inner) => inner.upstream_status(),
            _ => None,
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            upstream_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepOutcome {
    Result(Value),
    Error(StepError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEntry {
    pub step_id: String,
    /// Absent when the step's kind could not be determined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl RunEntry {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, StepOutcome::Error(_))
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            StepOutcome::Result(value) => Some(value),
            StepOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&StepError> {
        match &self.outcome {
            StepOutcome::Error(err) => Some(err),
            StepOutcome::Result(_) => None,
        }
    }
}

/// Outcome of one walk of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub workflow_id: String,
    pub start_step_id: String,
    pub status: RunStatus,
    pub success: bool,
    pub results: Vec<RunEntry>,
}

impl RunRecord {
    pub fn step_ids(&self) -> Vec<&str> {
        self.results.iter().map(|e| e.step_id.as_str()).collect()
    }

    /// Output of the last successful step.
    pub fn last_output(&self) -> Option<&Value> {
        self.results.iter().rev().find_map(|e| e.result())
    }
}

/// Append-only accumulator; entries keep visitation order.
#[derive(Debug)]
pub struct ResultAggregator {
    workflow_id: String,
    start_step_id: String,
    entries: Vec<RunEntry>,
}

impl ResultAggregator {
    pub fn new(workflow_id: impl Into<String>, start_step_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            start_step_id: start_step_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_result(&mut self, step_id: &str, kind: Option<&str>, output: Value) {
        self.entries.push(RunEntry {
            step_id: step_id.to_string(),
            kind: kind.map(str::to_string),
            outcome: StepOutcome::Result(output),
        });
    }

    pub fn push_error(&mut self, step_id: &str, kind: Option<&str>, err: &EngineError) {
        self.entries.push(RunEntry {
            step_id: step_id.to_string(),
            kind: kind.map(str::to_string),
            outcome: StepOutcome::Error(StepError::from(err)),
        });
    }

    pub fn finish(self, status: RunStatus) -> RunRecord {
        RunRecord {
            workflow_id: self.workflow_id,
            start_step_id: self.start_step_id,
            status,
            success: status == RunStatus::Completed,
            results: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use serde_json::json;

    #[test]
    fn test_entries_serialize_flat() {
        let mut agg = ResultAggregator::new("wf", "a");
        agg.push_result("a", Some("text-generation"), json!({ "text": "hi" }));
        agg.push_error(
            "b",
            Some("mailbox-send"),
            &EngineError::Capability(CapabilityError::Upstream {
                service: "Gmail",
                status: 403,
                message: "Forbidden".into(),
            }),
        );
        let record = agg.finish(RunStatus::Failed);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["results"][0], json!({ "stepId": "a", "kind": "text-generation", "result": { "text": "hi" } }));
        assert_eq!(json["results"][1]["error"]["code"], "CAPABILITY_ERROR");
        assert_eq!(json["results"][1]["error"]["upstreamStatus"], 403);
        assert!(json["results"][1].get("result").is_none());

        let back: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_order_and_last_output() {
        let mut agg = ResultAggregator::new("wf", "a");
        agg.push_result("a", None, json!(1));
        agg.push_result("b", None, json!(2));
        agg.push_error("c", None, &EngineError::UnsupportedStepKind("fax".into()));
        let record = agg.finish(RunStatus::Failed);

        assert_eq!(record.step_ids(), vec!["a", "b", "c"]);
        assert_eq!(record.last_output(), Some(&json!(2)));
        assert!(record.results[2].is_error());
    }
}
