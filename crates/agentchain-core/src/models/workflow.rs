//! Workflow documents as written by the visual editor.
//!
//! A document can be supplied as JSON or YAML:
//!
//! ```yaml
//! id: "7d0c2f4e-5b8a-4c1e-9f3a-2a6b1c9d8e70"
//! name: "Morning digest"
//! steps:
//!   - id: "7d0c2f4e-5b8a-4c1e-9f3a-2a6b1c9d8e70:read"
//!     kind: mailbox-read
//!   - id: "summarize"
//!     kind: text-generation
//!   - id: "post"
//!     kind: chat-webhook-send
//! connections:
//!   - { source: "7d0c2f4e-5b8a-4c1e-9f3a-2a6b1c9d8e70:read", target: "summarize" }
//!   - { source: "summarize", target: "post" }
//! ```
//!
//! The editor's own field names (`nodes`, `edges`, `type`) are accepted too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// The closed set of capabilities a step can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    TextGeneration,
    MailboxRead,
    MailboxSend,
    ChatWebhookSend,
    RepositoryCommitRead,
}

impl StepKind {
    pub const ALL: [StepKind; 5] = [
        StepKind::TextGeneration,
        StepKind::MailboxRead,
        StepKind::MailboxSend,
        StepKind::ChatWebhookSend,
        StepKind::RepositoryCommitRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text-generation",
            Self::MailboxRead => "mailbox-read",
            Self::MailboxSend => "mailbox-send",
            Self::ChatWebhookSend => "chat-webhook-send",
            Self::RepositoryCommitRead => "repository-commit-read",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EngineError::UnsupportedStepKind(s.to_string()))
    }
}

/// One node of a workflow. The kind is kept as the stored string so that
/// documents written by a newer editor still load; it is parsed into a
/// [`StepKind`] only when the step is about to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: String,
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind: kind.as_str().to_string(),
            label: None,
        }
    }

    pub fn kind(&self) -> Result<StepKind, EngineError> {
        self.kind.parse()
    }
}

/// Directed edge: `target` runs immediately after `source`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    #[serde(alias = "sourceStepId")]
    pub source: String,
    #[serde(alias = "targetStepId")]
    pub target: String,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "nodes")]
    pub steps: Vec<Step>,
    #[serde(default, alias = "edges")]
    pub connections: Vec<Connection>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Structural problems found in a workflow document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowIssue {
    DuplicateStepId(String),
    UnknownSource(String),
    /// Tolerated at run time: the chain simply ends at the source.
    UnknownTarget(String),
    /// Tolerated at run time: the first connection wins.
    DuplicateSource(String),
}

impl WorkflowIssue {
    /// Whether the document should be refused when saved.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DuplicateStepId(_) | Self::UnknownSource(_))
    }
}

impl fmt::Display for WorkflowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateStepId(id) => write!(f, "step id '{}' is used more than once", id),
            Self::UnknownSource(id) => write!(f, "connection source '{}' is not a step", id),
            Self::UnknownTarget(id) => write!(f, "connection target '{}' is not a step", id),
            Self::DuplicateSource(id) => {
                write!(f, "step '{}' is the source of more than one connection", id)
            }
        }
    }
}

impl Workflow {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            steps: Vec::new(),
            connections: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_connection(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.connections.push(Connection::new(source, target));
        self
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn contains_step(&self, id: &str) -> bool {
        self.step(id).is_some()
    }

    /// Report every structural issue, in document order.
    pub fn validate(&self) -> Vec<WorkflowIssue> {
        let mut issues = Vec::new();

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                issues.push(WorkflowIssue::DuplicateStepId(step.id.clone()));
            }
        }

        let mut sources = HashSet::new();
        for conn in &self.connections {
            if !ids.contains(conn.source.as_str()) {
                issues.push(WorkflowIssue::UnknownSource(conn.source.clone()));
            }
            if !ids.contains(conn.target.as_str()) {
                issues.push(WorkflowIssue::UnknownTarget(conn.target.clone()));
            }
            if !sources.insert(conn.source.as_str()) {
                issues.push(WorkflowIssue::DuplicateSource(conn.source.clone()));
            }
        }

        issues
    }

    /// Parse a workflow document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse workflow JSON: {}", e))
    }

    /// Parse a workflow document from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse workflow YAML: {}", e))
    }

    /// Load a workflow document from a file path; `.json` files are parsed
    /// as JSON, everything else as YAML.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read workflow file '{}': {}", path, e))?;
        if path.ends_with(".json") {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_kind_round_trips_through_str() {
        for kind in StepKind::ALL {
            assert_eq!(kind.as_str().parse::<StepKind>().unwrap(), kind);
        }
        let err = "fax-send".parse::<StepKind>().unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_STEP_KIND");
    }

    #[test]
    fn test_parse_editor_document() {
        let json = r#"{
            "id": "wf-1",
            "nodes": [
                { "id": "a", "type": "text-generation", "position": { "x": 0, "y": 0 } },
                { "id": "b", "type": "chat-webhook-send" }
            ],
            "edges": [ { "id": "e1", "source": "a", "target": "b" } ]
        }"#;
        let wf = Workflow::from_json(json).unwrap();
        assert_eq!(wf.steps.len(), 2);
        assert_eq!(wf.steps[1].kind().unwrap(), StepKind::ChatWebhookSend);
        assert_eq!(wf.connections, vec![Connection::new("a", "b")]);
        assert!(wf.validate().is_empty());
    }

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
id: "wf-2"
name: "Digest"
steps:
  - id: "read"
    kind: mailbox-read
  - id: "sum"
    kind: text-generation
    label: "Summarize"
connections:
  - source: "read"
    target: "sum"
"#;
        let wf = Workflow::from_yaml(yaml).unwrap();
        assert_eq!(wf.name, "Digest");
        assert_eq!(wf.step("sum").unwrap().label.as_deref(), Some("Summarize"));
    }

    #[test]
    fn test_validate_reports_anomalies() {
        let wf = Workflow::new("wf", "owner", "bad")
            .with_step(Step::new("a", StepKind::TextGeneration))
            .with_step(Step::new("a", StepKind::MailboxSend))
            .with_step(Step::new("b", StepKind::MailboxSend))
            .with_connection("a", "b")
            .with_connection("a", "ghost")
            .with_connection("nobody", "b");

        let issues = wf.validate();
        assert!(issues.contains(&WorkflowIssue::DuplicateStepId("a".into())));
        assert!(issues.contains(&WorkflowIssue::UnknownTarget("ghost".into())));
        assert!(issues.contains(&WorkflowIssue::DuplicateSource("a".into())));
        assert!(issues.contains(&WorkflowIssue::UnknownSource("nobody".into())));
        assert_eq!(issues.iter().filter(|i| i.is_fatal()).count(), 2);
    }
}
