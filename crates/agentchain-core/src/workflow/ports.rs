//! Collaborator traits the chain engine consumes.
//!
//! The SQLite stores implement the workflow, configuration and sink
//! traits and `DispatchTable` implements [`StepDispatcher`]; tests and
//! embedders can supply their own.

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::CapabilityError;
use crate::error::ServerError;
use crate::models::step_config::Settings;
use crate::models::workflow::{StepKind, Workflow};

#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn load_workflow(
        &self,
        workflow_id: &str,
        owner_id: &str,
    ) -> Result<Option<Workflow>, ServerError>;

    async fn load_workflows_by_owner(&self, owner_id: &str) -> Result<Vec<Workflow>, ServerError>;
}

#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn get_config(
        &self,
        step_id: &str,
        kind: StepKind,
        owner_id: &str,
    ) -> Result<Option<Settings>, ServerError>;
}

/// Receives every successful step output. Errors are logged by the caller
/// and never fail a run.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record_step_output(
        &self,
        owner_id: &str,
        step_id: &str,
        output: &Value,
    ) -> Result<(), ServerError>;
}

/// Runs one materialized step against the executor of its kind.
#[async_trait]
pub trait StepDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        kind: StepKind,
        settings: &Settings,
        previous: Option<&Value>,
    ) -> Result<Value, CapabilityError>;
}
