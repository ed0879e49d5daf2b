//! Finding the workflow that owns a step when only the step id is known.
//!
//! Two strategies sit behind [`ResolveStrategy`]:
//!
//! - [`IdInference`]: the editor sometimes prefixes step ids with the id of
//!   their workflow (`<workflowId>:<rest>`, or a bare UUID followed by
//!   anything). The candidate is loaded directly and checked.
//! - [`OwnerScan`]: loads every workflow of the owner and looks for the
//!   step, first match in listing order wins.
//!
//! [`WorkflowResolver`] tries its strategies in order.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::ports::WorkflowSource;
use crate::error::{EngineError, ServerError};
use crate::models::workflow::Workflow;

const UUID_LEN: usize = 36;

#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy could not place the step.
    async fn resolve(
        &self,
        source: &dyn WorkflowSource,
        step_id: &str,
        owner_id: &str,
    ) -> Result<Option<Workflow>, ServerError>;
}

/// Fast path: derive the workflow id from the step id itself.
pub struct IdInference;

impl IdInference {
    /// Workflow id candidates embedded in a step id, most specific first.
    pub fn candidates(step_id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some((prefix, rest)) = step_id.split_once(':') {
            if !prefix.is_empty() && !rest.is_empty() {
                out.push(prefix.to_string());
            }
        }
        if let Some(head) = step_id.get(..UUID_LEN) {
            if step_id.len() > UUID_LEN && Uuid::parse_str(head).is_ok() && !out.iter().any(|c| c == head) {
                out.push(head.to_string());
            }
        }
        out
    }
}

#[async_trait]
impl ResolveStrategy for IdInference {
    fn name(&self) -> &'static str {
        "id-inference"
    }

    async fn resolve(
        &self,
        source: &dyn WorkflowSource,
        step_id: &str,
        owner_id: &str,
    ) -> Result<Option<Workflow>, ServerError> {
        for candidate in Self::candidates(step_id) {
            if let Some(workflow) = source.load_workflow(&candidate, owner_id).await? {
                if workflow.contains_step(step_id) {
                    return Ok(Some(workflow));
                }
            }
        }
        Ok(None)
    }
}

/// Slow path: linear scan of the owner's workflows.
pub struct OwnerScan;

#[async_trait]
impl ResolveStrategy for OwnerScan {
    fn name(&self) -> &'static str {
        "owner-scan"
    }

    async fn resolve(
        &self,
        source: &dyn WorkflowSource,
        step_id: &str,
        owner_id: &str,
    ) -> Result<Option<Workflow>, ServerError> {
        let workflows = source.load_workflows_by_owner(owner_id).await?;
        Ok(workflows.into_iter().find(|wf| wf.contains_step(step_id)))
    }
}

#[derive(Clone)]
pub struct WorkflowResolver {
    source: Arc<dyn WorkflowSource>,
    strategies: Arc<Vec<Box<dyn ResolveStrategy>>>,
}

impl WorkflowResolver {
    /// Id inference first, then the owner scan.
    pub fn new(source: Arc<dyn WorkflowSource>) -> Self {
        Self::with_strategies(source, vec![Box::new(IdInference), Box::new(OwnerScan)])
    }

    pub fn with_strategies(
        source: Arc<dyn WorkflowSource>,
        strategies: Vec<Box<dyn ResolveStrategy>>,
    ) -> Self {
        Self {
            source,
            strategies: Arc::new(strategies),
        }
    }

    pub async fn resolve_workflow(&self, step_id: &str, owner_id: &str) -> Result<Workflow, EngineError> {
        for strategy in self.strategies.iter() {
            if let Some(workflow) = strategy.resolve(self.source.as_ref(), step_id, owner_id).await? {
                tracing::debug!(
                    "[WorkflowResolver] Step {} resolved to workflow {} via {}",
                    step_id,
                    workflow.id,
                    strategy.name()
                );
                return Ok(workflow);
            }
        }
        Err(EngineError::WorkflowNotFound(step_id.to_string()))
    }
}
