//! Chain walker: runs a linear workflow from a starting step.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │ successor
//! start ─► Executing(step, previous) ── materialize ── dispatch ── sink
//!            │                                   │
//!            │ no such step                      │ error
//!            ▼                                   ▼
//!        Completed                            Failed
//! ```
//!
//! Each run owns its record and the previous output; nothing is shared
//! between concurrent runs.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::materialize::materialize;
use super::ports::{ConfigSource, ResultSink, StepDispatcher, WorkflowSource};
use super::record::{ResultAggregator, RunRecord, RunStatus};
use super::resolver::WorkflowResolver;
use crate::capability::CapabilityError;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::workflow::{Connection, Workflow};

/// `source → target` lookup. The first connection leaving a step wins.
#[derive(Debug, Default)]
pub struct SuccessorMap {
    next: HashMap<String, String>,
}

impl SuccessorMap {
    pub fn build(workflow_id: &str, connections: &[Connection]) -> Self {
        let mut next = HashMap::new();
        for conn in connections {
            match next.entry(conn.source.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(conn.target.clone());
                }
                Entry::Occupied(kept) => {
                    tracing::warn!(
                        "[ChainWalker] Workflow {}: step {} has more than one successor, following {} and ignoring {}",
                        workflow_id,
                        conn.source,
                        kept.get(),
                        conn.target
                    );
                }
            }
        }
        Self { next }
    }

    pub fn successor(&self, step_id: &str) -> Option<&str> {
        self.next.get(step_id).map(String::as_str)
    }
}

enum WalkState {
    Executing {
        step_id: String,
        previous: Option<Value>,
    },
    Done(RunStatus),
}

/// Per-run bookkeeping.
struct Run<'a> {
    workflow: &'a Workflow,
    successors: SuccessorMap,
    owner_id: &'a str,
    visited: HashSet<String>,
    record: ResultAggregator,
}

#[derive(Clone)]
pub struct ChainWalker {
    resolver: WorkflowResolver,
    configs: Arc<dyn ConfigSource>,
    dispatcher: Arc<dyn StepDispatcher>,
    sink: Arc<dyn ResultSink>,
    step_timeout: Duration,
    max_steps: usize,
}

impl ChainWalker {
    pub fn new(
        workflows: Arc<dyn WorkflowSource>,
        configs: Arc<dyn ConfigSource>,
        dispatcher: Arc<dyn StepDispatcher>,
        sink: Arc<dyn ResultSink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            resolver: WorkflowResolver::new(workflows),
            configs,
            dispatcher,
            sink,
            step_timeout: config.step_timeout,
            max_steps: config.max_steps,
        }
    }

    /// Replace the default inference-then-scan resolver.
    pub fn with_resolver(mut self, resolver: WorkflowResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Walk the chain starting at `start_step_id`.
    ///
    /// `Err` is returned only for setup failures (no workflow owns the step,
    /// or a store could not be read). Failures of individual steps end the
    /// run with [`RunStatus::Failed`] and are recorded against the step.
    pub async fn run(&self, start_step_id: &str, owner_id: &str) -> Result<RunRecord, EngineError> {
        let workflow = self.resolver.resolve_workflow(start_step_id, owner_id).await?;
        if !workflow.contains_step(start_step_id) {
            return Err(EngineError::StepNotFound(start_step_id.to_string()));
        }

        tracing::info!(
            "[ChainWalker] Starting run of workflow {} at step {} (owner: {})",
            workflow.id,
            start_step_id,
            owner_id
        );

        let mut run = Run {
            workflow: &workflow,
            successors: SuccessorMap::build(&workflow.id, &workflow.connections),
            owner_id,
            visited: HashSet::new(),
            record: ResultAggregator::new(&workflow.id, start_step_id),
        };

        let mut state = WalkState::Executing {
            step_id: start_step_id.to_string(),
            previous: None,
        };
        let status = loop {
            state = match state {
                WalkState::Executing { step_id, previous } => self.advance(&mut run, step_id, previous).await,
                WalkState::Done(status) => break status,
            };
        };

        tracing::info!(
            "[ChainWalker] Run of workflow {} {:?} after {} step(s)",
            workflow.id,
            status,
            run.record.len()
        );
        Ok(run.record.finish(status))
    }

    /// Execute one step and decide where to go next.
    async fn advance(&self, run: &mut Run<'_>, step_id: String, previous: Option<Value>) -> WalkState {
        let workflow = run.workflow;
        let Some(step) = workflow.step(&step_id) else {
            tracing::warn!(
                "[ChainWalker] Successor {} is not a step of workflow {}, ending run",
                step_id,
                workflow.id
            );
            return WalkState::Done(RunStatus::Completed);
        };

        if !run.visited.insert(step_id.clone()) {
            return fail(run, &step_id, Some(step.kind.as_str()), EngineError::CycleDetected(step_id.clone()));
        }
        if run.record.len() >= self.max_steps {
            return fail(run, &step_id, Some(step.kind.as_str()), EngineError::StepLimitExceeded(self.max_steps));
        }

        let kind = match step.kind() {
            Ok(kind) => kind,
            Err(err) => return fail(run, &step_id, Some(step.kind.as_str()), err),
        };

        let settings = match self.configs.get_config(&step_id, kind, run.owner_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                let err = EngineError::StepNotConfigured {
                    step_id: step_id.clone(),
                    kind: kind.to_string(),
                };
                return fail(run, &step_id, Some(kind.as_str()), err);
            }
            Err(err) => return fail(run, &step_id, Some(kind.as_str()), err.into()),
        };

        let materialized = materialize(&settings, previous.as_ref());
        tracing::info!("[ChainWalker] Executing step {} ({})", step_id, kind);

        let dispatched = tokio::time::timeout(
            self.step_timeout,
            self.dispatcher.dispatch(kind, &materialized, previous.as_ref()),
        )
        .await
        .unwrap_or_else(|_| Err(CapabilityError::Timeout(self.step_timeout)));

        let output = match dispatched {
            Ok(output) => output,
            Err(err) => return fail(run, &step_id, Some(kind.as_str()), err.into()),
        };

        // Bounded like the dispatch; a stuck sink must not hold the run.
        match tokio::time::timeout(
            self.step_timeout,
            self.sink.record_step_output(run.owner_id, &step_id, &output),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!("[ResultSink] Failed to record output of step {}: {}", step_id, err);
            }
            Err(_) => {
                tracing::warn!(
                    "[ResultSink] Recording output of step {} timed out after {:?}",
                    step_id,
                    self.step_timeout
                );
            }
        }

        let next = run.successors.successor(&step_id).map(str::to_string);
        run.record.push_result(&step_id, Some(kind.as_str()), output.clone());

        match next {
            Some(next) => WalkState::Executing {
                step_id: next,
                previous: Some(output),
            },
            None => WalkState::Done(RunStatus::Completed),
        }
    }
}

fn fail(run: &mut Run<'_>, step_id: &str, kind: Option<&str>, err: EngineError) -> WalkState {
    tracing::warn!("[ChainWalker] Step {} failed: {}", step_id, err);
    run.record.push_error(step_id, kind, &err);
    WalkState::Done(RunStatus::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use crate::models::step_config::Settings;
    use crate::models::workflow::{Step, StepKind};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    // ─── Fakes ───────────────────────────────────────────────────────────

    struct Workflows(Vec<Workflow>);

    #[async_trait]
    impl WorkflowSource for Workflows {
        async fn load_workflow(&self, id: &str, owner: &str) -> Result<Option<Workflow>, ServerError> {
            Ok(self.0.iter().find(|w| w.id == id && w.owner_id == owner).cloned())
        }

        async fn load_workflows_by_owner(&self, owner: &str) -> Result<Vec<Workflow>, ServerError> {
            Ok(self.0.iter().filter(|w| w.owner_id == owner).cloned().collect())
        }
    }

    #[derive(Default)]
    struct Configs(HashMap<String, Settings>);

    impl Configs {
        fn with(mut self, step_id: &str, settings: Value) -> Self {
            self.0.insert(step_id.to_string(), settings.as_object().cloned().unwrap());
            self
        }
    }

    #[async_trait]
    impl ConfigSource for Configs {
        async fn get_config(&self, step_id: &str, _: StepKind, _: &str) -> Result<Option<Settings>, ServerError> {
            Ok(self.0.get(step_id).cloned())
        }
    }

    /// Echoes its settings back as the output; fails for steps whose
    /// settings contain `"fail": true`.
    #[derive(Default)]
    struct Echo {
        calls: Mutex<Vec<(StepKind, Settings)>>,
    }

    impl Echo {
        fn calls(&self) -> Vec<(StepKind, Settings)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StepDispatcher for Echo {
        async fn dispatch(
            &self,
            kind: StepKind,
            settings: &Settings,
            _previous: Option<&Value>,
        ) -> Result<Value, CapabilityError> {
            self.calls.lock().unwrap().push((kind, settings.clone()));
            if settings.get("fail") == Some(&json!(true)) {
                return Err(CapabilityError::Upstream {
                    service: "Gmail",
                    status: 400,
                    message: "Invalid To header".into(),
                });
            }
            if settings.get("sleep") == Some(&json!(true)) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(Value::Object(settings.clone()))
        }
    }

    #[derive(Default)]
    struct Sink {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResultSink for Sink {
        async fn record_step_output(&self, _: &str, step_id: &str, _: &Value) -> Result<(), ServerError> {
            self.seen.lock().unwrap().push(step_id.to_string());
            if self.fail {
                Err(ServerError::Database("disk full".into()))
            } else {
                Ok(())
            }
        }
    }

    fn chain(steps: &[&str]) -> Workflow {
        let mut wf = Workflow::new("wf-1", "alice", "chain");
        for s in steps {
            wf = wf.with_step(Step::new(*s, StepKind::TextGeneration));
        }
        for pair in steps.windows(2) {
            wf = wf.with_connection(pair[0], pair[1]);
        }
        wf
    }

    fn all_configured(steps: &[&str]) -> Configs {
        steps
            .iter()
            .fold(Configs::default(), |c, s| c.with(s, json!({ "prompt": format!("run {}", s) })))
    }

    fn walker(workflow: Workflow, configs: Configs, echo: Arc<Echo>, sink: Arc<Sink>) -> ChainWalker {
        ChainWalker::new(
            Arc::new(Workflows(vec![workflow])),
            Arc::new(configs),
            echo,
            sink,
            &EngineConfig::default(),
        )
    }

    // ─── Properties ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_chain_visits_every_step_in_order() {
        let echo = Arc::new(Echo::default());
        let w = walker(chain(&["a", "b", "c"]), all_configured(&["a", "b", "c"]), echo.clone(), Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b", "c"]);
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.success);
        assert_eq!(echo.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_previous_output_feeds_placeholders() {
        let echo = Arc::new(Echo::default());
        let configs = Configs::default()
            .with("a", json!({ "prompt": "first", "text": "Ada" }))
            .with("b", json!({ "prompt": "Hello {{input.text}}", "n": 3, "missing": "{{input.nope}}" }));
        let w = walker(chain(&["a", "b"]), configs, echo.clone(), Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        let b = record.results[1].result().unwrap();
        assert_eq!(b["prompt"], "Hello Ada");
        assert_eq!(b["n"], 3);
        assert_eq!(b["missing"], "{{input.nope}}");
    }

    #[tokio::test]
    async fn test_failure_stops_the_chain() {
        let echo = Arc::new(Echo::default());
        let configs = all_configured(&["a", "c"]).with("b", json!({ "fail": true }));
        let w = walker(chain(&["a", "b", "c"]), configs, echo.clone(), Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b"]);
        assert_eq!(record.status, RunStatus::Failed);
        let err = record.results[1].error().unwrap();
        assert_eq!(err.code, "CAPABILITY_ERROR");
        assert_eq!(err.upstream_status, Some(400));
        assert!(err.message.contains("Invalid To header"));
        assert_eq!(echo.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_start_records_one_error() {
        let echo = Arc::new(Echo::default());
        let w = walker(chain(&["a", "b"]), Configs::default(), echo.clone(), Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.results.len(), 1);
        assert_eq!(record.results[0].error().unwrap().code, "STEP_NOT_CONFIGURED");
        assert!(!record.success);
        assert!(echo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dangling_successor_completes() {
        let echo = Arc::new(Echo::default());
        let wf = chain(&["a", "b"]).with_connection("b", "ghost");
        let w = walker(wf, all_configured(&["a", "b"]), echo, Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b"]);
        assert_eq!(record.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_change_the_record() {
        let ok_sink = Arc::new(Sink::default());
        let bad_sink = Arc::new(Sink {
            fail: true,
            ..Default::default()
        });
        let steps = ["a", "b", "c"];

        let ok = walker(chain(&steps), all_configured(&steps), Arc::default(), ok_sink.clone())
            .run("a", "alice")
            .await
            .unwrap();
        let bad = walker(chain(&steps), all_configured(&steps), Arc::default(), bad_sink.clone())
            .run("a", "alice")
            .await
            .unwrap();

        assert_eq!(ok, bad);
        assert_eq!(bad_sink.seen.lock().unwrap().len(), 3);
        assert_eq!(*ok_sink.seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_duplicate_source_follows_first_connection() {
        let echo = Arc::new(Echo::default());
        let wf = chain(&["a", "b", "c"]).with_connection("a", "c");
        let w = walker(wf, all_configured(&["a", "b", "c"]), echo, Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_cycle_is_fatal() {
        let wf = chain(&["a", "b"]).with_connection("b", "a");
        let w = walker(wf, all_configured(&["a", "b"]), Arc::default(), Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b", "a"]);
        assert_eq!(record.results[2].error().unwrap().code, "CYCLE_DETECTED");
        assert_eq!(record.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_step_limit() {
        let steps = ["a", "b", "c"];
        let w = ChainWalker::new(
            Arc::new(Workflows(vec![chain(&steps)])),
            Arc::new(all_configured(&steps)),
            Arc::new(Echo::default()),
            Arc::new(Sink::default()),
            &EngineConfig::default().with_max_steps(2),
        );

        let record = w.run("a", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b", "c"]);
        assert_eq!(record.results[2].error().unwrap().code, "STEP_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_fast() {
        let mut wf = chain(&["a", "b"]);
        wf.steps[1].kind = "fax-send".to_string();
        let echo = Arc::new(Echo::default());
        let w = walker(wf, all_configured(&["a", "b"]), echo.clone(), Arc::default());

        let record = w.run("a", "alice").await.unwrap();
        let err = record.results[1].error().unwrap();
        assert_eq!(err.code, "UNSUPPORTED_STEP_KIND");
        assert_eq!(record.results[1].kind.as_deref(), Some("fax-send"));
        assert_eq!(echo.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_step_timeout() {
        let w = ChainWalker::new(
            Arc::new(Workflows(vec![chain(&["a"])])),
            Arc::new(Configs::default().with("a", json!({ "sleep": true }))),
            Arc::new(Echo::default()),
            Arc::new(Sink::default()),
            &EngineConfig::default().with_step_timeout(Duration::from_millis(50)),
        );

        let record = w.run("a", "alice").await.unwrap();
        let err = record.results[0].error().unwrap();
        assert_eq!(err.code, "CAPABILITY_ERROR");
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_setup_errors() {
        let w = walker(chain(&["a"]), all_configured(&["a"]), Arc::default(), Arc::default());

        let err = w.run("zzz", "alice").await.unwrap_err();
        assert_eq!(err.code(), "WORKFLOW_NOT_FOUND");
        let err = w.run("a", "bob").await.unwrap_err();
        assert_eq!(err.code(), "WORKFLOW_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_run_can_start_mid_chain() {
        let echo = Arc::new(Echo::default());
        let w = walker(chain(&["a", "b", "c"]), all_configured(&["a", "b", "c"]), echo, Arc::default());
        let record = w.run("b", "alice").await.unwrap();
        assert_eq!(record.step_ids(), vec!["b", "c"]);
        assert_eq!(record.start_step_id, "b");
    }

    #[tokio::test]
    async fn test_inference_only_resolver_does_not_scan() {
        let workflows: Arc<dyn WorkflowSource> = Arc::new(Workflows(vec![chain(&["a", "b"])]));
        let w = walker(chain(&["a", "b"]), all_configured(&["a", "b"]), Arc::default(), Arc::default())
            .with_resolver(WorkflowResolver::with_strategies(
                workflows,
                vec![Box::new(crate::workflow::resolver::IdInference)],
            ));

        let err = w.run("a", "alice").await.unwrap_err();
        assert!(matches!(err, EngineError::WorkflowNotFound(ref id) if id == "a"));
    }

    struct StuckSink;

    #[async_trait]
    impl ResultSink for StuckSink {
        async fn record_step_output(&self, _: &str, _: &str, _: &Value) -> Result<(), ServerError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stuck_sink_does_not_hold_the_run() {
        let config = EngineConfig::default().with_step_timeout(Duration::from_millis(100));
        let w = ChainWalker::new(
            Arc::new(Workflows(vec![chain(&["a", "b"])])),
            Arc::new(all_configured(&["a", "b"])),
            Arc::new(Echo::default()),
            Arc::new(StuckSink),
            &config,
        );

        let record = tokio::time::timeout(Duration::from_secs(2), w.run("a", "alice"))
            .await
            .expect("run should finish despite the stuck sink")
            .unwrap();
        assert_eq!(record.step_ids(), vec!["a", "b"]);
        assert!(record.success);
    }
}
