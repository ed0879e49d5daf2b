//! Shared application state for the HTTP server and the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use crate::capability::DispatchTable;
use crate::config::EngineConfig;
use crate::db::Database;
use crate::sink::{JsonlResultSink, ResultSinks};
use crate::store::{ApiKeyStore, StepConfigStore, StepOutputStore, WorkflowStore};
use crate::workflow::{ChainWalker, ResultSink, StepDispatcher};

pub struct AppStateInner {
    pub db: Database,
    pub workflow_store: WorkflowStore,
    pub step_config_store: StepConfigStore,
    pub step_output_store: StepOutputStore,
    pub api_key_store: ApiKeyStore,
    pub engine_config: EngineConfig,
    pub engine: ChainWalker,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// State with the HTTP capability executors.
    pub fn new(db: Database, engine_config: EngineConfig) -> Self {
        let dispatcher = Arc::new(DispatchTable::from_config(&engine_config.capabilities));
        Self::with_dispatcher(db, engine_config, dispatcher, None)
    }

    /// State with a caller-supplied dispatcher, optionally also writing
    /// step outputs as JSONL under `output_log_dir`.
    pub fn with_dispatcher(
        db: Database,
        engine_config: EngineConfig,
        dispatcher: Arc<dyn StepDispatcher>,
        output_log_dir: Option<PathBuf>,
    ) -> Self {
        let workflow_store = WorkflowStore::new(db.clone());
        let step_config_store = StepConfigStore::new(db.clone());
        let step_output_store = StepOutputStore::new(db.clone());

        let sink: Arc<dyn ResultSink> = match output_log_dir {
            Some(dir) => {
                tracing::info!("[ResultSink] Also writing step outputs to {}", dir.display());
                Arc::new(
                    ResultSinks::new()
                        .with(Arc::new(step_output_store.clone()))
                        .with(Arc::new(JsonlResultSink::new(dir))),
                )
            }
            None => Arc::new(step_output_store.clone()),
        };

        let engine = ChainWalker::new(
            Arc::new(workflow_store.clone()),
            Arc::new(step_config_store.clone()),
            dispatcher,
            sink,
            &engine_config,
        );

        Self {
            api_key_store: ApiKeyStore::new(db.clone()),
            workflow_store,
            step_config_store,
            step_output_store,
            engine_config,
            engine,
            db,
        }
    }
}
