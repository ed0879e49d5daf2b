//! Linear workflow execution engine.
//!
//! # Architecture
//!
//! ```text
//! (startStepId, ownerId)
//!        │
//!        ▼
//! WorkflowResolver ── IdInference ─► OwnerScan      (WorkflowSource)
//!        │
//!        ▼
//! ChainWalker ── ConfigSource ─► materialize ─► StepDispatcher ─► ResultSink
//!        │
//!        ▼
//!    RunRecord
//! ```

pub mod materialize;
pub mod ports;
pub mod record;
pub mod resolver;
pub mod template;
pub mod walker;

pub use materialize::materialize;
pub use ports::{ConfigSource, ResultSink, StepDispatcher, WorkflowSource};
pub use record::{ResultAggregator, RunEntry, RunRecord, RunStatus, StepError, StepOutcome};
pub use resolver::{IdInference, OwnerScan, ResolveStrategy, WorkflowResolver};
pub use template::resolve;
pub use walker::{ChainWalker, SuccessorMap};
