//! agentchain core: transport-agnostic domain logic.
//!
//! This crate contains the workflow documents, the SQLite stores, the chain
//! engine and the capability executors. It has **no HTTP framework
//! dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `agentchain-server`)
//! - CLI tools (via `agentchain-cli`)
//! - embedding the engine in another service
//!
//! # Feature Flags
//!
//! - `axum`: enables `IntoResponse` impls on `ServerError` and `EngineError`
//!   for use in axum handlers.

pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sink;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use capability::{CapabilityError, DispatchTable};
pub use config::{CapabilityConfig, EngineConfig};
pub use db::Database;
pub use error::{EngineError, ServerError};
pub use state::{AppState, AppStateInner};
pub use workflow::{ChainWalker, RunRecord, RunStatus};
