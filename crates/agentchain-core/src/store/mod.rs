pub mod api_key_store;
pub mod step_config_store;
pub mod step_output_store;
pub mod workflow_store;

pub use api_key_store::ApiKeyStore;
pub use step_config_store::StepConfigStore;
pub use step_output_store::StepOutputStore;
pub use workflow_store::WorkflowStore;
