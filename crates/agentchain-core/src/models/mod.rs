pub mod api_key;
pub mod step_config;
pub mod step_output;
pub mod workflow;

pub use api_key::*;
pub use step_config::*;
pub use step_output::*;
pub use workflow::*;
