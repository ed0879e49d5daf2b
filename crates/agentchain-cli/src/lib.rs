//! agentchain CLI: command implementations shared by the `agentchain`
//! binary and its integration tests.

pub mod commands;
