//! Capability executors, one per step kind, and the table that routes a
//! step to its executor.
//!
//! ```text
//! Settings ──► StepRequest::build(kind) ──► DispatchTable ──► executor
//!                (validation, no I/O)                          │
//!                                           OpenAI / Anthropic, Gmail,
//!                                           chat webhook, GitHub
//! ```

pub mod chat_webhook;
pub mod dispatch;
pub mod error;
pub mod fields;
pub mod mailbox;
pub mod repo_commits;
pub mod text_generation;

pub use chat_webhook::{ChatWebhookOutput, ChatWebhookPoster, ChatWebhookRequest, HttpChatWebhook};
pub use dispatch::{DispatchTable, StepRequest};
pub use error::CapabilityError;
pub use mailbox::{
    GmailClient, MailSummary, MailboxReadOutput, MailboxReadRequest, MailboxReader, MailboxSendOutput,
    MailboxSendRequest, MailboxSender,
};
pub use repo_commits::{CommitReadOutput, CommitReadRequest, CommitReader, CommitSummary, GithubClient};
pub use text_generation::{HttpTextGenerator, TextGenerationOutput, TextGenerationRequest, TextGenerator};
