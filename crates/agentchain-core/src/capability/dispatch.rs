//! Step kind → executor routing.
//!
//! A materialized configuration is first turned into the typed request of
//! its kind ([`StepRequest::build`]); required fields are checked there, so
//! a bad configuration never reaches the network. The request is then handed
//! to the executor registered for that kind.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::chat_webhook::{ChatWebhookPoster, ChatWebhookRequest, HttpChatWebhook};
use super::mailbox::{GmailClient, MailboxReadRequest, MailboxReader, MailboxSendRequest, MailboxSender};
use super::repo_commits::{CommitReadRequest, CommitReader, GithubClient};
use super::text_generation::{HttpTextGenerator, TextGenerationRequest, TextGenerator};
use super::CapabilityError;
use crate::config::CapabilityConfig;
use crate::models::step_config::Settings;
use crate::models::workflow::StepKind;
use crate::workflow::ports::StepDispatcher;

#[derive(Debug, Clone, PartialEq)]
pub enum StepRequest {
    TextGeneration(TextGenerationRequest),
    MailboxRead(MailboxReadRequest),
    MailboxSend(MailboxSendRequest),
    ChatWebhookSend(ChatWebhookRequest),
    RepositoryCommitRead(CommitReadRequest),
}

impl StepRequest {
    pub fn build(kind: StepKind, settings: &Settings, previous: Option<&Value>) -> Result<Self, CapabilityError> {
        Ok(match kind {
            StepKind::TextGeneration => {
                Self::TextGeneration(TextGenerationRequest::from_settings(settings, previous)?)
            }
            StepKind::MailboxRead => Self::MailboxRead(MailboxReadRequest::from_settings(settings)?),
            StepKind::MailboxSend => Self::MailboxSend(MailboxSendRequest::from_settings(settings)?),
            StepKind::ChatWebhookSend => Self::ChatWebhookSend(ChatWebhookRequest::from_settings(settings)?),
            StepKind::RepositoryCommitRead => {
                Self::RepositoryCommitRead(CommitReadRequest::from_settings(settings)?)
            }
        })
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Self::TextGeneration(_) => StepKind::TextGeneration,
            Self::MailboxRead(_) => StepKind::MailboxRead,
            Self::MailboxSend(_) => StepKind::MailboxSend,
            Self::ChatWebhookSend(_) => StepKind::ChatWebhookSend,
            Self::RepositoryCommitRead(_) => StepKind::RepositoryCommitRead,
        }
    }
}

/// One executor per step kind.
#[derive(Clone)]
pub struct DispatchTable {
    text_generator: Arc<dyn TextGenerator>,
    mailbox_reader: Arc<dyn MailboxReader>,
    mailbox_sender: Arc<dyn MailboxSender>,
    chat_webhook: Arc<dyn ChatWebhookPoster>,
    commit_reader: Arc<dyn CommitReader>,
}

impl DispatchTable {
    /// HTTP executors sharing one client.
    pub fn from_config(config: &CapabilityConfig) -> Self {
        let client = config.http_client();
        let gmail = Arc::new(GmailClient::new(client.clone(), config.clone()));
        Self {
            text_generator: Arc::new(HttpTextGenerator::new(client.clone(), config.clone())),
            mailbox_reader: gmail.clone(),
            mailbox_sender: gmail,
            chat_webhook: Arc::new(HttpChatWebhook::new(client.clone())),
            commit_reader: Arc::new(GithubClient::new(client, config.clone())),
        }
    }

    pub fn with_text_generator(mut self, executor: Arc<dyn TextGenerator>) -> Self {
        self.text_generator = executor;
        self
    }

    pub fn with_mailbox_reader(mut self, executor: Arc<dyn MailboxReader>) -> Self {
        self.mailbox_reader = executor;
        self
    }

    pub fn with_mailbox_sender(mut self, executor: Arc<dyn MailboxSender>) -> Self {
        self.mailbox_sender = executor;
        self
    }

    pub fn with_chat_webhook(mut self, executor: Arc<dyn ChatWebhookPoster>) -> Self {
        self.chat_webhook = executor;
        self
    }

    pub fn with_commit_reader(mut self, executor: Arc<dyn CommitReader>) -> Self {
        self.commit_reader = executor;
        self
    }

    pub async fn execute(&self, request: &StepRequest) -> Result<Value, CapabilityError> {
        match request {
            StepRequest::TextGeneration(req) => to_output(self.text_generator.generate(req).await?),
            StepRequest::MailboxRead(req) => to_output(self.mailbox_reader.read(req).await?),
            StepRequest::MailboxSend(req) => to_output(self.mailbox_sender.send(req).await?),
            StepRequest::ChatWebhookSend(req) => to_output(self.chat_webhook.post(req).await?),
            StepRequest::RepositoryCommitRead(req) => to_output(self.commit_reader.list_commits(req).await?),
        }
    }
}

#[async_trait]
impl StepDispatcher for DispatchTable {
    async fn dispatch(
        &self,
        kind: StepKind,
        settings: &Settings,
        previous: Option<&Value>,
    ) -> Result<Value, CapabilityError> {
        let request = StepRequest::build(kind, settings, previous)?;
        tracing::debug!("[Dispatch] {} request built", kind);
        self.execute(&request).await
    }
}

fn to_output<T: Serialize>(output: T) -> Result<Value, CapabilityError> {
    serde_json::to_value(output).map_err(|e| CapabilityError::decode("executor", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::chat_webhook::ChatWebhookOutput;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingWebhook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatWebhookPoster for RecordingWebhook {
        async fn post(&self, request: &ChatWebhookRequest) -> Result<ChatWebhookOutput, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.content, "hello");
            Ok(ChatWebhookOutput {
                sent: true,
                status: 200,
                message_id: Some("m-1".into()),
            })
        }
    }

    fn settings(value: Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_build_routes_every_kind() {
        let cases = [
            (StepKind::TextGeneration, json!({ "prompt": "p" })),
            (StepKind::MailboxRead, json!({})),
            (StepKind::MailboxSend, json!({ "to": "a@b.io", "subject": "s", "body": "b" })),
            (StepKind::ChatWebhookSend, json!({ "webhookUrl": "https://x.io/h", "content": "c" })),
            (StepKind::RepositoryCommitRead, json!({ "repository": "o/r" })),
        ];
        for (kind, config) in cases {
            assert_eq!(StepRequest::build(kind, &settings(config), None).unwrap().kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_dispatch_uses_registered_executor() {
        let webhook = Arc::new(RecordingWebhook::default());
        let table = DispatchTable::from_config(&CapabilityConfig::default()).with_chat_webhook(webhook.clone());

        let out = table
            .dispatch(
                StepKind::ChatWebhookSend,
                &settings(json!({ "webhookUrl": "https://x.io/h", "content": "hello" })),
                None,
            )
            .await
            .unwrap();
        assert_eq!(out, json!({ "sent": true, "status": 200, "messageId": "m-1" }));
        assert_eq!(webhook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_field_never_reaches_executor() {
        let webhook = Arc::new(RecordingWebhook::default());
        let table = DispatchTable::from_config(&CapabilityConfig::default()).with_chat_webhook(webhook.clone());

        let err = table
            .dispatch(StepKind::ChatWebhookSend, &settings(json!({ "content": "hello" })), None)
            .await
            .unwrap_err();
        assert_eq!(err, CapabilityError::MissingField("webhookUrl"));
        assert_eq!(webhook.calls.load(Ordering::SeqCst), 0);
    }
}
