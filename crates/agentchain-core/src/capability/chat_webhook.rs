//! Chat webhook posting (Discord-compatible payloads).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::read_body;
use super::fields;
use super::CapabilityError;
use crate::models::step_config::Settings;

const SERVICE: &str = "Chat webhook";

/// Discord rejects longer message content.
pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatWebhookRequest {
    pub webhook_url: Url,
    pub content: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

impl ChatWebhookRequest {
    pub fn from_settings(settings: &Settings) -> Result<Self, CapabilityError> {
        let raw_url = fields::req_str(settings, "webhookUrl")?;
        let webhook_url = Url::parse(raw_url.trim())
            .map_err(|e| CapabilityError::invalid("webhookUrl", e.to_string()))?;
        if !matches!(webhook_url.scheme(), "http" | "https") {
            return Err(CapabilityError::invalid("webhookUrl", "must be an http(s) URL"));
        }

        let content = fields::req_str(settings, "content")?;
        Ok(Self {
            webhook_url,
            content: truncate_content(content),
            username: fields::opt_str(settings, "username"),
            avatar_url: fields::opt_str(settings, "avatarUrl"),
        })
    }

    fn payload(&self) -> WebhookPayload<'_> {
        WebhookPayload {
            content: &self.content,
            username: self.username.as_deref(),
            avatar_url: self.avatar_url.as_deref(),
        }
    }
}

fn truncate_content(content: String) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content;
    }
    tracing::warn!(
        "[ChatWebhook] Content is {} characters, truncating to {}",
        content.chars().count(),
        MAX_CONTENT_CHARS
    );
    content.chars().take(MAX_CONTENT_CHARS).collect()
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatWebhookOutput {
    pub sent: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

#[async_trait]
pub trait ChatWebhookPoster: Send + Sync {
    async fn post(&self, request: &ChatWebhookRequest) -> Result<ChatWebhookOutput, CapabilityError>;
}

pub struct HttpChatWebhook {
    client: reqwest::Client,
}

impl HttpChatWebhook {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatWebhookPoster for HttpChatWebhook {
    async fn post(&self, request: &ChatWebhookRequest) -> Result<ChatWebhookOutput, CapabilityError> {
        let mut url = request.webhook_url.clone();
        // Ask for the created message back instead of a bare 204.
        url.query_pairs_mut().append_pair("wait", "true");

        tracing::info!(
            "[ChatWebhook] Posting {} characters to {}",
            request.content.chars().count(),
            request.webhook_url.host_str().unwrap_or("webhook")
        );

        let response = self.client.post(url).json(&request.payload()).send().await?;
        let status = response.status().as_u16();
        let body = read_body(SERVICE, response).await?;

        let message_id = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string));

        Ok(ChatWebhookOutput {
            sent: true,
            status,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: serde_json::Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_fields() {
        let err = ChatWebhookRequest::from_settings(&settings(json!({ "content": "hi" }))).unwrap_err();
        assert_eq!(err, CapabilityError::MissingField("webhookUrl"));

        let err = ChatWebhookRequest::from_settings(&settings(json!({
            "webhookUrl": "https://discord.com/api/webhooks/1/abc"
        })))
        .unwrap_err();
        assert_eq!(err, CapabilityError::MissingField("content"));
    }

    #[test]
    fn test_malformed_or_non_http_url_rejected() {
        for url in ["not a url", "ftp://example.com/hook", "discord.com/api/webhooks/1"] {
            let err = ChatWebhookRequest::from_settings(&settings(json!({ "webhookUrl": url, "content": "x" })))
                .unwrap_err();
            assert!(matches!(err, CapabilityError::InvalidField { field: "webhookUrl", .. }), "{}", url);
        }
    }

    #[test]
    fn test_long_content_truncated() {
        let long = "é".repeat(MAX_CONTENT_CHARS + 10);
        let req = ChatWebhookRequest::from_settings(&settings(json!({
            "webhookUrl": "https://discord.com/api/webhooks/1/abc",
            "content": long
        })))
        .unwrap();
        assert_eq!(req.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn test_payload_omits_unset_fields() {
        let req = ChatWebhookRequest::from_settings(&settings(json!({
            "webhookUrl": "https://discord.com/api/webhooks/1/abc",
            "content": "deploy done",
            "avatarUrl": "https://example.com/a.png"
        })))
        .unwrap();
        let payload = serde_json::to_value(req.payload()).unwrap();
        assert_eq!(payload, json!({ "content": "deploy done", "avatar_url": "https://example.com/a.png" }));
    }
}
