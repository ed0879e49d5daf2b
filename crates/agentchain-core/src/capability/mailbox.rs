//! Mailbox read and send against the Gmail REST API.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::read_body;
use super::fields;
use super::CapabilityError;
use crate::config::CapabilityConfig;
use crate::models::step_config::Settings;

const SERVICE: &str = "Gmail";
const DEFAULT_MAX_RESULTS: u64 = 10;
const MAX_RESULTS_LIMIT: u64 = 50;

// ─── Read ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MailboxReadRequest {
    pub access_token: Option<String>,
    pub query: Option<String>,
    pub max_results: u64,
    pub label_ids: Vec<String>,
}

impl MailboxReadRequest {
    pub fn from_settings(settings: &Settings) -> Result<Self, CapabilityError> {
        let max_results = fields::opt_u64(settings, "maxResults")?.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
            return Err(CapabilityError::invalid(
                "maxResults",
                format!("must be between 1 and {}", MAX_RESULTS_LIMIT),
            ));
        }
        Ok(Self {
            access_token: fields::opt_str(settings, "accessToken"),
            query: fields::opt_str(settings, "query"),
            max_results,
            label_ids: fields::str_list(settings, "labelIds")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailSummary {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailboxReadOutput {
    pub messages: Vec<MailSummary>,
}

#[async_trait]
pub trait MailboxReader: Send + Sync {
    async fn read(&self, request: &MailboxReadRequest) -> Result<MailboxReadOutput, CapabilityError>;
}

// ─── Send ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    Plain,
    Html,
}

impl BodyFormat {
    fn parse(raw: &str) -> Result<Self, CapabilityError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" | "text/plain" => Ok(Self::Plain),
            "html" | "text/html" => Ok(Self::Html),
            other => Err(CapabilityError::invalid(
                "contentType",
                format!("unknown content type '{}'", other),
            )),
        }
    }

    fn mime(&self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Html => "text/html",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailboxSendRequest {
    pub access_token: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub format: BodyFormat,
}

impl MailboxSendRequest {
    pub fn from_settings(settings: &Settings) -> Result<Self, CapabilityError> {
        let to = fields::str_list(settings, "to")?;
        if to.is_empty() {
            return Err(CapabilityError::MissingField("to"));
        }
        let cc = fields::str_list(settings, "cc")?;
        check_addresses("to", &to)?;
        check_addresses("cc", &cc)?;

        let subject = fields::req_str(settings, "subject")?;
        if subject.contains(['\r', '\n']) {
            return Err(CapabilityError::invalid("subject", "must be a single line"));
        }

        Ok(Self {
            access_token: fields::opt_str(settings, "accessToken"),
            to,
            cc,
            subject,
            body: fields::req_str(settings, "body")?,
            format: fields::opt_str(settings, "contentType")
                .map(|c| BodyFormat::parse(&c))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    /// RFC 2822 message text.
    pub fn to_rfc2822(&self) -> String {
        let mut headers = vec![format!("To: {}", self.to.join(", "))];
        if !self.cc.is_empty() {
            headers.push(format!("Cc: {}", self.cc.join(", ")));
        }
        headers.push(format!("Subject: {}", encode_header(&self.subject)));
        headers.push("MIME-Version: 1.0".to_string());
        headers.push(format!("Content-Type: {}; charset=\"UTF-8\"", self.format.mime()));
        format!("{}\r\n\r\n{}", headers.join("\r\n"), self.body)
    }

    /// The `raw` field Gmail expects: base64url without padding.
    pub fn encoded(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.to_rfc2822())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSendOutput {
    pub id: String,
    pub thread_id: String,
    pub to: Vec<String>,
    pub subject: String,
}

#[async_trait]
pub trait MailboxSender: Send + Sync {
    async fn send(&self, request: &MailboxSendRequest) -> Result<MailboxSendOutput, CapabilityError>;
}

/// Accepts `addr@domain` and the display-name form `Name <addr@domain>`.
fn check_addresses(field: &'static str, addresses: &[String]) -> Result<(), CapabilityError> {
    for address in addresses {
        let valid = !address.contains(['\r', '\n'])
            && addr_spec(address).is_some_and(|spec| {
                !spec.contains([' ', '<', '>'])
                    && spec
                        .rsplit_once('@')
                        .is_some_and(|(local, domain)| {
                            !local.is_empty() && domain.contains('.') && !domain.ends_with('.')
                        })
            });
        if !valid {
            return Err(CapabilityError::invalid(field, format!("'{}' is not an email address", address)));
        }
    }
    Ok(())
}

/// The bare `addr@domain` part of a recipient.
fn addr_spec(address: &str) -> Option<&str> {
    let address = address.trim();
    match address.strip_suffix('>') {
        Some(rest) => {
            let (name, spec) = rest.rsplit_once('<')?;
            if name.contains(['<', '>']) {
                return None;
            }
            Some(spec)
        }
        None => Some(address),
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

// ─── HTTP client ─────────────────────────────────────────────────────────────

pub struct GmailClient {
    client: reqwest::Client,
    config: CapabilityConfig,
}

impl GmailClient {
    pub fn new(client: reqwest::Client, config: CapabilityConfig) -> Self {
        Self { client, config }
    }

    fn token(&self, explicit: &Option<String>) -> Result<String, CapabilityError> {
        explicit
            .clone()
            .or_else(|| self.config.gmail_access_token.clone())
            .ok_or(CapabilityError::Credentials("the mailbox (Gmail access token)"))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/gmail/v1/users/me/{}",
            self.config.gmail_api_base.trim_end_matches('/'),
            path
        )
    }

    async fn get_json(&self, url: &str, token: &str, query: &[(&str, String)]) -> Result<Value, CapabilityError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        let text = read_body(SERVICE, response).await?;
        serde_json::from_str(&text).map_err(|e| CapabilityError::decode(SERVICE, e))
    }
}

#[async_trait]
impl MailboxReader for GmailClient {
    async fn read(&self, request: &MailboxReadRequest) -> Result<MailboxReadOutput, CapabilityError> {
        let token = self.token(&request.access_token)?;

        let mut query = vec![("maxResults", request.max_results.to_string())];
        if let Some(q) = &request.query {
            query.push(("q", q.clone()));
        }
        for label in &request.label_ids {
            query.push(("labelIds", label.clone()));
        }

        tracing::info!("[Mailbox] Listing up to {} messages", request.max_results);
        let listing = self.get_json(&self.url("messages"), &token, &query).await?;
        let ids = message_ids(&listing);

        let metadata_query = [
            ("format", "metadata".to_string()),
            ("metadataHeaders", "From".to_string()),
            ("metadataHeaders", "Subject".to_string()),
            ("metadataHeaders", "Date".to_string()),
        ];
        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            let detail = self
                .get_json(&self.url(&format!("messages/{}", id)), &token, &metadata_query)
                .await?;
            messages.push(summarize(&detail));
        }

        Ok(MailboxReadOutput { messages })
    }
}

#[async_trait]
impl MailboxSender for GmailClient {
    async fn send(&self, request: &MailboxSendRequest) -> Result<MailboxSendOutput, CapabilityError> {
        let token = self.token(&request.access_token)?;

        tracing::info!("[Mailbox] Sending message to {} recipient(s)", request.to.len() + request.cc.len());
        let response = self
            .client
            .post(self.url("messages/send"))
            .bearer_auth(token)
            .json(&json!({ "raw": request.encoded() }))
            .send()
            .await?;
        let text = read_body(SERVICE, response).await?;
        let sent: Value = serde_json::from_str(&text).map_err(|e| CapabilityError::decode(SERVICE, e))?;

        Ok(MailboxSendOutput {
            id: str_at(&sent, "id"),
            thread_id: str_at(&sent, "threadId"),
            to: request.to.clone(),
            subject: request.subject.clone(),
        })
    }
}

fn str_at(value: &Value, key: &str) -> String {
    value.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn message_ids(listing: &Value) -> Vec<String> {
    listing
        .get("messages")
        .and_then(|m| m.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|m| m.get("id").and_then(|id| id.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn summarize(detail: &Value) -> MailSummary {
    let header = |name: &str| -> String {
        detail
            .pointer("/payload/headers")
            .and_then(|h| h.as_array())
            .and_then(|headers| {
                headers.iter().find(|h| {
                    h.get("name")
                        .and_then(|n| n.as_str())
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
            })
            .and_then(|h| h.get("value"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    MailSummary {
        id: str_at(detail, "id"),
        thread_id: str_at(detail, "threadId"),
        from: header("From"),
        subject: header("Subject"),
        date: header("Date"),
        snippet: str_at(detail, "snippet"),
    }
}
