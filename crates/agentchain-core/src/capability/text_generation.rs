//! Text generation over HTTP chat APIs.
//!
//! Two wire formats are supported:
//!
//! - OpenAI-compatible: `POST {base}/chat/completions`, `Authorization: Bearer`
//! - Anthropic Messages: `POST {base}/v1/messages`, `x-api-key` plus
//!   `anthropic-version`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::read_body;
use super::fields;
use super::CapabilityError;
use crate::config::CapabilityConfig;
use crate::models::step_config::Settings;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
}

impl Provider {
    fn parse(raw: &str) -> Result<Self, CapabilityError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(CapabilityError::invalid(
                "provider",
                format!("unknown provider '{}', expected 'openai' or 'anthropic'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextGenerationRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl TextGenerationRequest {
    /// With `includeInput` set, the previous step's output is appended to
    /// the prompt.
    pub fn from_settings(settings: &Settings, previous: Option<&Value>) -> Result<Self, CapabilityError> {
        let mut prompt = fields::req_str(settings, "prompt")?;
        if fields::opt_bool(settings, "includeInput")? {
            if let Some(previous) = previous {
                let rendered = match previous {
                    Value::String(s) => s.clone(),
                    other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
                };
                prompt = format!("{}\n\nInput:\n{}", prompt, rendered);
            }
        }

        let temperature = fields::opt_f64(settings, "temperature")?;
        if let Some(t) = temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(CapabilityError::invalid("temperature", "must be between 0 and 2"));
            }
        }

        Ok(Self {
            prompt,
            model: fields::opt_str(settings, "model"),
            system_prompt: fields::opt_str(settings, "systemPrompt"),
            temperature,
            max_tokens: fields::opt_u64(settings, "maxTokens")?,
            provider: fields::opt_str(settings, "provider")
                .map(|p| Provider::parse(&p))
                .transpose()?
                .unwrap_or_default(),
            api_key: fields::opt_str(settings, "apiKey"),
            base_url: fields::opt_str(settings, "baseUrl"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextGenerationOutput {
    pub text: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &TextGenerationRequest) -> Result<TextGenerationOutput, CapabilityError>;
}

pub struct HttpTextGenerator {
    client: reqwest::Client,
    config: CapabilityConfig,
}

impl HttpTextGenerator {
    pub fn new(client: reqwest::Client, config: CapabilityConfig) -> Self {
        Self { client, config }
    }

    async fn call_openai(
        &self,
        request: &TextGenerationRequest,
        model: &str,
    ) -> Result<TextGenerationOutput, CapabilityError> {
        let api_key = request
            .api_key
            .clone()
            .or_else(|| self.config.openai_api_key.clone())
            .ok_or(CapabilityError::Credentials("text generation (OpenAI)"))?;
        let base = request.base_url.as_deref().unwrap_or(&self.config.openai_base_url);
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));

        let body = openai_body(request, model);
        tracing::info!("[TextGeneration] Calling OpenAI-compatible API: {} (model: {})", url, model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let text = read_body("OpenAI", response).await?;
        let json: Value = serde_json::from_str(&text).map_err(|e| CapabilityError::decode("OpenAI", e))?;
        parse_openai(&json, model)
    }

    async fn call_anthropic(
        &self,
        request: &TextGenerationRequest,
        model: &str,
    ) -> Result<TextGenerationOutput, CapabilityError> {
        let api_key = request
            .api_key
            .clone()
            .or_else(|| self.config.anthropic_api_key.clone())
            .ok_or(CapabilityError::Credentials("text generation (Anthropic)"))?;
        let base = request.base_url.as_deref().unwrap_or(&self.config.anthropic_base_url);
        let url = format!("{}/v1/messages", base.trim_end_matches('/'));

        let body = anthropic_body(request, model);
        tracing::info!("[TextGeneration] Calling Anthropic API: {} (model: {})", url, model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let text = read_body("Anthropic", response).await?;
        let json: Value = serde_json::from_str(&text).map_err(|e| CapabilityError::decode("Anthropic", e))?;
        parse_anthropic(&json, model)
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, request: &TextGenerationRequest) -> Result<TextGenerationOutput, CapabilityError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_text_model.clone());
        match request.provider {
            Provider::OpenAi => self.call_openai(request, &model).await,
            Provider::Anthropic => self.call_anthropic(request, &model).await,
        }
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}

fn openai_body(request: &TextGenerationRequest, model: &str) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = &request.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));

    let mut body = json!({ "model": model, "messages": messages });
    if let Some(t) = request.temperature {
        body["temperature"] = number(t);
    }
    if let Some(max) = request.max_tokens {
        body["max_tokens"] = Value::from(max);
    }
    body
}

fn anthropic_body(request: &TextGenerationRequest, model: &str) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [{ "role": "user", "content": request.prompt }]
    });
    if let Some(system) = &request.system_prompt {
        body["system"] = Value::String(system.clone());
    }
    if let Some(t) = request.temperature {
        body["temperature"] = number(t);
    }
    body
}

fn parse_openai(json: &Value, requested_model: &str) -> Result<TextGenerationOutput, CapabilityError> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| CapabilityError::decode("OpenAI", "response has no choices[0].message.content"))?
        .to_string();

    let usage = json.get("usage").map(|u| TokenUsage {
        input_tokens: u
            .get("prompt_tokens")
            .or_else(|| u.get("input_tokens"))
            .and_then(|v| v.as_u64()),
        output_tokens: u
            .get("completion_tokens")
            .or_else(|| u.get("output_tokens"))
            .and_then(|v| v.as_u64()),
    });

    Ok(TextGenerationOutput {
        text,
        model: json
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(requested_model)
            .to_string(),
        usage,
    })
}

fn parse_anthropic(json: &Value, requested_model: &str) -> Result<TextGenerationOutput, CapabilityError> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| CapabilityError::decode("Anthropic", "response has no content blocks"))?;

    let text = blocks
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    let usage = json.get("usage").map(|u| TokenUsage {
        input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()),
        output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()),
    });

    Ok(TextGenerationOutput {
        text,
        model: json
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(requested_model)
            .to_string(),
        usage,
    })
}
