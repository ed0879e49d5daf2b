//! Engine and capability settings.
//!
//! Endpoint bases and fallback credentials come from the environment; any
//! credential saved in a step's own configuration takes precedence.

use std::time::Duration;

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_STEPS: usize = 100;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on a single capability call.
    pub step_timeout: Duration,
    /// Upper bound on the number of steps a run may visit.
    pub max_steps: usize,
    pub capabilities: CapabilityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            max_steps: DEFAULT_MAX_STEPS,
            capabilities: CapabilityConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            capabilities: CapabilityConfig::from_env(),
            ..Self::default()
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

#[derive(Clone)]
pub struct CapabilityConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub default_text_model: String,
    pub gmail_access_token: Option<String>,
    pub gmail_api_base: String,
    pub github_token: Option<String>,
    pub github_api_base: String,
    /// Timeout of the shared HTTP client.
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            default_text_model: "gpt-4o-mini".to_string(),
            gmail_access_token: None,
            gmail_api_base: "https://gmail.googleapis.com".to_string(),
            github_token: None,
            github_api_base: "https://api.github.com".to_string(),
            http_timeout: Duration::from_secs(300),
            user_agent: format!("agentchain/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// Credentials are never printed.
impl std::fmt::Debug for CapabilityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityConfig")
            .field("openai_api_key", &self.openai_api_key.is_some())
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_api_key", &self.anthropic_api_key.is_some())
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("default_text_model", &self.default_text_model)
            .field("gmail_access_token", &self.gmail_access_token.is_some())
            .field("gmail_api_base", &self.gmail_api_base)
            .field("github_token", &self.github_token.is_some())
            .field("github_api_base", &self.github_api_base)
            .field("http_timeout", &self.http_timeout)
            .finish_non_exhaustive()
    }
}

impl CapabilityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            anthropic_base_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic_base_url),
            default_text_model: get("AGENTCHAIN_TEXT_MODEL").unwrap_or(defaults.default_text_model),
            gmail_access_token: get("GMAIL_ACCESS_TOKEN"),
            gmail_api_base: get("GMAIL_API_BASE").unwrap_or(defaults.gmail_api_base),
            github_token: get("GITHUB_TOKEN"),
            github_api_base: get("GITHUB_API_BASE").unwrap_or(defaults.github_api_base),
            http_timeout: defaults.http_timeout,
            user_agent: defaults.user_agent,
        }
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_lookup_overrides_and_ignores_blank() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("GITHUB_API_BASE", "http://localhost:9000"),
            ("GMAIL_ACCESS_TOKEN", "   "),
        ]
        .into_iter()
        .collect();
        let config = CapabilityConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.github_api_base, "http://localhost:9000");
        assert!(config.gmail_access_token.is_none());
        assert_eq!(config.anthropic_base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let config = CapabilityConfig {
            github_token: Some("ghp_secret".to_string()),
            ..CapabilityConfig::default()
        };
        assert!(!format!("{:?}", config).contains("ghp_secret"));
    }
}
