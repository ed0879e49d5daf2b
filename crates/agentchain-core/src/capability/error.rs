/// Failure of a capability call, or of building its request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("No credentials for {0}")]
    Credentials(&'static str),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("Step timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl CapabilityError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            service,
            message: err.to_string(),
        }
    }

    /// Upstream status, when the failure came from a non-2xx response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error was raised before any network call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_) | Self::InvalidField { .. } | Self::Credentials(_)
        )
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Turn a response into its body text, or an `Upstream` error carrying the
/// status and the body for diagnostics.
pub(crate) async fn read_body(
    service: &'static str,
    response: reqwest::Response,
) -> Result<String, CapabilityError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| CapabilityError::Request(format!("Failed to read response body: {}", e)))?;
    if !status.is_success() {
        return Err(CapabilityError::Upstream {
            service,
            status: status.as_u16(),
            message: upstream_message(&text),
        });
    }
    Ok(text)
}

/// Prefer the `message` or `error.message` of a JSON error body.
fn upstream_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|json| {
            json.pointer("/error/message")
                .or_else(|| json.get("message"))
                .or_else(|| json.get("error"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_prefers_json_message() {
        assert_eq!(
            upstream_message(r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#),
            "Invalid Credentials"
        );
        assert_eq!(upstream_message(r#"{"message":"Bad credentials"}"#), "Bad credentials");
        assert_eq!(upstream_message(r#"{"error":"invalid_grant"}"#), "invalid_grant");
        assert_eq!(upstream_message(" plain text \n"), "plain text");
    }

    #[test]
    fn test_validation_classification() {
        assert!(CapabilityError::MissingField("to").is_validation());
        assert!(!CapabilityError::Timeout(std::time::Duration::from_secs(5)).is_validation());
        let upstream = CapabilityError::Upstream {
            service: "GitHub",
            status: 404,
            message: "Not Found".into(),
        };
        assert_eq!(upstream.upstream_status(), Some(404));
        assert_eq!(upstream.to_string(), "GitHub returned 404: Not Found");
    }
}
