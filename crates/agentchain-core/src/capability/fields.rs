//! Typed reads out of a materialized configuration map.
//!
//! Editors save numbers and booleans as strings as often as not, so the
//! numeric and boolean readers accept both forms.

use serde_json::Value;

use super::CapabilityError;
use crate::models::step_config::Settings;

/// Non-blank string value. Numbers and booleans are stringified.
pub fn opt_str(settings: &Settings, key: &'static str) -> Option<String> {
    match settings.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn req_str(settings: &Settings, key: &'static str) -> Result<String, CapabilityError> {
    opt_str(settings, key).ok_or(CapabilityError::MissingField(key))
}

pub fn opt_u64(settings: &Settings, key: &'static str) -> Result<Option<u64>, CapabilityError> {
    match settings.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| CapabilityError::invalid(key, "expected a non-negative integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CapabilityError::invalid(key, format!("'{}' is not an integer", s))),
        Some(_) => Err(CapabilityError::invalid(key, "expected a non-negative integer")),
    }
}

pub fn opt_f64(settings: &Settings, key: &'static str) -> Result<Option<f64>, CapabilityError> {
    match settings.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CapabilityError::invalid(key, format!("'{}' is not a number", s))),
        Some(_) => Err(CapabilityError::invalid(key, "expected a number")),
    }
}

pub fn opt_bool(settings: &Settings, key: &'static str) -> Result<bool, CapabilityError> {
    match settings.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            _ => Err(CapabilityError::invalid(key, format!("'{}' is not a boolean", s))),
        },
        Some(_) => Err(CapabilityError::invalid(key, "expected a boolean")),
    }
}

/// List of strings, from a JSON array or a comma-separated string.
pub fn str_list(settings: &Settings, key: &'static str) -> Result<Vec<String>, CapabilityError> {
    let items: Vec<String> = match settings.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| CapabilityError::invalid(key, "expected a list of strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(CapabilityError::invalid(key, "expected a list of strings")),
    };
    Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
}
