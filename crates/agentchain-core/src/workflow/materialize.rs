use serde_json::Value;

use super::template;
use crate::models::step_config::Settings;

/// Resolve placeholders in every top-level string value of `config` against
/// the previous step's output. Nested values are copied untouched.
pub fn materialize(config: &Settings, previous: Option<&Value>) -> Settings {
    config
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => Value::String(template::resolve(s, previous)),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}
