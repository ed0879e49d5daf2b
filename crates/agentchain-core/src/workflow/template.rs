//! `{{input.<path>}}` placeholder substitution.

use regex::{Captures, Regex};
use serde_json::Value;

lazy_static::lazy_static! {
    static ref INPUT_PLACEHOLDER: Regex = Regex::new(r"\{\{input\.([^{}]+)\}\}").unwrap();
}

/// Replace every `{{input.a.b}}` in `text` with the value found at `a.b`
/// inside `context`.
///
/// Strings are inserted as-is, `null` as the empty string, anything else as
/// compact JSON. A placeholder whose path cannot be followed all the way is
/// left untouched.
pub fn resolve(text: &str, context: Option<&Value>) -> String {
    let Some(context) = context else {
        return text.to_string();
    };

    INPUT_PLACEHOLDER
        .replace_all(text, |caps: &Captures| match lookup(context, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Walk a dotted path. Numeric components index into arrays.
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_without_placeholders_is_unchanged() {
        let ctx = json!({ "name": "Ada" });
        for text in ["", "plain", "{{output.name}}", "{ {input.name} }", "{{input.}}"] {
            assert_eq!(resolve(text, Some(&ctx)), text);
            assert_eq!(resolve(text, None), text);
        }
    }

    #[test]
    fn test_no_context_leaves_placeholders() {
        assert_eq!(resolve("Hello {{input.name}}", None), "Hello {{input.name}}");
    }

    #[test]
    fn test_resolves_string_value() {
        let ctx = json!({ "name": "Ada" });
        assert_eq!(resolve("Hello {{input.name}}", Some(&ctx)), "Hello Ada");
    }

    #[test]
    fn test_missing_path_is_left_verbatim() {
        let ctx = json!({ "a": {} });
        assert_eq!(resolve("{{input.a.b}}", Some(&ctx)), "{{input.a.b}}");
        assert_eq!(resolve("x {{input.zzz}} y", Some(&ctx)), "x {{input.zzz}} y");
    }

    #[test]
    fn test_non_string_values_serialize_as_json() {
        let ctx = json!({ "list": [1, 2], "n": 3, "ok": true, "obj": { "k": "v" }, "nil": null });
        assert_eq!(resolve("{{input.list}}", Some(&ctx)), "[1,2]");
        assert_eq!(resolve("{{input.n}}/{{input.ok}}", Some(&ctx)), "3/true");
        assert_eq!(resolve("{{input.obj}}", Some(&ctx)), r#"{"k":"v"}"#);
        assert_eq!(resolve("[{{input.nil}}]", Some(&ctx)), "[]");
    }

    #[test]
    fn test_nested_and_indexed_paths() {
        let ctx = json!({ "messages": [{ "subject": "Hi", "from": "a@b" }] });
        assert_eq!(
            resolve("{{input.messages.0.subject}} from {{input.messages.0.from}}", Some(&ctx)),
            "Hi from a@b"
        );
        assert_eq!(resolve("{{input.messages.5.subject}}", Some(&ctx)), "{{input.messages.5.subject}}");
    }

    #[test]
    fn test_scalar_context_has_no_properties() {
        let ctx = json!("just text");
        assert_eq!(resolve("{{input.text}}", Some(&ctx)), "{{input.text}}");
    }
}
