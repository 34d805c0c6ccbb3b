//! `{{{param}}}` placeholder substitution for tool messages and generated tools
//!
//! Unresolved placeholders are left verbatim so template mistakes stay visible.

use serde_json::Value;

const OPEN: &str = "{{{";
const CLOSE: &str = "}}}";

fn lookup(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Substitute every `{{{key}}}` in `template` from the `args` object
pub fn render_template(template: &str, args: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after_open[..end].trim();
        match lookup(args, key) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

/// Render every string inside `value`.
///
/// A string that is exactly one placeholder is replaced by the argument's
/// JSON value, so numbers and objects keep their type.
pub fn render_value(value: &Value, args: &Value) -> Value {
    match value {
        Value::String(s) => {
            if let Some(key) = s
                .strip_prefix(OPEN)
                .and_then(|inner| inner.strip_suffix(CLOSE))
                .map(str::trim)
                && !key.contains(OPEN)
                && let Some(arg) = args.get(key)
            {
                return arg.clone();
            }
            Value::String(render_template(s, args))
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, args)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, args)))
                .collect(),
        ),
        other => other.clone(),
    }
}
