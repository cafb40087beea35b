//! Content templating helper for presentation layers
//!
//! The engine always announces message content raw; substituting context
//! values into `{{placeholder}}` slots is a rendering concern. This helper
//! is provided for UI bindings that want the substitution done for them.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::Context;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").unwrap())
}

/// Substitute `{{key}}` placeholders with context values
///
/// String values are inserted verbatim; other values are inserted in their
/// JSON form. Keys missing from the context render as the empty string.
pub fn render_content(content: &str, context: &Context) -> String {
    placeholder_re()
        .replace_all(content, |caps: &regex::Captures<'_>| {
            match context.get(&caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => String::new(),
            }
        })
        .into_owned()
}
