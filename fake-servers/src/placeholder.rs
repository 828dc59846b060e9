//! Placeholder tokens substituted into canned responses.
//!
//! Fixture payloads cannot know the ephemeral port of the server that will
//! serve them, so they embed tokens such as `[FAKE_SERVER_BASE]` that are
//! replaced with the resolved base URL right before the bytes are sent.
//! Only declared tokens are touched: templated HAL links like `{slug}` or
//! `{?q}` pass through verbatim.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token used by file-backed fixture trees to reference their own server.
pub const FAKE_SERVER_BASE: &str = "[FAKE_SERVER_BASE]";

/// Token used by the search fake to reference its own server.
pub const SEARCH_BASE_URL: &str = "{U1_SEARCH_BASE_URL}";

/// Token used by the search fake to reference the download fake.
pub const DOWNLOAD_BASE_URL: &str = "{DOWNLOAD_BASE_URL}";

/// What a placeholder token expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Placeholder {
    /// The base URL of the server doing the substitution.
    SelfBase,
    /// A fixed string, typically another fake's base URL.
    Literal(String),
}

/// Token -> expansion map attached to a route table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placeholders(BTreeMap<String, Placeholder>);

impl Placeholders {
    /// Empty map; nothing is substituted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `token` to `value`, replacing any earlier binding.
    pub fn bind(mut self, token: impl Into<String>, value: Placeholder) -> Self {
        self.0.insert(token.into(), value);
        self
    }

    /// Whether no tokens are bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve every binding against `base_url`.
    pub fn resolve(&self, base_url: &str) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(token, _)| !token.is_empty())
            .map(|(token, value)| {
                let expansion = match value {
                    Placeholder::SelfBase => base_url.to_owned(),
                    Placeholder::Literal(s) => s.clone(),
                };
                (token.clone(), expansion)
            })
            .collect()
    }
}

/// Replace every resolved token in `text`.
pub fn substitute_str(text: &str, resolved: &[(String, String)]) -> String {
    resolved
        .iter()
        .fold(text.to_owned(), |acc, (token, value)| acc.replace(token, value))
}

/// Replace every resolved token in a byte buffer.
///
/// Operates on raw bytes so binary fixtures without tokens come back
/// unchanged.
pub fn substitute_bytes(data: &[u8], resolved: &[(String, String)]) -> Vec<u8> {
    let mut current = data.to_vec();
    for (token, value) in resolved {
        current = replace_bytes(&current, token.as_bytes(), value.as_bytes());
    }
    current
}

fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Replace tokens in every string leaf of a JSON document.
pub fn substitute_json(value: &mut serde_json::Value, resolved: &[(String, String)]) {
    match value {
        serde_json::Value::String(s) => {
            if resolved.iter().any(|(token, _)| s.contains(token.as_str())) {
                *s = substitute_str(s, resolved);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_json(item, resolved);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values_mut() {
                substitute_json(item, resolved);
            }
        }
        _ => {}
    }
}
