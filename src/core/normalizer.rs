//! Reply content normalization.
//!
//! Providers return replies in several shapes: a plain string, a list of
//! typed parts, a single part object, or a list rendered as a string. Each
//! part is decoded once into a [`ReplyPart`] and the text parts are joined
//! with a blank line between them.
//!
//! Normalization is total: any input produces a string, falling back to
//! the raw rendering of the input when no text can be extracted.

use serde_json::Value;

use super::literal;

/// Separator placed between text fragments
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// A single reply part, decoded at the provider boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPart {
    /// Text carried in a `text` field (nested `text.value` or flat `text`)
    Text(String),

    /// Text carried in a `value` or `content` field
    Value(String),

    /// Anything without extractable text (images, files, tool output)
    Opaque(Value),
}

impl ReplyPart {
    /// Decode a part using the field preference
    /// `text.value`, `value`, `content`, `text`.
    pub fn decode(part: &Value) -> Self {
        match part {
            Value::String(s) => ReplyPart::Text(s.clone()),
            Value::Object(map) => {
                if let Some(Value::String(s)) = map.get("text").and_then(|t| t.get("value")) {
                    return ReplyPart::Text(s.clone());
                }
                if let Some(Value::String(s)) = map.get("value") {
                    return ReplyPart::Value(s.clone());
                }
                if let Some(Value::String(s)) = map.get("content") {
                    return ReplyPart::Value(s.clone());
                }
                if let Some(Value::String(s)) = map.get("text") {
                    return ReplyPart::Text(s.clone());
                }
                ReplyPart::Opaque(part.clone())
            }
            other => ReplyPart::Opaque(other.clone()),
        }
    }

    /// Extracted text, if this part has any
    pub fn text(&self) -> Option<&str> {
        match self {
            ReplyPart::Text(s) | ReplyPart::Value(s) => Some(s),
            ReplyPart::Opaque(_) => None,
        }
    }

    /// Short description of an opaque part
    fn describe(&self) -> Option<String> {
        let ReplyPart::Opaque(value) = self else {
            return None;
        };
        if let Some(Value::String(kind)) = value.get("type") {
            return Some(kind.clone());
        }
        Some(render_raw(value))
    }
}

/// Normalized reply text together with the parts left out of it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedReply {
    pub text: String,
    /// Descriptions of parts that carried no text
    pub attachments: Vec<String>,
}

impl NormalizedReply {
    fn text_only(text: String) -> Self {
        Self {
            text,
            attachments: Vec::new(),
        }
    }
}

/// Flatten a reply into text
pub fn normalize(raw: &Value) -> String {
    normalize_reply(raw).text
}

/// Flatten a reply into text, keeping track of non-text parts
pub fn normalize_reply(raw: &Value) -> NormalizedReply {
    match raw {
        Value::String(s) => match literal::decode_list(s) {
            Some(items) => normalize_parts(&items, || s.clone()),
            None => NormalizedReply::text_only(s.clone()),
        },
        Value::Array(items) => normalize_parts(items, || render_raw(raw)),
        Value::Object(_) => match ReplyPart::decode(raw) {
            ReplyPart::Opaque(_) => NormalizedReply::text_only(render_raw(raw)),
            part => NormalizedReply::text_only(part.text().unwrap_or_default().to_string()),
        },
        other => NormalizedReply::text_only(render_raw(other)),
    }
}

fn normalize_parts(items: &[Value], fallback: impl FnOnce() -> String) -> NormalizedReply {
    let mut fragments: Vec<String> = Vec::new();
    let mut attachments = Vec::new();

    for item in items {
        let part = ReplyPart::decode(item);
        match part.text() {
            Some(text) if !text.trim().is_empty() => fragments.push(text.to_string()),
            Some(_) => {}
            None => attachments.extend(part.describe()),
        }
    }

    let text = if fragments.is_empty() {
        fallback()
    } else {
        fragments.join(FRAGMENT_SEPARATOR)
    };

    NormalizedReply { text, attachments }
}

/// Raw rendering of a value; `null` renders as the empty string
fn render_raw(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
