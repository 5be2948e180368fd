use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One piece of content inside a tool result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Content::Text { text } => text,
        }
    }
}

/// The `{content: [...]}` envelope every tool return value is wrapped
/// in before it re-enters the conversation as a `tool` message.
///
/// Handler failures travel in the same envelope with `is_error` set,
/// so the model can react to them like any other tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ToolResult {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        ToolResult {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }

    /// Wrap a handler return value: strings pass through as-is, any
    /// other JSON value is stringified.
    pub fn from_value(value: Value) -> Self {
        let text = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        ToolResult::text(text)
    }

    /// The serialized content sequence, as stored in a `tool` message.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.content).unwrap_or_else(|_| "[]".to_string())
    }

    /// All text pieces joined, for matching on results in logs and tests.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
