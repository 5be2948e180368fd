use serde::{Deserialize, Serialize};

use super::role::Role;

/// One tool call requested by the model.
///
/// Created when a stream delta first references a new call index and
/// grown by appending fragments; `arguments` is an accumulating text
/// buffer that is not guaranteed to be valid JSON until the stream
/// seals the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRef {
    /// Unique within a turn
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRef {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        ToolCallRef {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A message to or from the model.
///
/// The conversation is an ordered, append-only sequence of these; once
/// appended a message is never mutated. A `tool` message references the
/// call it answers via `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user<S: Into<String>>(text: S) -> Self {
        Message {
            role: Role::User,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Message {
            role: Role::Assistant,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant message that pauses the turn for tool dispatch.
    /// Content may be empty if the model went straight to calling tools.
    pub fn assistant_with_tool_calls(text: String, tool_calls: Vec<ToolCallRef>) -> Self {
        Message {
            role: Role::Assistant,
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// The result of one tool call, answering the assistant message
    /// that requested it.
    pub fn tool<I: Into<String>, S: Into<String>>(tool_call_id: I, content: S) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}
