//! Conversion between engine types and the OpenAI-compatible chat
//! completions wire format, both directions: request payloads out,
//! streamed chunk deltas in.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{EngineError, EngineResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::ToolDefinition;
use crate::stream::{FinishReason, StreamFragment, ToolCallDelta};

pub fn messages_to_wire(messages: &[Message]) -> Vec<Value> {
    messages.iter().map(message_to_wire).collect()
}

fn message_to_wire(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role,
        "content": message.content,
    });
    let object = wire.as_object_mut().unwrap();

    if let Some(tool_calls) = &message.tool_calls {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments,
                    },
                })
            })
            .collect();
        object.insert("tool_calls".to_string(), json!(calls));
    }
    if message.role == Role::Tool {
        if let Some(id) = &message.tool_call_id {
            object.insert("tool_call_id".to_string(), json!(id));
        }
    }
    wire
}

pub fn tools_to_wire(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                },
            })
        })
        .collect()
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCallDelta>,
}

#[derive(Deserialize)]
struct WireToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: WireFunctionDelta,
}

#[derive(Deserialize, Default)]
struct WireFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Parse one SSE `data:` payload (already stripped of the prefix and
/// the `[DONE]` terminator) into a stream fragment.
pub fn parse_chunk(data: &str) -> EngineResult<StreamFragment> {
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| EngineError::Provider(format!("malformed stream chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(EngineError::Provider(format!("api error: {error}")));
    }

    let mut fragment = StreamFragment::default();
    let Some(choice) = chunk.choices.into_iter().next() else {
        // Usage-only chunks carry no choices; nothing to fold in.
        return Ok(fragment);
    };

    fragment.text = choice.delta.content;
    fragment.tool_calls = choice
        .delta
        .tool_calls
        .into_iter()
        .map(|call| ToolCallDelta {
            index: call.index,
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();
    fragment.finish_reason = choice.finish_reason.as_deref().map(|reason| match reason {
        "tool_calls" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    });

    Ok(fragment)
}
