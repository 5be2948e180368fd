//! Incremental assembly of a streamed model response.
//!
//! Providers emit [`StreamFragment`]s: small deltas carrying a slice of
//! assistant text, partial tool calls keyed by index, or a finish
//! reason. The [`DeltaAccumulator`] folds them into the final message.
//! Tool call argument buffers are concatenated verbatim and only parsed
//! once the stream has finished, since any prefix of a JSON document is
//! itself invalid JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::models::message::ToolCallRef;

/// Why the model stopped streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The response is a final textual answer.
    Stop,
    /// The response requests tool invocations.
    ToolCalls,
}

/// A partial tool call inside one fragment. Fields are sparse; the
/// first fragment for an index usually carries id and name, later ones
/// only append to the argument buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One unit of streamed output from a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamFragment {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Default::default()
        }
    }
}

/// What [`DeltaAccumulator::push`] observed in a fragment, in the order
/// it should surface to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulated {
    /// New assistant text arrived; forward it as a chunk.
    Text(String),
    /// A tool call's name became known for the first time.
    CallStarted { id: String, name: String },
}

/// The assembled response once the stream ends.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub text: String,
    /// Completed tool calls in index order. Empty when the model gave a
    /// plain textual answer.
    pub tool_calls: Vec<ToolCallRef>,
}

#[derive(Debug)]
struct PartialCall {
    /// Fixed at first sight of the index; a provider id arriving on a
    /// later delta does not change it.
    id: String,
    name: Option<String>,
    arguments: String,
    announced: bool,
}

impl PartialCall {
    fn new(id: String) -> Self {
        Self {
            id,
            name: None,
            arguments: String::new(),
            announced: false,
        }
    }
}

/// Folds stream fragments into a complete assistant response.
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    text: String,
    calls: BTreeMap<usize, PartialCall>,
    finish_reason: Option<FinishReason>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment in, returning anything newly observable. Text
    /// deltas surface immediately; a tool call surfaces once, as soon
    /// as its name is known. Argument bytes are buffered silently.
    pub fn push(&mut self, fragment: StreamFragment) -> Vec<Accumulated> {
        let mut observed = Vec::new();

        if let Some(text) = fragment.text {
            if !text.is_empty() {
                self.text.push_str(&text);
                observed.push(Accumulated::Text(text));
            }
        }

        for delta in fragment.tool_calls {
            let call = self.calls.entry(delta.index).or_insert_with(|| {
                PartialCall::new(synthesize_id(delta.id.as_deref(), delta.index))
            });
            // names stream in fragments just like arguments do
            if let Some(name) = delta.name {
                match &mut call.name {
                    Some(buffer) => buffer.push_str(&name),
                    None => call.name = Some(name),
                }
            }
            if let Some(arguments) = delta.arguments {
                call.arguments.push_str(&arguments);
            }
            if !call.announced {
                if let Some(name) = &call.name {
                    call.announced = true;
                    observed.push(Accumulated::CallStarted {
                        id: call.id.clone(),
                        name: name.clone(),
                    });
                }
            }
        }

        if let Some(reason) = fragment.finish_reason {
            self.finish_reason = Some(reason);
        }

        observed
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Consume the accumulator and produce the assembled response. A
    /// `stop` finish discards any half-received tool calls; a
    /// `tool_calls` finish requires every buffered call to carry a
    /// name.
    pub fn finish(self) -> EngineResult<StreamOutcome> {
        match self.finish_reason {
            Some(FinishReason::Stop) | None => Ok(StreamOutcome {
                text: self.text,
                tool_calls: Vec::new(),
            }),
            Some(FinishReason::ToolCalls) => {
                let mut tool_calls = Vec::with_capacity(self.calls.len());
                for (index, call) in self.calls {
                    let name = call.name.ok_or_else(|| {
                        EngineError::Provider(format!(
                            "tool call at index {index} finished without a name"
                        ))
                    })?;
                    tool_calls.push(ToolCallRef::new(call.id, name, call.arguments));
                }
                Ok(StreamOutcome {
                    text: self.text,
                    tool_calls,
                })
            }
        }
    }
}

/// Use the provider's id when the first delta for an index carries
/// one, otherwise derive a stable placeholder from the index.
fn synthesize_id(id: Option<&str>, index: usize) -> String {
    match id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("tool-call-{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_delta(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> StreamFragment {
        StreamFragment {
            tool_calls: vec![ToolCallDelta {
                index,
                id: id.map(str::to_string),
                name: name.map(str::to_string),
                arguments: arguments.map(str::to_string),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_text_fragments_concatenate() {
        let mut acc = DeltaAccumulator::new();
        assert_eq!(
            acc.push(StreamFragment::text("Hel")),
            vec![Accumulated::Text("Hel".to_string())]
        );
        assert_eq!(
            acc.push(StreamFragment::text("lo")),
            vec![Accumulated::Text("lo".to_string())]
        );
        acc.push(StreamFragment::finish(FinishReason::Stop));
        let outcome = acc.finish().unwrap();
        assert_eq!(outcome.text, "Hello");
        assert!(outcome.tool_calls.is_empty());
    }

    #[test]
    fn test_tool_call_arguments_buffer_across_fragments() {
        let mut acc = DeltaAccumulator::new();
        let started = acc.push(call_delta(0, Some("call_1"), Some("lookup"), Some("{\"q\"")));
        assert_eq!(
            started,
            vec![Accumulated::CallStarted {
                id: "call_1".to_string(),
                name: "lookup".to_string(),
            }]
        );
        // later fragments only extend the buffer, no second start
        assert!(acc.push(call_delta(0, None, None, Some(":\"rust\"}"))).is_empty());
        acc.push(StreamFragment::finish(FinishReason::ToolCalls));

        let outcome = acc.finish().unwrap();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].arguments, "{\"q\":\"rust\"}");
    }

    #[test]
    fn test_tool_call_name_buffers_across_fragments() {
        let mut acc = DeltaAccumulator::new();
        acc.push(call_delta(0, Some("call_1"), Some("get_we"), None));
        acc.push(call_delta(0, None, Some("ather"), Some("{}")));
        acc.push(StreamFragment::finish(FinishReason::ToolCalls));

        let outcome = acc.finish().unwrap();
        assert_eq!(outcome.tool_calls[0].name, "get_weather");
    }

    #[test]
    fn test_id_is_fixed_at_first_sight_of_index() {
        let mut acc = DeltaAccumulator::new();
        let started = acc.push(call_delta(0, None, Some("lookup"), None));
        assert_eq!(
            started,
            vec![Accumulated::CallStarted {
                id: "tool-call-0".to_string(),
                name: "lookup".to_string(),
            }]
        );
        // a provider id arriving late must not diverge from the
        // already announced one
        acc.push(call_delta(0, Some("call_real"), None, Some("{}")));
        acc.push(StreamFragment::finish(FinishReason::ToolCalls));

        assert_eq!(acc.finish().unwrap().tool_calls[0].id, "tool-call-0");
    }

    #[test]
    fn test_interleaved_calls_resolve_by_index() {
        let mut acc = DeltaAccumulator::new();
        acc.push(call_delta(0, Some("a"), Some("first"), Some("{\"x\":")));
        acc.push(call_delta(1, Some("b"), Some("second"), Some("{}")));
        acc.push(call_delta(0, None, None, Some("1}")));
        acc.push(StreamFragment::finish(FinishReason::ToolCalls));

        let outcome = acc.finish().unwrap();
        let names: Vec<_> = outcome.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(outcome.tool_calls[0].arguments, "{\"x\":1}");
    }

    #[test]
    fn test_missing_id_is_synthesized_from_index() {
        let mut acc = DeltaAccumulator::new();
        let started = acc.push(call_delta(2, None, Some("lookup"), None));
        assert_eq!(
            started,
            vec![Accumulated::CallStarted {
                id: "tool-call-2".to_string(),
                name: "lookup".to_string(),
            }]
        );
        acc.push(StreamFragment::finish(FinishReason::ToolCalls));
        assert_eq!(acc.finish().unwrap().tool_calls[0].id, "tool-call-2");
    }

    #[test]
    fn test_stop_finish_discards_partial_calls() {
        let mut acc = DeltaAccumulator::new();
        acc.push(StreamFragment::text("done"));
        acc.push(call_delta(0, None, Some("lookup"), Some("{")));
        acc.push(StreamFragment::finish(FinishReason::Stop));

        let outcome = acc.finish().unwrap();
        assert_eq!(outcome.text, "done");
        assert!(outcome.tool_calls.is_empty());
    }

    #[test]
    fn test_nameless_call_is_a_provider_failure() {
        let mut acc = DeltaAccumulator::new();
        acc.push(call_delta(0, Some("call_1"), None, Some("{}")));
        acc.push(StreamFragment::finish(FinishReason::ToolCalls));
        assert!(matches!(acc.finish(), Err(EngineError::Provider(_))));
    }
}
