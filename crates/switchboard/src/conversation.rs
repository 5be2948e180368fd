//! The turn state machine: user message in, streamed assistant answer
//! out, with tool dispatch rounds in between.

use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::errors::{EngineError, EngineResult};
use crate::events::{EventSink, StreamEvent, ToolCallAnnouncement};
use crate::models::content::ToolResult;
use crate::models::message::{Message, ToolCallRef};
use crate::models::tool::ToolDefinition;
use crate::providers::base::Provider;
use crate::stream::{Accumulated, DeltaAccumulator, StreamOutcome};
use crate::transport::ToolTransport;

/// How many tool dispatch rounds one turn may take before the model is
/// forced to answer in text.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// Conversation integrates a model provider with the tools it can
/// reach through a transport.
///
/// History is append-only; each [`send_message`](Self::send_message)
/// call runs one turn to completion and appends everything the turn
/// produced. A turn that fails with a provider or transport error
/// leaves the user message in place but appends nothing else.
pub struct Conversation {
    provider: Box<dyn Provider>,
    transport: Arc<dyn ToolTransport>,
    messages: Vec<Message>,
    max_tool_rounds: usize,
}

impl Conversation {
    pub fn new(provider: Box<dyn Provider>, transport: Arc<dyn ToolTransport>) -> Self {
        Self {
            provider,
            transport,
            messages: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Cap the number of tool rounds per turn. With the cap reached,
    /// any further tool requests from the model are ignored and its
    /// text is taken as the final answer.
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Run one turn. Events for the turn flow through `events`, which
    /// is consumed so the matching receiver closes when the turn ends,
    /// successfully or not. On success the returned messages are the
    /// ones this turn appended, user message first; they are also what
    /// the final `StreamComplete` event carries.
    #[instrument(skip(self, text, events))]
    pub async fn send_message(
        &mut self,
        text: impl Into<String>,
        events: EventSink,
    ) -> EngineResult<Vec<Message>> {
        let turn_start = self.messages.len();
        self.messages.push(Message::user(text.into()));

        events.send(StreamEvent::StreamStart {}).await;

        let tools = self.transport.list_tools().await?;

        let mut round = 0;
        loop {
            let allow_tools = round < self.max_tool_rounds;
            let advertised = if allow_tools { tools.as_slice() } else { &[] };
            let outcome = self.stream_round(advertised, &events, allow_tools).await?;

            if outcome.tool_calls.is_empty() {
                self.messages.push(Message::assistant(outcome.text));
                break;
            }

            debug!(round, calls = outcome.tool_calls.len(), "dispatching tools");
            self.messages.push(Message::assistant_with_tool_calls(
                outcome.text,
                outcome.tool_calls.clone(),
            ));

            let results = self.dispatch_calls(&outcome.tool_calls, &events).await?;
            for (call, result) in outcome.tool_calls.iter().zip(results) {
                self.messages
                    .push(Message::tool(call.id.clone(), result.render()));
            }

            round += 1;
        }

        let appended = self.messages[turn_start..].to_vec();
        events
            .send(StreamEvent::StreamComplete {
                messages: appended.clone(),
            })
            .await;
        Ok(appended)
    }

    /// Stream one model response, forwarding text chunks and tool call
    /// announcements as they materialize. With `allow_tools` off the
    /// response is forced textual: any tool call deltas are buffered
    /// but never announced, and the outcome drops them.
    async fn stream_round(
        &self,
        tools: &[ToolDefinition],
        events: &EventSink,
        allow_tools: bool,
    ) -> EngineResult<StreamOutcome> {
        let mut stream = self.provider.stream(&self.messages, tools).await?;
        let mut acc = DeltaAccumulator::new();

        while let Some(fragment) = stream.next().await {
            for observed in acc.push(fragment?) {
                match observed {
                    Accumulated::Text(chunk) => {
                        events.send(StreamEvent::StreamChunk { chunk }).await;
                    }
                    Accumulated::CallStarted { id, name } => {
                        if allow_tools {
                            events
                                .send(StreamEvent::ToolCallStart {
                                    tool_call: ToolCallAnnouncement { id, name },
                                })
                                .await;
                        }
                    }
                }
            }
        }

        if acc.finish_reason().is_none() {
            return Err(EngineError::Provider(
                "stream ended without a finish reason".to_string(),
            ));
        }

        let mut outcome = acc.finish()?;
        if !allow_tools && !outcome.tool_calls.is_empty() {
            warn!(
                dropped = outcome.tool_calls.len(),
                "tool round cap reached, taking text as final answer"
            );
            outcome.tool_calls.clear();
        }
        Ok(outcome)
    }

    /// Run all of a round's calls concurrently. `ToolCallComplete`
    /// events fire in completion order, but the returned results are in
    /// call order so tool messages append deterministically. Per-call
    /// failures are already contained in the `ToolResult`; an `Err`
    /// here means the transport itself failed and the turn must abort.
    async fn dispatch_calls(
        &self,
        calls: &[ToolCallRef],
        events: &EventSink,
    ) -> EngineResult<Vec<ToolResult>> {
        let mut in_flight: FuturesUnordered<_> = calls
            .iter()
            .enumerate()
            .map(|(position, call)| {
                let transport = self.transport.clone();
                let call = call.clone();
                async move { (position, dispatch_one(transport, call).await) }
            })
            .collect();

        let mut slots: Vec<Option<ToolResult>> = vec![None; calls.len()];
        while let Some((position, result)) = in_flight.next().await {
            let result = result?;
            events
                .send(StreamEvent::ToolCallComplete {
                    result: result.clone(),
                })
                .await;
            slots[position] = Some(result);
        }

        // Every slot is filled once the set drains.
        Ok(slots.into_iter().flatten().collect())
    }
}

/// Invoke one tool over the transport. An argument buffer that fails to
/// parse never reaches the transport; it becomes an error-content
/// result the model can react to.
async fn dispatch_one(
    transport: Arc<dyn ToolTransport>,
    call: ToolCallRef,
) -> EngineResult<ToolResult> {
    let arguments = if call.arguments.trim().is_empty() {
        json!({})
    } else {
        match serde_json::from_str::<Value>(&call.arguments) {
            Ok(value) => value,
            Err(error) => {
                warn!(tool = %call.name, %error, "tool arguments failed to parse");
                return Ok(ToolResult::error(
                    EngineError::InvalidToolArguments(error.to_string()).to_string(),
                ));
            }
        }
    };
    transport.call_tool(&call.name, arguments).await
}
