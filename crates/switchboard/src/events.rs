//! Turn lifecycle events and the channel that carries them.
//!
//! Each call to [`Conversation::send_message`](crate::conversation::Conversation::send_message)
//! takes its own [`EventSink`]; the matching receiver observes exactly
//! one turn and then sees the channel close. The serialized form is the
//! wire shape listeners consume, so field names are fixed here rather
//! than at the transport layer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::models::content::ToolResult;
use crate::models::message::Message;

/// Identity of a tool call announced before its result exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallAnnouncement {
    pub id: String,
    pub name: String,
}

/// Everything a listener can observe about one turn, in emission order:
/// `StreamStart`, any number of chunks and tool call pairs, then
/// `StreamComplete` carrying the messages the turn appended. A turn
/// that fails ends without `StreamComplete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum StreamEvent {
    StreamStart {},
    StreamChunk {
        chunk: String,
    },
    ToolCallStart {
        #[serde(rename = "toolCall")]
        tool_call: ToolCallAnnouncement,
    },
    ToolCallComplete {
        result: ToolResult,
    },
    StreamComplete {
        messages: Vec<Message>,
    },
}

/// Create a linked sink and receiver for one turn.
pub fn channel() -> (EventSink, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(64);
    (EventSink { tx }, rx)
}

/// Sending half of a turn's event channel. Dropping it closes the
/// receiver, which is how listeners learn the turn is over.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    /// Deliver an event. A departed listener is not an error; the turn
    /// keeps running so the conversation history stays consistent.
    pub async fn send(&self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("event listener dropped before the turn ended");
        }
    }
}
