//! WebSocket chat endpoint.
//!
//! Each connection holds its own conversation; each inbound
//! `{"message": "..."}` frame runs one turn, and every [`StreamEvent`]
//! for that turn is forwarded to the client as a JSON text frame. A
//! failed turn produces an `{"event": "error", ...}` frame instead of
//! `streamComplete`.

use axum::{
    extract::ws::{Message as WsMessage, WebSocket},
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use switchboard::conversation::Conversation;
use switchboard::events::{self, StreamEvent};
use switchboard::providers::openai::OpenAiProvider;
use tracing::{debug, error, info};

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    message: String,
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let provider = match OpenAiProvider::new(state.provider_config.clone()) {
        Ok(provider) => provider,
        Err(e) => {
            error!("failed to build provider: {}", e);
            return;
        }
    };
    let mut conversation = Conversation::new(Box::new(provider), state.transport.clone());
    info!("chat session opened");

    while let Some(Ok(frame)) = socket.recv().await {
        let WsMessage::Text(text) = frame else {
            continue;
        };
        let inbound: InboundFrame = match serde_json::from_str(&text) {
            Ok(inbound) => inbound,
            Err(e) => {
                let reply = json!({"event": "error", "message": format!("bad frame: {e}")});
                if socket
                    .send(WsMessage::Text(reply.to_string()))
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
        };

        if let Err(e) = run_turn(&mut socket, &mut conversation, inbound.message).await {
            error!("turn failed: {}", e);
            let reply = json!({"event": "error", "message": e.to_string()});
            if socket
                .send(WsMessage::Text(reply.to_string()))
                .await
                .is_err()
            {
                break;
            }
        }
    }
    debug!("chat session closed");
}

/// Run one turn, forwarding its events as they arrive. The turn keeps
/// running even if the client stops reading, so the conversation
/// history stays consistent for the next message.
async fn run_turn(
    socket: &mut WebSocket,
    conversation: &mut Conversation,
    message: String,
) -> switchboard::errors::EngineResult<()> {
    let (sink, mut events) = events::channel();
    let turn = conversation.send_message(message, sink);
    tokio::pin!(turn);

    let mut turn_result = None;
    let mut client_gone = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if !client_gone && forward(socket, &event).await.is_err() {
                        client_gone = true;
                    }
                }
                // sink dropped, the turn is over
                None => break,
            },
            result = &mut turn, if turn_result.is_none() => {
                turn_result = Some(result);
            }
        }
    }

    let result = match turn_result {
        Some(result) => result,
        None => turn.await,
    };
    result.map(|_| ())
}

async fn forward(socket: &mut WebSocket, event: &StreamEvent) -> Result<(), axum::Error> {
    let frame = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket.send(WsMessage::Text(frame)).await
}
