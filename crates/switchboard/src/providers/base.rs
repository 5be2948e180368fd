use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::EngineResult;
use crate::models::message::Message;
use crate::models::tool::ToolDefinition;
use crate::stream::StreamFragment;

/// A lazy sequence of deltas from one model response.
pub type FragmentStream = BoxStream<'static, EngineResult<StreamFragment>>;

/// Base trait for model providers (OpenAI-compatible endpoints, etc).
///
/// One call streams one response to the given history. The engine never
/// retries a provider call; a failed request or an abnormally
/// terminated stream is fatal to the current turn.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open a completion stream for the conversation so far. `tools`
    /// advertises what the model may call; pass an empty slice to force
    /// a plain textual answer.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> EngineResult<FragmentStream>;
}
