use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use super::base::{FragmentStream, Provider};
use crate::errors::EngineResult;
use crate::models::message::Message;
use crate::models::tool::ToolDefinition;
use crate::stream::{FinishReason, StreamFragment};

/// A mock provider that plays back pre-scripted streams for testing.
/// Each call to `stream` consumes the next script; once the scripts run
/// out it streams an empty final answer.
pub struct MockProvider {
    scripts: Arc<Mutex<VecDeque<Vec<EngineResult<StreamFragment>>>>>,
}

impl MockProvider {
    pub fn new(scripts: Vec<Vec<EngineResult<StreamFragment>>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> EngineResult<FragmentStream> {
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
            vec![
                Ok(StreamFragment::text("")),
                Ok(StreamFragment::finish(FinishReason::Stop)),
            ]
        });
        Ok(futures::stream::iter(script).boxed())
    }
}
