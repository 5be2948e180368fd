use std::sync::Arc;

use switchboard::providers::openai::OpenAiConfig;
use switchboard::transport::ToolTransport;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider_config: OpenAiConfig,
    /// Bridge to the in-process tool host; shared by every connection.
    pub transport: Arc<dyn ToolTransport>,
}
