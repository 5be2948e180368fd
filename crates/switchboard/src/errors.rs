use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum EngineError {
    /// The bridge was used after teardown. Fatal to the engine instance.
    #[error("transport closed")]
    TransportClosed,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    /// The model stream failed or terminated abnormally. Fatal to the
    /// current turn; no StreamComplete is emitted.
    #[error("provider failure: {0}")]
    Provider(String),

    #[error("tool handler failed: {0}")]
    Handler(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
