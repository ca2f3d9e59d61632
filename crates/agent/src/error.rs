use thiserror::Error;

pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Failures surfaced by a [`ModelClient`](crate::ModelClient) or while
/// decoding its tool calls. None of them escape the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model transport error: {0}")]
    Transport(String),

    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Model does not support tool calls")]
    ToolsUnsupported,

    #[error("Model call cancelled")]
    Cancelled,
}
