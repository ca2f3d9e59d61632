use crate::error::{ModelError, ModelResult};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One turn of the selection conversation. The transcript only grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TranscriptEntry {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, content: String },
}

impl TranscriptEntry {
    pub fn system(content: impl Into<String>) -> Self {
        TranscriptEntry::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        TranscriptEntry::User {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub messages: Vec<TranscriptEntry>,
    /// Empty for plain text completions.
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelResponse {
    Text { content: String },
    ToolCall { name: String, arguments: Value },
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        ModelResponse::Text {
            content: content.into(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        ModelResponse::ToolCall {
            name: name.into(),
            arguments,
        }
    }
}

/// Language model used for file selection. Transport, auth and retries are
/// the implementor's business.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Whether [`generate`](Self::generate) honours `ModelRequest::tools`.
    fn supports_tools(&self) -> bool;

    async fn generate(
        &self,
        request: ModelRequest,
        cancel: &CancellationToken,
    ) -> ModelResult<ModelResponse>;
}

/// Replays canned responses in order; errors once the script runs out.
///
/// Used for offline runs and tests. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    tools: bool,
    script: Mutex<VecDeque<ModelResult<ModelResponse>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(supports_tools: bool) -> Self {
        Self {
            tools: supports_tools,
            ..Self::default()
        }
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn with_error(self, error: ModelError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, item: ModelResult<ModelResponse>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(item);
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn supports_tools(&self) -> bool {
        self.tools
    }

    async fn generate(
        &self,
        request: ModelRequest,
        cancel: &CancellationToken,
    ) -> ModelResult<ModelResponse> {
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Transport("script exhausted".to_string())))
    }
}
