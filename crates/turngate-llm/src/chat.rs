use futures_core::Stream;
use serde::{Deserialize, Serialize};

use crate::errors::LlmError;
use crate::model::{FinishReason, Message, Usage};

/// Whether the provider is asked for a completed body or a fragment stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    Blocking,
    Streaming,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub model_id: String,
    pub text: String,
    pub usage: Usage,
    pub finish: FinishReason,
}

/// One streamed fragment. Providers emit `text_delta` fragments in arrival
/// order and close with a final delta carrying usage and the finish reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatDelta {
    #[serde(default)]
    pub text_delta: Option<String>,
    #[serde(default)]
    pub usage_partial: Option<Usage>,
    #[serde(default)]
    pub finish: Option<FinishReason>,
}

#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    type Stream: Stream<Item = Result<ChatDelta, LlmError>> + Unpin + Send + 'static;

    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
    async fn chat_stream(&self, req: ChatRequest) -> Result<Self::Stream, LlmError>;
}
