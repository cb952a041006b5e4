use futures_util::stream::BoxStream;

use crate::chat::{ChatDelta, ChatModel, ChatRequest, ChatResponse};
use crate::errors::LlmError;
use crate::model::{FinishReason, Role, Usage};
use crate::provider::{DynChatModel, ProviderCaps, ProviderFactory, Registry};

/// Development and test provider. `local:echo` mirrors the last user
/// message; `local:unavailable` fails every call the way a dead upstream
/// would, for exercising degradation paths.
pub struct LocalProviderFactory;

impl LocalProviderFactory {
    pub fn install(registry: &mut Registry) {
        registry.register(Box::new(LocalProviderFactory));
    }
}

impl ProviderFactory for LocalProviderFactory {
    fn name(&self) -> &'static str {
        "local"
    }

    fn caps(&self) -> ProviderCaps {
        ProviderCaps {
            chat: true,
            stream: true,
        }
    }

    fn create_chat(&self, model: &str) -> Option<Box<DynChatModel>> {
        match model {
            "echo" => Some(Box::new(EchoChatModel)),
            "unavailable" => Some(Box::new(UnavailableChatModel)),
            _ => None,
        }
    }
}

struct EchoChatModel;

fn echo_text(req: &ChatRequest) -> String {
    req.messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| format!("echo: {}", m.content))
        .unwrap_or_else(|| "echo:".to_string())
}

fn echo_usage(req: &ChatRequest, text: &str) -> Usage {
    let input_tokens: usize = req
        .messages
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum();
    Usage {
        input_tokens: input_tokens as u32,
        output_tokens: text.split_whitespace().count() as u32,
        requests: 1,
    }
}

#[async_trait::async_trait]
impl ChatModel for EchoChatModel {
    type Stream = BoxStream<'static, Result<ChatDelta, LlmError>>;

    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let text = echo_text(&req);
        let usage = echo_usage(&req, &text);
        Ok(ChatResponse {
            model_id: req.model_id,
            text,
            usage,
            finish: FinishReason::Stop,
        })
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<Self::Stream, LlmError> {
        let text = echo_text(&req);
        let usage = echo_usage(&req, &text);

        // One fragment per word, whitespace re-attached, so consumers must
        // preserve concatenation order to reconstruct the text.
        let mut fragments: Vec<String> = Vec::new();
        for word in text.split_inclusive(' ') {
            fragments.push(word.to_string());
        }

        let mut deltas: Vec<Result<ChatDelta, LlmError>> = fragments
            .into_iter()
            .map(|fragment| {
                Ok(ChatDelta {
                    text_delta: Some(fragment),
                    usage_partial: None,
                    finish: None,
                })
            })
            .collect();
        deltas.push(Ok(ChatDelta {
            text_delta: None,
            usage_partial: Some(usage),
            finish: Some(FinishReason::Stop),
        }));

        Ok(Box::pin(futures_util::stream::iter(deltas)))
    }
}

struct UnavailableChatModel;

#[async_trait::async_trait]
impl ChatModel for UnavailableChatModel {
    type Stream = BoxStream<'static, Result<ChatDelta, LlmError>>;

    async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
        Err(LlmError::provider_unavailable("local stub: upstream down"))
    }

    async fn chat_stream(&self, _req: ChatRequest) -> Result<Self::Stream, LlmError> {
        Err(LlmError::provider_unavailable("local stub: upstream down"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use futures_util::StreamExt;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            model_id: "local:echo".into(),
            messages: vec![Message::system("sys"), Message::user(text)],
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn echo_returns_last_user_message() {
        let response = EchoChatModel.chat(request("hello world")).await.unwrap();
        assert_eq!(response.text, "echo: hello world");
        assert_eq!(response.finish, FinishReason::Stop);
        assert!(response.usage.output_tokens > 0);
    }

    #[tokio::test]
    async fn echo_stream_reassembles_exactly() {
        let mut stream = EchoChatModel.chat_stream(request("hello world")).await.unwrap();
        let mut text = String::new();
        let mut finish = None;
        while let Some(delta) = stream.next().await {
            let delta = delta.unwrap();
            if let Some(fragment) = delta.text_delta {
                text.push_str(&fragment);
            }
            if let Some(reason) = delta.finish {
                finish = Some(reason);
            }
        }
        assert_eq!(text, "echo: hello world");
        assert_eq!(finish, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn unavailable_fails_both_modes() {
        let err = UnavailableChatModel.chat(request("hi")).await.expect_err("chat");
        assert!(err.is_provider_unavailable());
        let err = UnavailableChatModel
            .chat_stream(request("hi"))
            .await
            .err()
            .expect("stream");
        assert!(err.is_provider_unavailable());
    }
}
