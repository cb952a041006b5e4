use std::{collections::HashMap, sync::Arc, time::Duration};

use async_stream::try_stream;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode, Url,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::{
    chat::{ChatDelta, ChatModel, ChatRequest, ChatResponse},
    errors::LlmError,
    model::{FinishReason, Message, Role, Usage},
    provider::{DynChatModel, ProviderCaps, ProviderFactory, Registry},
};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1/";
const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// Configuration options for the Groq provider. All sampling parameters
/// travel with the request; this covers transport concerns only.
#[derive(Clone, Debug)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: Url,
    pub request_timeout: Duration,
    pub model_aliases: HashMap<String, String>,
    pub max_concurrent_requests: usize,
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|err| LlmError::unknown(&format!("groq base url parse failed: {err}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url,
            request_timeout: Duration::from_secs(30),
            model_aliases: HashMap::new(),
            max_concurrent_requests: 8,
        })
    }

    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, LlmError> {
        self.base_url = Url::parse(base_url.as_ref())
            .map_err(|err| LlmError::unknown(&format!("groq base url parse failed: {err}")))?;
        if !self.base_url.path().ends_with('/') {
            self.base_url
                .set_path(&format!("{}/", self.base_url.path().trim_end_matches('/')));
        }
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.model_aliases.insert(alias.into(), target.into());
        self
    }
}

struct GroqShared {
    client: Client,
    config: GroqConfig,
    limiter: Arc<Semaphore>,
    chat_url: Url,
}

impl GroqShared {
    fn resolve_model(&self, requested: &str) -> String {
        self.config
            .model_aliases
            .get(requested)
            .cloned()
            .unwrap_or_else(|| requested.to_string())
    }
}

pub struct GroqProviderFactory {
    shared: Arc<GroqShared>,
}

impl GroqProviderFactory {
    pub fn new(config: GroqConfig) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|err| LlmError::unknown(&format!("invalid groq api key: {err}")))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| LlmError::unknown(&format!("groq client build failed: {err}")))?;

        let chat_url = config
            .base_url
            .join(CHAT_COMPLETIONS_PATH)
            .map_err(|err| LlmError::unknown(&format!("groq chat url join failed: {err}")))?;

        let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests));

        Ok(Self {
            shared: Arc::new(GroqShared {
                client,
                chat_url,
                limiter,
                config,
            }),
        })
    }

    pub fn install(self, registry: &mut Registry) {
        registry.register(Box::new(self));
    }
}

impl ProviderFactory for GroqProviderFactory {
    fn name(&self) -> &'static str {
        "groq"
    }

    fn caps(&self) -> ProviderCaps {
        ProviderCaps {
            chat: true,
            stream: true,
        }
    }

    fn create_chat(&self, model: &str) -> Option<Box<DynChatModel>> {
        let resolved = self.shared.resolve_model(model);
        Some(Box::new(GroqChatModel {
            model: resolved,
            shared: self.shared.clone(),
        }))
    }
}

struct GroqChatModel {
    model: String,
    shared: Arc<GroqShared>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OutboundMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatCompletionChoice>,
    usage: Option<UsagePayload>,
}

#[derive(Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: InboundMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Deserialize, Default)]
struct StreamChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatModel for GroqChatModel {
    type Stream = BoxStream<'static, Result<ChatDelta, LlmError>>;

    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let payload = build_request(&self.model, &req, false);

        let _permit = self
            .shared
            .limiter
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| LlmError::unknown(&format!("groq limiter closed: {err}")))?;

        let response = self
            .shared
            .client
            .post(self.shared.chat_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| LlmError::provider_unavailable(&format!("groq request error: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let decoded = response.json::<ChatCompletionResponse>().await.map_err(|err| {
            LlmError::provider_unavailable(&format!("groq response decode: {err}"))
        })?;
        build_chat_response(&req, decoded)
    }

    async fn chat_stream(&self, req: ChatRequest) -> Result<Self::Stream, LlmError> {
        let shared = self.shared.clone();
        let model = self.model.clone();
        let stream = try_stream! {
            let request = req;
            let payload = build_request(&model, &request, true);

            let _permit = shared
                .limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| LlmError::unknown(&format!("groq limiter closed: {err}")))?;

            let response = shared
                .client
                .post(shared.chat_url.clone())
                .json(&payload)
                .send()
                .await
                .map_err(|err| LlmError::provider_unavailable(&format!("groq request error: {err}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = format!("stream init failed (status {status})");
                Err(map_http_error(status, &body))?;
            }

            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            let mut data_buf = String::new();
            let mut usage_final: Option<Usage> = None;
            let mut finish_final: Option<FinishReason> = None;
            let mut done = false;

            while let Some(chunk) = body.next().await {
                let chunk = chunk
                    .map_err(|err| LlmError::provider_unavailable(&format!("groq stream chunk error: {err}")))?;
                let chunk_str = std::str::from_utf8(&chunk)
                    .map_err(|err| LlmError::provider_unavailable(&format!("groq stream utf8 error: {err}")))?;
                buffer.push_str(chunk_str);

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].to_string();
                    buffer = buffer[pos + 1..].to_string();

                    if line.starts_with("data:") {
                        let data = line
                            .trim_start_matches("data:")
                            .trim_start_matches(' ')
                            .to_string();
                        if !data.is_empty() {
                            if !data_buf.is_empty() {
                                data_buf.push('\n');
                            }
                            data_buf.push_str(&data);
                        }
                    } else if line.is_empty() {
                        if data_buf.is_empty() {
                            continue;
                        }
                        let data = data_buf.trim_end();
                        if data == "[DONE]" {
                            done = true;
                            data_buf.clear();
                            break;
                        }

                        let chunk: StreamChunk = serde_json::from_str(data).map_err(|err| {
                            LlmError::provider_unavailable(&format!(
                                "groq stream decode error: {err}; payload={data}"
                            ))
                        })?;

                        if let Some(usage) = chunk.usage {
                            usage_final = Some(Usage {
                                input_tokens: usage.prompt_tokens.unwrap_or_default(),
                                output_tokens: usage.completion_tokens.unwrap_or_default(),
                                requests: 1,
                            });
                        }

                        for choice in chunk.choices {
                            if choice.index != 0 {
                                continue;
                            }
                            if let Some(content) = choice.delta.content {
                                yield ChatDelta {
                                    text_delta: Some(content),
                                    usage_partial: None,
                                    finish: None,
                                };
                            }
                            if let Some(reason) = choice.finish_reason {
                                finish_final = Some(map_finish_reason(Some(reason)));
                            }
                        }

                        data_buf.clear();
                    }
                }

                if done {
                    break;
                }
            }

            let usage = usage_final.unwrap_or(Usage {
                input_tokens: 0,
                output_tokens: 0,
                requests: 1,
            });
            let finish = finish_final.unwrap_or(FinishReason::Stop);
            yield ChatDelta {
                text_delta: None,
                usage_partial: Some(usage),
                finish: Some(finish),
            };
        };

        Ok(Box::pin(stream))
    }
}

fn build_request<'a>(model: &'a str, req: &'a ChatRequest, stream: bool) -> ChatCompletionRequest<'a> {
    let messages = req.messages.iter().map(to_outbound_message).collect();

    ChatCompletionRequest {
        model,
        messages,
        temperature: req.temperature,
        top_p: req.top_p,
        max_tokens: req.max_tokens,
        stream,
        stream_options: if stream {
            Some(StreamOptions {
                include_usage: true,
            })
        } else {
            None
        },
    }
}

fn to_outbound_message(message: &Message) -> OutboundMessage<'_> {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    OutboundMessage {
        role,
        content: &message.content,
    }
}

fn build_chat_response(
    request: &ChatRequest,
    response: ChatCompletionResponse,
) -> Result<ChatResponse, LlmError> {
    let mut choices = response.choices;
    if choices.is_empty() {
        return Err(LlmError::provider_unavailable(&format!(
            "groq returned no choices for model {}",
            response.model
        )));
    }

    let choice = choices.remove(0);
    let finish = map_finish_reason(choice.finish_reason);
    let text = choice.message.content.unwrap_or_default();

    let usage = response
        .usage
        .map(|u| Usage {
            input_tokens: u.prompt_tokens.unwrap_or_default(),
            output_tokens: u.completion_tokens.unwrap_or_default(),
            requests: 1,
        })
        .unwrap_or(Usage {
            input_tokens: 0,
            output_tokens: 0,
            requests: 1,
        });

    Ok(ChatResponse {
        model_id: request.model_id.clone(),
        text,
        usage,
        finish,
    })
}

fn map_finish_reason(reason: Option<String>) -> FinishReason {
    match reason.as_deref() {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::Safety,
        Some(other) => FinishReason::Other(other.to_string()),
        None => FinishReason::Stop,
    }
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::provider_unavailable(&format!("groq auth failed: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::provider_unavailable(&format!("groq rate limited request: {body}"))
        }
        StatusCode::BAD_REQUEST => {
            LlmError::provider_unavailable(&format!("groq rejected request: {body}"))
        }
        _ => LlmError::provider_unavailable(&format!(
            "groq returned {}: {}",
            status.as_u16(),
            body
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request(model_id: &str) -> ChatRequest {
        ChatRequest {
            model_id: model_id.to_string(),
            messages: vec![
                Message::system("You are a helpful AI assistant."),
                Message::user("Say hi"),
            ],
            temperature: Some(0.7),
            top_p: Some(1.0),
            max_tokens: Some(1000),
        }
    }

    fn sample_response() -> JsonValue {
        json!({
            "id": "chatcmpl-1",
            "model": "llama-3.2-3b-preview",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": "hello there"
                }
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 6,
                "total_tokens": 18
            }
        })
    }

    async fn factory_for(server: &MockServer) -> GroqProviderFactory {
        let cfg = GroqConfig::new("test-key")
            .unwrap()
            .with_base_url(server.uri())
            .unwrap();
        GroqProviderFactory::new(cfg).unwrap()
    }

    #[tokio::test]
    async fn chat_happy_path() {
        let server = MockServer::start().await;

        let response = ResponseTemplate::new(200).set_body_json(sample_response());
        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(response)
            .mount(&server)
            .await;

        let factory = factory_for(&server).await;
        let model = factory.create_chat("llama-3.2-3b-preview").unwrap();

        let response = model.chat(sample_request("groq:llama-3.2-3b-preview")).await.unwrap();

        assert_eq!(response.text, "hello there");
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 6);
        assert_eq!(response.finish, FinishReason::Stop);
    }

    #[tokio::test]
    async fn chat_resolves_model_alias() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .and(body_partial_json(json!({"model": "llama-3.2-3b-preview"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_response()))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = GroqConfig::new("test-key")
            .unwrap()
            .with_base_url(server.uri())
            .unwrap()
            .with_alias("default", "llama-3.2-3b-preview");
        let factory = GroqProviderFactory::new(cfg).unwrap();
        let model = factory.create_chat("default").unwrap();

        model.chat(sample_request("groq:default")).await.unwrap();
    }

    #[tokio::test]
    async fn chat_maps_auth_failure_to_provider_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let factory = factory_for(&server).await;
        let model = factory.create_chat("llama-3.2-3b-preview").unwrap();

        let err = model
            .chat(sample_request("groq:llama-3.2-3b-preview"))
            .await
            .expect_err("auth failure");
        assert!(err.is_provider_unavailable());
    }

    #[tokio::test]
    async fn chat_stream_accumulates_fragments_in_order() {
        let server = MockServer::start().await;

        let body = concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hello \"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"there\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":6}}\n\n",
            "data: [DONE]\n\n"
        );

        let response = ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("content-type", "text/event-stream");

        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(response)
            .expect(1)
            .mount(&server)
            .await;

        let factory = factory_for(&server).await;
        let model = factory.create_chat("llama-3.2-3b-preview").unwrap();

        let mut stream = model
            .chat_stream(sample_request("groq:llama-3.2-3b-preview"))
            .await
            .unwrap();
        let mut collected = Vec::new();
        while let Some(item) = stream.next().await {
            collected.push(item.unwrap());
        }

        let text: String = collected
            .iter()
            .filter_map(|delta| delta.text_delta.clone())
            .collect();
        assert_eq!(text, "hello there");

        let final_delta = collected
            .iter()
            .find(|delta| delta.finish.is_some())
            .expect("final delta");
        assert_eq!(final_delta.finish, Some(FinishReason::Stop));
        let usage = final_delta.usage_partial.as_ref().expect("usage");
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 6);
    }

    #[tokio::test]
    async fn chat_stream_surfaces_init_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("/{CHAT_COMPLETIONS_PATH}")))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let factory = factory_for(&server).await;
        let model = factory.create_chat("llama-3.2-3b-preview").unwrap();

        let mut stream = model
            .chat_stream(sample_request("groq:llama-3.2-3b-preview"))
            .await
            .unwrap();
        let first = stream.next().await.expect("one item");
        assert!(first.expect_err("stream init failure").is_provider_unavailable());
    }
}
