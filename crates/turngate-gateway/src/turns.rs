use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{error, info, warn};
use turngate_llm::prelude::{
    ChatRequest, CompletionMode, FinishReason, LlmError, Message, Registry, Usage,
};
use turngate_store::prelude::{ChatTurn, HistoryStore, NewTurn};
use turngate_types::prelude::UserId;

use crate::context::ContextAssembler;
use crate::errors::GatewayError;
use crate::moderation::ModerationFilter;
use crate::throttle::ThrottleGate;

/// Stands in for the bot response whenever the completion provider fails.
/// A provider outage degrades the turn; it never loses the user's message.
pub const FALLBACK_RESPONSE: &str = "I apologize, but I'm having trouble processing your request at the moment. Please try again later.";

/// Per-deployment completion constants. Fixed at bootstrap, never set per
/// request.
#[derive(Clone, Debug)]
pub struct ChatTunables {
    pub model_id: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub mode: CompletionMode,
    pub history_limit: u32,
}

/// Orchestrates one chat turn: trim/reject, throttle, assemble context,
/// complete (degrading to the fallback on provider failure), persist, then
/// moderate the user input and flag the stored turn on a hit.
pub struct ChatTurnService {
    registry: Arc<Registry>,
    store: Arc<dyn HistoryStore>,
    throttle: Arc<dyn ThrottleGate>,
    moderation: Arc<dyn ModerationFilter>,
    assembler: ContextAssembler,
    tunables: ChatTunables,
}

impl ChatTurnService {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn HistoryStore>,
        throttle: Arc<dyn ThrottleGate>,
        moderation: Arc<dyn ModerationFilter>,
        assembler: ContextAssembler,
        tunables: ChatTunables,
    ) -> Self {
        Self {
            registry,
            store,
            throttle,
            moderation,
            assembler,
            tunables,
        }
    }

    pub async fn submit(&self, user: &UserId, raw_message: &str) -> Result<ChatTurn, GatewayError> {
        let user_message = raw_message.trim();
        if user_message.is_empty() {
            return Err(GatewayError::empty_message());
        }

        if !self.throttle.allow(user) {
            return Err(GatewayError::rate_limited(&user.0));
        }

        let messages = self.assembler.assemble(user, user_message).await?;

        let (bot_response, model_used) = match self.complete(user, messages).await {
            Ok(text) => (text, Some(self.tunables.model_id.clone())),
            Err(err) if err.is_provider_unavailable() => {
                warn!(
                    user_id = %user,
                    model_id = %self.tunables.model_id,
                    "completion degraded to fallback: {err}"
                );
                (FALLBACK_RESPONSE.to_string(), None)
            }
            Err(err) => return Err(err.into()),
        };

        let turn = self
            .store
            .append(NewTurn {
                user_id: user.clone(),
                user_message: user_message.to_string(),
                bot_response,
                model_used,
            })
            .await
            .map_err(|err| {
                // The generated response is lost here; accepted, not retried.
                error!(user_id = %user, "failed to persist turn: {err}");
                GatewayError::from(err)
            })?;

        let turn = if self.moderation.classify(user_message) {
            info!(user_id = %user, turn_id = %turn.id, "turn flagged by moderation");
            self.store.mark_flagged(user, &turn.id).await?
        } else {
            turn
        };

        Ok(turn)
    }

    pub async fn recent(&self, user: &UserId) -> Result<Vec<ChatTurn>, GatewayError> {
        Ok(self
            .store
            .list_recent(user, self.tunables.history_limit)
            .await?)
    }

    pub async fn clear(&self, user: &UserId) -> Result<u64, GatewayError> {
        let removed = self.store.delete_all(user).await?;
        info!(user_id = %user, removed, "history cleared");
        Ok(removed)
    }

    async fn complete(&self, user: &UserId, messages: Vec<Message>) -> Result<String, LlmError> {
        let model_id = &self.tunables.model_id;
        let model = self
            .registry
            .chat(model_id)
            .ok_or_else(|| LlmError::provider_unavailable(&format!("chat model not found: {model_id}")))?;

        let request = ChatRequest {
            model_id: model_id.clone(),
            messages,
            temperature: Some(self.tunables.temperature),
            top_p: Some(self.tunables.top_p),
            max_tokens: Some(self.tunables.max_tokens),
        };

        let (text, usage, finish) = match self.tunables.mode {
            CompletionMode::Blocking => {
                let response = model.chat(request).await?;
                (response.text, response.usage, response.finish)
            }
            CompletionMode::Streaming => {
                let mut stream = model.chat_stream(request).await?;
                let mut aggregated = String::new();
                let mut usage = Usage::default();
                let mut finish = FinishReason::Stop;
                while let Some(delta) = stream.next().await {
                    let delta = delta?;
                    if let Some(fragment) = delta.text_delta {
                        aggregated.push_str(&fragment);
                    }
                    if let Some(partial) = delta.usage_partial {
                        usage = partial;
                    }
                    if let Some(reason) = delta.finish {
                        finish = reason;
                    }
                }
                (aggregated, usage, finish)
            }
        };

        info!(
            user_id = %user,
            model_id = %model_id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            finish = ?finish,
            "completion finished"
        );
        Ok(text)
    }
}
