pub mod groq;
pub mod local;

use std::collections::HashMap;

use futures_util::stream::BoxStream;

use crate::chat::{ChatDelta, ChatModel};
use crate::errors::LlmError;

pub type DynChatModel = dyn ChatModel<Stream = BoxStream<'static, Result<ChatDelta, LlmError>>>;

#[derive(Clone, Copy, Debug)]
pub struct ProviderCaps {
    pub chat: bool,
    pub stream: bool,
}

pub trait ProviderFactory: Send + Sync {
    fn name(&self) -> &'static str;
    fn caps(&self) -> ProviderCaps;
    fn create_chat(&self, model: &str) -> Option<Box<DynChatModel>>;
}

/// Resolves `provider:model` ids to chat models via installed factories.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<&'static str, Box<dyn ProviderFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Box<dyn ProviderFactory>) {
        self.factories.insert(factory.name(), factory);
    }

    pub fn chat(&self, model_id: &str) -> Option<Box<DynChatModel>> {
        let (provider, model) = model_id.split_once(':')?;
        self.factories.get(provider)?.create_chat(model)
    }
}
