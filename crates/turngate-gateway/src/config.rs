use std::{collections::HashMap, env, path::Path, time::Duration};

use anyhow::Context;
use config::Config;
use serde::{Deserialize, Serialize};
use turngate_llm::prelude::{
    CompletionMode, GroqConfig, GroqProviderFactory, LocalProviderFactory, Registry,
};

use crate::moderation::ModerationConfig;
use crate::throttle::ThrottleConfig;

/// Fixed system instruction sent ahead of every context window.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Provide clear, accurate, and engaging responses. Keep responses concise but informative. Be friendly and professional.";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatBootstrap,
    #[serde(default)]
    pub llm: LlmBootstrap,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
}

impl GatewayConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_file = env::var("TURNGATE_CONFIG_FILE")
            .unwrap_or_else(|_| "config/turngate.local.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }

        builder = builder.add_source(config::Environment::with_prefix("TURNGATE").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Ok(config)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    pub address: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatBootstrap {
    #[serde(default = "ChatBootstrap::default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "ChatBootstrap::default_context_turns")]
    pub context_turns: u32,
    #[serde(default = "ChatBootstrap::default_history_limit")]
    pub history_limit: u32,
    #[serde(default = "ChatBootstrap::default_mode")]
    pub mode: CompletionMode,
}

impl ChatBootstrap {
    fn default_system_prompt() -> String {
        DEFAULT_SYSTEM_PROMPT.to_string()
    }

    fn default_context_turns() -> u32 {
        5
    }

    fn default_history_limit() -> u32 {
        50
    }

    fn default_mode() -> CompletionMode {
        CompletionMode::Streaming
    }
}

impl Default for ChatBootstrap {
    fn default() -> Self {
        Self {
            system_prompt: Self::default_system_prompt(),
            context_turns: Self::default_context_turns(),
            history_limit: Self::default_history_limit(),
            mode: Self::default_mode(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LlmBootstrap {
    #[serde(default = "LlmBootstrap::default_model")]
    pub default_model: String,
    #[serde(default = "LlmBootstrap::default_temperature")]
    pub temperature: f32,
    #[serde(default = "LlmBootstrap::default_top_p")]
    pub top_p: f32,
    #[serde(default = "LlmBootstrap::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub providers: Vec<LlmProviderConfig>,
}

impl LlmBootstrap {
    fn default_model() -> String {
        "groq:llama-3.2-3b-preview".to_string()
    }

    fn default_temperature() -> f32 {
        0.7
    }

    fn default_top_p() -> f32 {
        1.0
    }

    fn default_max_tokens() -> u32 {
        1000
    }

    pub fn install_providers(&self, registry: &mut Registry) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            LocalProviderFactory::install(registry);
            return Ok(());
        }
        for provider in &self.providers {
            provider.install(registry)?;
        }
        Ok(())
    }
}

impl Default for LlmBootstrap {
    fn default() -> Self {
        Self {
            default_model: Self::default_model(),
            temperature: Self::default_temperature(),
            top_p: Self::default_top_p(),
            max_tokens: Self::default_max_tokens(),
            providers: vec![LlmProviderConfig::Local],
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LlmProviderConfig {
    Local,
    Groq {
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
        #[serde(default)]
        max_concurrent_requests: Option<usize>,
        #[serde(default)]
        aliases: HashMap<String, String>,
    },
}

impl LlmProviderConfig {
    pub fn install(&self, registry: &mut Registry) -> anyhow::Result<()> {
        match self {
            LlmProviderConfig::Local => {
                LocalProviderFactory::install(registry);
                Ok(())
            }
            LlmProviderConfig::Groq {
                api_key,
                api_key_env,
                base_url,
                timeout_secs,
                max_concurrent_requests,
                aliases,
            } => {
                let key = if let Some(key) = api_key.as_ref().filter(|k| !k.is_empty()) {
                    key.clone()
                } else if let Some(env_var) = api_key_env.as_ref() {
                    env::var(env_var)
                        .with_context(|| format!("groq api key env {env_var} missing"))?
                } else {
                    anyhow::bail!("groq provider requires api_key or api_key_env");
                };

                let mut cfg = GroqConfig::new(key).map_err(anyhow::Error::new)?;
                if let Some(url) = base_url {
                    cfg = cfg.with_base_url(url).map_err(anyhow::Error::new)?;
                }
                if let Some(timeout) = timeout_secs {
                    cfg = cfg.with_timeout(Duration::from_secs(*timeout));
                }
                if let Some(limit) = max_concurrent_requests {
                    cfg = cfg.with_max_concurrency(*limit);
                }
                for (alias, target) in aliases {
                    cfg = cfg.with_alias(alias.clone(), target.clone());
                }
                let factory = GroqProviderFactory::new(cfg).map_err(anyhow::Error::new)?;
                factory.install(registry);
                Ok(())
            }
        }
    }
}
