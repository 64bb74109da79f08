/*!
 * Provider implementations for the LLM services the workflow calls.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI-compatible: OpenAI, DeepSeek, Tongyi, LM Studio and similar
 * - Anthropic: Anthropic messages API
 * - Ollama: Local LLM server
 * - Mock: scripted responses for tests
 *
 * Every client implements `LlmProvider`; a `ProviderFactory` resolves the
 * provider named by a step configuration.
 */

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{Config, ProviderConfig, ProviderKind};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// One chat message sent to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Text and token usage returned by a provider
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    /// Generated text
    pub content: String,
    /// Total tokens billed for the call
    pub tokens_used: u64,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl Completion {
    /// Build a completion from a prompt/completion token split
    pub fn with_usage(content: impl Into<String>, prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            content: content.into(),
            tokens_used: prompt_tokens + completion_tokens,
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
        }
    }
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the step executor.
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Provider name, as used in logs
    fn name(&self) -> &str;

    /// Generate a completion for the given conversation
    ///
    /// # Arguments
    /// * `messages` - System and user messages
    /// * `model` - Model name understood by the provider
    /// * `temperature` - Sampling temperature
    /// * `max_tokens` - Maximum output tokens
    /// * `timeout` - Upper bound for the HTTP exchange
    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Completion, ProviderError>;
}

/// Resolves provider clients by name
pub trait ProviderFactory: Send + Sync {
    /// Client for the named provider
    fn get_provider(&self, name: &str) -> Option<Arc<dyn LlmProvider>>;

    /// Configuration of the named provider
    fn get_provider_config(&self, name: &str) -> Option<ProviderConfig>;
}

/// Registry of provider clients, shared read-mostly between workflows
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    configs: RwLock<HashMap<String, ProviderConfig>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for every configured provider.
    ///
    /// Providers whose API key cannot be resolved are skipped with a warning;
    /// steps that name them fail when they run.
    pub fn from_config(config: &Config) -> Self {
        let registry = Self::new();

        for provider_config in &config.providers {
            match build_provider(provider_config) {
                Ok(provider) => registry.register(provider_config.clone(), provider),
                Err(e) => warn!("Provider '{}' is unavailable: {}", provider_config.name, e),
            }
        }

        registry
    }

    /// Register or replace a provider
    pub fn register(&self, config: ProviderConfig, provider: Arc<dyn LlmProvider>) {
        debug!("Registering provider '{}' ({})", config.name, config.provider_type);
        self.providers.write().insert(config.name.clone(), provider);
        self.configs.write().insert(config.name.clone(), config);
    }

    /// Names of all registered providers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ProviderFactory for ProviderRegistry {
    fn get_provider(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.read().get(name).cloned()
    }

    fn get_provider_config(&self, name: &str) -> Option<ProviderConfig> {
        self.configs.read().get(name).cloned()
    }
}

fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let api_key = config.resolve_api_key();
    if config.provider_type.requires_api_key() && api_key.is_none() {
        return Err(ProviderError::AuthenticationError(format!(
            "no API key configured (set `api_key` or the `{}` environment variable)",
            config.api_key_env.as_deref().unwrap_or("api_key_env")
        )));
    }
    let api_key = api_key.unwrap_or_default();
    let timeout = Duration::from_secs(config.timeout_secs);

    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderKind::OpenAI => Arc::new(openai::OpenAI::new(
            &config.name,
            api_key,
            config.endpoint(),
            timeout,
        )),
        ProviderKind::Anthropic => Arc::new(anthropic::Anthropic::new(
            &config.name,
            api_key,
            config.endpoint(),
            timeout,
        )),
        ProviderKind::Ollama => Arc::new(ollama::Ollama::from_url(
            &config.name,
            config.endpoint(),
            timeout,
        )?),
    };

    Ok(provider)
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        code => ProviderError::ApiError {
            status_code: code,
            message: body,
        },
    }
}

/// Map a reqwest transport error to a provider error
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout.as_secs())
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}
