use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, Completion, LlmProvider, status_error, transport_error};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Provider name from the configuration
    name: String,
    /// Base URL of the Ollama API
    base_url: Url,
    /// HTTP client for making requests
    client: Client,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// Model name to use for generation
    model: &'a str,
    /// Messages of the conversation
    messages: &'a [ChatMessage],
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Model name
    pub model: String,
    /// Response message
    pub message: ChatMessage,
    /// Whether the generation is complete
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl Ollama {
    /// Create a new Ollama client from a complete URL such as `http://localhost:11434`
    pub fn from_url(
        name: impl Into<String>,
        url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base_url = Url::parse(url)
            .map_err(|e| ProviderError::InvalidRequest(format!("invalid Ollama URL '{}': {}", url, e)))?;

        Ok(Self {
            name: name.into(),
            base_url,
            client: Client::builder()
                .timeout(timeout)
                // Force HTTP/1.1 - Ollama uses HTTP/1.1
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
        })
    }

    fn chat_url(&self) -> Result<Url, ProviderError> {
        self.base_url
            .join("api/chat")
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))
    }

    /// Turn a chat response into a completion
    pub fn into_completion(response: ChatResponse) -> Completion {
        Completion::with_usage(
            response.message.content,
            response.prompt_eval_count.unwrap_or(0),
            response.eval_count.unwrap_or(0),
        )
    }
}

#[async_trait]
impl LlmProvider for Ollama {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let request = ChatRequest {
            model,
            messages,
            options: Some(GenerationOptions {
                temperature: Some(temperature),
                num_predict: Some(max_tokens),
            }),
            stream: false,
        };

        let response = self
            .client
            .post(self.chat_url()?)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(status_error(status, error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to get response text from Ollama API: {}", e)))?;

        let chat_response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!(
                "Failed to parse Ollama API response: {}. Raw response (first 500 chars): {}",
                e,
                response_text.chars().take(500).collect::<String>()
            );
            ProviderError::ParseError(e.to_string())
        })?;

        Ok(Self::into_completion(chat_response))
    }
}
