/*!
 * Execution of a single workflow step.
 *
 * A step renders its prompt template, calls the configured provider with
 * retry and backoff, parses the tag-delimited response and validates the
 * required fields. Failures are classified so that only provider failures
 * (errors, timeouts, empty responses) are retried.
 */

use chrono::Utc;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::StepConfig;
use crate::errors::{ProviderError, StepError};
use crate::providers::{ChatMessage, Completion, ProviderFactory};
use crate::translation::models::{
    ExecutionMetadata, ModelInfo, StepName, StepResult, StepStatus, TokenUsage,
};
use crate::translation::parser::OutputParser;
use crate::translation::prompts::PromptService;
use crate::translation::retry::{DEFAULT_BASE_DELAY, RetryPolicy};

/// Variables passed to a step's prompt template
pub type StepInput = BTreeMap<String, Value>;

/// Characters of the raw response kept in the result metadata
pub const RAW_PREVIEW_CHARS: usize = 200;

/// Executes workflow steps against configured providers
pub struct StepExecutor {
    providers: Arc<dyn ProviderFactory>,
    prompts: Arc<PromptService>,
    parser: OutputParser,
    retry_base_delay: Duration,
}

impl StepExecutor {
    pub fn new(providers: Arc<dyn ProviderFactory>, prompts: Arc<PromptService>) -> Self {
        Self {
            providers,
            prompts,
            parser: OutputParser::new(),
            retry_base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// Delay before the first retry; later retries double it
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn prompts(&self) -> &PromptService {
        &self.prompts
    }

    /// Execute one step end-to-end
    pub async fn execute_step(
        &self,
        step_name: &str,
        input: &StepInput,
        config: &StepConfig,
    ) -> Result<StepResult, StepError> {
        let step: StepName = step_name.parse().map_err(StepError::InvalidInput)?;
        if input.is_empty() {
            return Err(StepError::InvalidInput(format!(
                "input for step '{}' must not be empty",
                step
            )));
        }

        let provider = self.providers.get_provider(&config.provider).ok_or_else(|| {
            StepError::LlmCall {
                step,
                attempts: 0,
                message: format!("provider '{}' is not available", config.provider),
            }
        })?;

        let (system_prompt, user_prompt) = self
            .prompts
            .render(&config.prompt_template, input)
            .map_err(|source| StepError::PromptRendering { step, source })?;

        debug!(
            "Step '{}': system prompt {} chars, user prompt {} chars",
            step,
            system_prompt.chars().count(),
            user_prompt.chars().count()
        );

        let messages = [ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)];
        let timeout = Duration::from_secs(config.timeout_secs);
        let policy = RetryPolicy::from_retry_attempts(config.retry_attempts)
            .with_base_delay(self.retry_base_delay);

        let started = Instant::now();
        let completion = policy
            .run(
                |attempt| {
                    let provider = Arc::clone(&provider);
                    let messages = &messages;
                    async move {
                        debug!(
                            "Step '{}': calling {} ({}), attempt {}",
                            step,
                            provider.name(),
                            config.model,
                            attempt
                        );
                        let call = provider.generate(
                            messages,
                            &config.model,
                            config.temperature,
                            config.max_tokens,
                            timeout,
                        );
                        let completion: Completion = tokio::time::timeout(timeout, call)
                            .await
                            .map_err(|_| ProviderError::Timeout(timeout.as_secs()))??;

                        if completion.content.trim().is_empty() {
                            return Err(ProviderError::EmptyResponse);
                        }
                        Ok::<_, ProviderError>(completion)
                    }
                },
                ProviderError::is_retryable,
            )
            .await
            .map_err(|e| StepError::LlmCall {
                step,
                attempts: e.attempts,
                message: e.last_error.to_string(),
            })?;
        let elapsed = started.elapsed();

        debug!(
            "Step '{}': response {} chars",
            step,
            completion.content.chars().count()
        );

        let output = self
            .parser
            .parse_and_validate(&completion.content, config.required_fields())
            .map_err(|source| StepError::OutputParsing { step, source })?;

        debug!(
            "Step '{}': parsed fields [{}]",
            step,
            output.keys().cloned().collect::<Vec<_>>().join(", ")
        );

        let usage = token_usage(&completion);
        info!(
            "Step '{}' completed in {:.2}s ({} tokens)",
            step,
            elapsed.as_secs_f64(),
            usage.total_tokens
        );

        Ok(StepResult {
            step,
            status: StepStatus::Success,
            output,
            metadata: ExecutionMetadata {
                timestamp: Utc::now(),
                execution_time_secs: elapsed.as_secs_f64(),
                model_info: ModelInfo {
                    provider: config.provider.clone(),
                    model: config.model.clone(),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                },
                usage,
                cost: 0.0,
                raw_response_preview: completion.content.chars().take(RAW_PREVIEW_CHARS).collect(),
            },
        })
    }
}

fn token_usage(completion: &Completion) -> TokenUsage {
    let prompt_tokens = completion.prompt_tokens.unwrap_or(0);
    let completion_tokens = completion.completion_tokens.unwrap_or(0);
    let total_tokens = if completion.tokens_used > 0 {
        completion.tokens_used
    } else {
        prompt_tokens + completion_tokens
    };

    TokenUsage {
        total_tokens,
        prompt_tokens,
        completion_tokens,
    }
}
