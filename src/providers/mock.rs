/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with a tagged response
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::scripted(..)` - Plays back a fixed list of outcomes
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, Completion, LlmProvider};

/// Behavior mode for the mock provider once its script is exhausted
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with the given text
    Working { text: String },
    /// Always fails with an error
    Failing,
    /// Returns truncated responses (unclosed tag)
    Truncated,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing workflow behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Fallback behavior
    behavior: MockBehavior,
    /// Outcomes returned in order before the fallback applies
    script: Arc<Mutex<VecDeque<Result<Completion, ProviderError>>>>,
    /// Request counter
    request_count: Arc<AtomicUsize>,
    /// Messages of every request, in order
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

/// Default text of a working mock: valid output for every step
pub const DEFAULT_MOCK_RESPONSE: &str = "<initial_translation>译文</initial_translation>\n\
<initial_translation_notes>Notes.</initial_translation_notes>\n\
<editor_suggestions>1. Fine.</editor_suggestions>\n\
<revised_translation>修订译文</revised_translation>\n\
<revised_translation_notes>Revised.</revised_translation_notes>";

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            script: Arc::new(Mutex::new(VecDeque::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working {
            text: DEFAULT_MOCK_RESPONSE.to_string(),
        })
    }

    /// Create a working mock provider returning the given text
    pub fn responding(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Working { text: text.into() })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns truncated responses
    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that sleeps before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a mock that plays back `outcomes`, then fails
    pub fn scripted(outcomes: Vec<Result<Completion, ProviderError>>) -> Self {
        Self::failing().with_script(outcomes)
    }

    /// Queue outcomes to return before the fallback behavior applies
    pub fn with_script(self, outcomes: Vec<Result<Completion, ProviderError>>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Queue one successful response
    pub fn then_respond(self, text: &str) -> Self {
        self.with_script(vec![Ok(Self::completion(text))])
    }

    /// Queue one error
    pub fn then_fail(self, error: ProviderError) -> Self {
        self.with_script(vec![Err(error)])
    }

    /// A completion with token counts derived from the text length
    pub fn completion(text: &str) -> Completion {
        let completion_tokens = (text.chars().count() / 4).max(1) as u64;
        Completion::with_usage(text, 100, completion_tokens)
    }

    /// Number of requests received
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Messages of the most recent request
    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.requests.lock().last().cloned()
    }

    /// Messages of every request, in order
    pub fn all_messages(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }

    async fn fallback(&self) -> Result<Completion, ProviderError> {
        match &self.behavior {
            MockBehavior::Working { text } => Ok(Self::completion(text)),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Truncated => Ok(Completion::with_usage(
                "<initial_translation>The fog comes on little",
                100,
                10,
            )),

            MockBehavior::Empty => Ok(Completion::with_usage("", 100, 0)),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(Self::completion(DEFAULT_MOCK_RESPONSE))
            }
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            script: Arc::clone(&self.script),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        _model: &str,
        _temperature: f32,
        _max_tokens: u32,
        _timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(messages.to_vec());

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => self.fallback().await,
        }
    }
}
