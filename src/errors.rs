/*!
 * Error types for the verseflow workflow engine.
 *
 * Each layer of the pipeline owns its error enum, built with thiserror:
 * - `ConfigError`: configuration rejected before any work starts
 * - `ProviderError`: a single LLM call failed
 * - `TemplateError`: prompt template loading or rendering failed
 * - `ParseError`: the structured LLM output could not be extracted or validated
 * - `StepError`: one workflow step failed end-to-end
 * - `WorkflowError`: the three-step workflow failed, was cancelled, or timed out
 */

use std::time::Duration;
use thiserror::Error;

use crate::language_utils::Language;
use crate::translation::models::StepName;

/// Errors raised while validating configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A step configuration holds an out-of-range or empty value
    #[error("Invalid configuration for step '{step}': {message}")]
    InvalidStep { step: StepName, message: String },

    /// A workflow mode has no step configuration
    #[error("No step configuration for workflow mode '{0}'")]
    MissingMode(String),

    /// A step names a provider that is not configured
    #[error("Step '{step}' references unknown provider '{provider}'")]
    UnknownProvider { step: StepName, provider: String },
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not complete within its timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// The provider returned no usable content
    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// The request itself is invalid (bad model name, bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Authentication failures and invalid requests are configuration
    /// problems; client-side 4xx errors other than 408/429 behave the same.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthenticationError(_) | Self::InvalidRequest(_) => false,
            Self::ApiError { status_code, .. } => {
                !(400..500).contains(status_code) || *status_code == 408 || *status_code == 429
            }
            _ => true,
        }
    }
}

/// Errors raised by the prompt template service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Template file missing, unreadable, or unparsable
    #[error("Failed to load template '{name}': {message}")]
    Load {
        /// Template name (file stem)
        name: String,
        /// What went wrong
        message: String,
    },

    /// Required variable missing, or the template syntax is malformed
    #[error("Failed to render template '{name}': {message}")]
    Variable {
        /// Template name (file stem)
        name: String,
        /// What went wrong
        message: String,
    },
}

/// Errors raised while extracting structured fields from LLM output
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The text contains malformed or unterminated tags
    #[error("Malformed output: {0}")]
    Parsing(String),

    /// Required fields are absent from the parsed output
    #[error("Missing required fields: {}", missing.join(", "))]
    Validation {
        /// Every required field that was not found
        missing: Vec<String>,
    },
}

/// Errors raised while executing a single workflow step
#[derive(Error, Debug)]
pub enum StepError {
    /// Unknown step name or empty input map; never retried
    #[error("Invalid step input: {0}")]
    InvalidInput(String),

    /// The LLM call failed, or no provider could be resolved
    #[error("LLM call for step '{step}' failed after {attempts} attempt(s): {message}")]
    LlmCall {
        /// Step that issued the call
        step: StepName,
        /// Number of attempts actually made
        attempts: u32,
        /// Description of the last failure
        message: String,
    },

    /// The prompt could not be rendered
    #[error("Prompt rendering failed for step '{step}': {source}")]
    PromptRendering {
        /// Step whose prompt failed
        step: StepName,
        /// Underlying template error
        #[source]
        source: TemplateError,
    },

    /// The LLM response could not be parsed or validated
    #[error("Output parsing failed for step '{step}': {source}")]
    OutputParsing {
        /// Step whose output was rejected
        step: StepName,
        /// Underlying parse error
        #[source]
        source: ParseError,
    },
}

/// Errors raised when constructing a `TranslationInput`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Poem text must not be empty")]
    EmptyPoem,

    #[error("Poem text is {length} characters, maximum is {max}")]
    PoemTooLong { length: usize, max: usize },

    #[error("Source and target language are both {0}")]
    SameLanguage(Language),
}

/// Errors raised by the workflow orchestrator
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Step configuration rejected when the orchestrator was built
    #[error("Invalid workflow configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// One of the three steps failed; the workflow is not resumable
    #[error("Workflow {workflow_id} failed at step '{step}': {source}")]
    StepFailed {
        workflow_id: String,
        step: StepName,
        #[source]
        source: StepError,
    },

    /// `cancel()` was observed at a step boundary
    #[error("Workflow {workflow_id} cancelled before step '{step}'")]
    Cancelled { workflow_id: String, step: StepName },

    /// The caller-supplied wall-clock limit was exceeded
    #[error("Workflow {workflow_id} timed out after {limit:?}")]
    Timeout { workflow_id: String, limit: Duration },
}

impl WorkflowError {
    /// The step this error is attributed to, if any
    pub fn failed_step(&self) -> Option<StepName> {
        match self {
            Self::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The workflow id this error belongs to, if one was assigned
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            Self::StepFailed { workflow_id, .. }
            | Self::Cancelled { workflow_id, .. }
            | Self::Timeout { workflow_id, .. } => Some(workflow_id),
            Self::InvalidConfig(_) => None,
        }
    }
}
