/*!
 * The poetry translation workflow.
 *
 * This module contains the engine that turns a poem into a reviewed and
 * revised translation. It is split into several submodules:
 *
 * - `models`: inputs, step results and the final output
 * - `prompts`: prompt template loading and rendering
 * - `parser`: extraction of tag-delimited fields from LLM output
 * - `retry`: retry policy with exponential backoff
 * - `executor`: execution of a single step
 * - `pricing`: token prices and cost calculation
 * - `services`: poem, briefing and persistence interfaces
 * - `workflow`: the three-step orchestrator and progress events
 */

// Re-export main types for easier usage
pub use self::executor::{StepExecutor, StepInput};
pub use self::models::{
    EditorReview, InitialTranslation, RevisedTranslation, StepName, StepResult,
    TranslationInput, TranslationOutput, WorkflowMode,
};
pub use self::parser::OutputParser;
pub use self::pricing::{ModelPricing, PricingRegistry, StaticPricing};
pub use self::prompts::{PromptService, PromptTemplate};
pub use self::retry::RetryPolicy;
pub use self::workflow::{WorkflowOrchestrator, WorkflowState};

// Submodules
pub mod executor;
pub mod models;
pub mod parser;
pub mod pricing;
pub mod prompts;
pub mod retry;
pub mod services;
pub mod workflow;
