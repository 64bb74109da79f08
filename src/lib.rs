/*!
 * # verseflow - three-step AI poetry translation
 *
 * A Rust library that translates poems through a translator/editor loop
 * driven by large language models.
 *
 * ## Features
 *
 * - Three-step workflow: initial translation, editor review, revision
 * - Versioned YAML prompt templates with strict variable substitution
 * - Tag-delimited structured output parsing and validation
 * - Retry with exponential backoff around every provider call
 * - Token and cost accounting per step and per workflow
 * - Providers:
 *   - OpenAI-compatible APIs (OpenAI, DeepSeek, Tongyi, LM Studio)
 *   - Anthropic API
 *   - Ollama (local LLM)
 * - SQLite storage for poems, briefings and finished translations
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Wiring of configuration, storage and workflow runs
 * - `translation`: The workflow engine:
 *   - `translation::prompts`: Prompt template service
 *   - `translation::parser`: Output parser
 *   - `translation::executor`: Step executor
 *   - `translation::workflow`: Orchestrator and progress events
 * - `providers`: Client implementations for various LLM providers
 * - `database`: SQLite persistence
 * - `telemetry`: Logging and workflow counters
 * - `language_utils`: Supported languages and ISO code parsing
 * - `errors`: Custom error types for the application
 * - `file_utils`: Poem files and atomic JSON output
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod telemetry;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{ConfigError, ParseError, ProviderError, StepError, TemplateError, WorkflowError};
pub use language_utils::{Language, languages_match};
pub use telemetry::Telemetry;
pub use translation::{StepName, TranslationInput, TranslationOutput, WorkflowMode, WorkflowOrchestrator};
