/*!
 * Common test utilities for the verseflow test suite
 */

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tempfile::TempDir;

use verseflow::Language;
use verseflow::app_config::{ProviderConfig, ProviderKind, StepConfig, WorkflowStepsConfig};
use verseflow::providers::ProviderRegistry;
use verseflow::providers::mock::MockProvider;
use verseflow::telemetry::Telemetry;
use verseflow::translation::{
    PromptService, StaticPricing, StepExecutor, TranslationInput, WorkflowMode,
    WorkflowOrchestrator,
};

/// Provider name the mock is registered under
pub const MOCK_PROVIDER: &str = "mock";

/// Model name used by every test step
pub const MOCK_MODEL: &str = "mock-model";

pub const INITIAL_TEMPLATE: &str = r#"
version: "test"
system: You translate from {{source_lang}} into {{target_lang}}.
user: |
  Poet: {{poet_name}}
  Title: {{poem_title}}
  Briefing: {{background_briefing}}
  {{original_poem}}
"#;

pub const REVIEW_TEMPLATE: &str = r#"
system: You edit {{target_lang}} poetry.
user: |
  {{original_poem}}
  ---
  {{initial_translation}}
  ---
  {{initial_translation_notes}}
"#;

pub const REVISION_TEMPLATE: &str = r#"
system: You revise your {{target_lang}} translation.
user: |
  {{initial_translation}}
  ---
  {{editor_suggestions}}
"#;

/// Route library logs to the test output; safe to call more than once
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<()> {
    fs::write(dir.join(filename), content)?;
    Ok(())
}

/// Temporary template directory holding `initial`, `review` and `revision`
pub fn template_dir() -> TempDir {
    let dir = create_temp_dir().expect("temp dir");
    create_test_file(dir.path(), "initial.yaml", INITIAL_TEMPLATE).expect("initial template");
    create_test_file(dir.path(), "review.yaml", REVIEW_TEMPLATE).expect("review template");
    create_test_file(dir.path(), "revision.yaml", REVISION_TEMPLATE).expect("revision template");
    dir
}

/// Step configuration for the mock provider
pub fn step_config(template: &str, required: &[&str]) -> StepConfig {
    StepConfig::new(MOCK_PROVIDER, MOCK_MODEL, template)
        .with_timeout_secs(5)
        .with_retry_attempts(2)
        .with_required_fields(required)
}

/// All three steps against the mock provider
pub fn workflow_steps() -> WorkflowStepsConfig {
    WorkflowStepsConfig {
        initial_translation: step_config("initial", &["initial_translation", "initial_translation_notes"]),
        editor_review: step_config("review", &["editor_suggestions"]),
        translator_revision: step_config("revision", &["revised_translation", "revised_translation_notes"]),
    }
}

/// Registry holding `provider` under `MOCK_PROVIDER`
pub fn registry_with(provider: MockProvider) -> Arc<ProviderRegistry> {
    let registry = ProviderRegistry::new();
    registry.register(
        ProviderConfig::new(MOCK_PROVIDER, ProviderKind::OpenAI),
        Arc::new(provider),
    );
    Arc::new(registry)
}

/// Executor over the mock provider with retries that do not sleep
pub fn executor(provider: MockProvider, templates: &Path) -> StepExecutor {
    StepExecutor::new(
        registry_with(provider),
        Arc::new(PromptService::new(templates)),
    )
    .with_retry_base_delay(Duration::ZERO)
}

/// Orchestrator over the mock provider with default pricing for the mock model
pub fn orchestrator(provider: MockProvider, templates: &Path) -> WorkflowOrchestrator {
    init_test_logging();
    let pricing = StaticPricing::new().with_price(
        MOCK_PROVIDER,
        MOCK_MODEL,
        verseflow::translation::ModelPricing::new(0.001, 0.002),
    );

    WorkflowOrchestrator::new(
        Arc::new(executor(provider, templates)),
        workflow_steps(),
        WorkflowMode::Hybrid,
        Arc::new(pricing),
        Arc::new(Telemetry::disabled()),
    )
    .expect("valid workflow configuration")
}

/// A short poem translated from English into Chinese
pub fn sample_input() -> TranslationInput {
    TranslationInput::new(
        "The fog comes\non little cat feet.",
        Language::English,
        Language::Chinese,
    )
    .expect("valid input")
}
