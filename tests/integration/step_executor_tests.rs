/*!
 * Integration tests for single-step execution against mock providers.
 */

use serde_json::Value;
use verseflow::errors::{ParseError, ProviderError, StepError, TemplateError};
use verseflow::providers::mock::MockProvider;
use verseflow::translation::{StepInput, StepName};

use crate::common::{self, MOCK_MODEL, MOCK_PROVIDER};

fn initial_input() -> StepInput {
    [
        ("original_poem", "The fog comes\non little cat feet."),
        ("source_lang", "English"),
        ("target_lang", "Chinese"),
        ("poet_name", "Carl Sandburg"),
        ("poem_title", "Fog"),
        ("background_briefing", "(none available)"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
    .collect()
}

fn initial_config() -> verseflow::app_config::StepConfig {
    common::step_config("initial", &["initial_translation", "initial_translation_notes"])
}

#[tokio::test]
async fn test_executeStep_withValidResponse_shouldReturnParsedResult() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let executor = common::executor(provider.clone(), templates.path());

    let result = executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap();

    assert_eq!(result.step, StepName::InitialTranslation);
    assert_eq!(result.output["initial_translation"], "译文");
    assert_eq!(result.output["initial_translation_notes"], "Notes.");
    assert_eq!(result.metadata.model_info.provider, MOCK_PROVIDER);
    assert_eq!(result.metadata.model_info.model, MOCK_MODEL);
    assert_eq!(result.metadata.usage.prompt_tokens, 100);
    assert_eq!(
        result.metadata.usage.total_tokens,
        result.metadata.usage.prompt_tokens + result.metadata.usage.completion_tokens
    );
    assert!(result.metadata.raw_response_preview.chars().count() <= 200);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_executeStep_shouldSendRenderedPrompts() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let executor = common::executor(provider.clone(), templates.path());

    executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap();

    let messages = provider.last_messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[0].content, "You translate from English into Chinese.");
    assert!(messages[1].content.contains("Poet: Carl Sandburg"));
    assert!(messages[1].content.contains("on little cat feet."));
}

#[tokio::test]
async fn test_executeStep_withTransientFailures_shouldRetryUntilSuccess() {
    let templates = common::template_dir();
    let provider = MockProvider::working()
        .then_fail(ProviderError::Timeout(5))
        .then_fail(ProviderError::RateLimitExceeded("slow down".into()));
    let executor = common::executor(provider.clone(), templates.path());

    let result = executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap();

    assert_eq!(result.output["initial_translation"], "译文");
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_executeStep_withPersistentFailure_shouldStopAfterAllAttempts() {
    let templates = common::template_dir();
    let provider = MockProvider::failing();
    let executor = common::executor(provider.clone(), templates.path());
    let config = initial_config().with_retry_attempts(3);

    let err = executor
        .execute_step("initial_translation", &initial_input(), &config)
        .await
        .unwrap_err();

    match err {
        StepError::LlmCall { step, attempts, message } => {
            assert_eq!(step, StepName::InitialTranslation);
            assert_eq!(attempts, 4);
            assert!(message.contains("Simulated provider failure"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(provider.call_count(), 4);
}

#[tokio::test]
async fn test_executeStep_withAuthenticationError_shouldNotRetry() {
    let templates = common::template_dir();
    let provider = MockProvider::working()
        .then_fail(ProviderError::AuthenticationError("bad key".into()));
    let executor = common::executor(provider.clone(), templates.path());

    let err = executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap_err();

    assert!(matches!(err, StepError::LlmCall { attempts: 1, .. }));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_executeStep_withEmptyResponses_shouldRetryThenFail() {
    let templates = common::template_dir();
    let provider = MockProvider::empty();
    let executor = common::executor(provider.clone(), templates.path());

    let err = executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap_err();

    match err {
        StepError::LlmCall { attempts, message, .. } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("empty"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_executeStep_withMissingRequiredField_shouldFailWithoutRetry() {
    let templates = common::template_dir();
    let provider = MockProvider::responding("<initial_translation>译文</initial_translation>");
    let executor = common::executor(provider.clone(), templates.path());

    let err = executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap_err();

    match err {
        StepError::OutputParsing { step, source } => {
            assert_eq!(step, StepName::InitialTranslation);
            assert_eq!(
                source,
                ParseError::Validation {
                    missing: vec!["initial_translation_notes".to_string()]
                }
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_executeStep_withTruncatedResponse_shouldReportParsingError() {
    let templates = common::template_dir();
    let executor = common::executor(MockProvider::truncated(), templates.path());

    let err = executor
        .execute_step("initial_translation", &initial_input(), &initial_config())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StepError::OutputParsing { source: ParseError::Parsing(_), .. }
    ));
}

#[tokio::test]
async fn test_executeStep_withMissingVariable_shouldFailBeforeCallingProvider() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let executor = common::executor(provider.clone(), templates.path());

    let mut input = initial_input();
    input.remove("poet_name");

    let err = executor
        .execute_step("initial_translation", &input, &initial_config())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StepError::PromptRendering { source: TemplateError::Variable { .. }, .. }
    ));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_executeStep_withUnknownTemplate_shouldReportLoadError() {
    let templates = common::template_dir();
    let executor = common::executor(MockProvider::working(), templates.path());
    let config = common::step_config("missing_template", &[]);

    let err = executor
        .execute_step("initial_translation", &initial_input(), &config)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StepError::PromptRendering { source: TemplateError::Load { .. }, .. }
    ));
}

#[tokio::test]
async fn test_executeStep_withInvalidStepOrInput_shouldRejectImmediately() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let executor = common::executor(provider.clone(), templates.path());

    let err = executor
        .execute_step("final_polish", &initial_input(), &initial_config())
        .await
        .unwrap_err();
    assert!(matches!(err, StepError::InvalidInput(_)));

    let err = executor
        .execute_step("initial_translation", &StepInput::new(), &initial_config())
        .await
        .unwrap_err();
    assert!(matches!(err, StepError::InvalidInput(_)));

    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_executeStep_withUnknownProvider_shouldFailWithoutAttempts() {
    let templates = common::template_dir();
    let executor = common::executor(MockProvider::working(), templates.path());
    let mut config = initial_config();
    config.provider = "nowhere".to_string();

    let err = executor
        .execute_step("initial_translation", &initial_input(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, StepError::LlmCall { attempts: 0, .. }));
}

#[tokio::test]
async fn test_executeStep_withSlowProvider_shouldTimeOutEachAttempt() {
    let templates = common::template_dir();
    let provider = MockProvider::slow(3_000);
    let executor = common::executor(provider.clone(), templates.path());
    let config = initial_config().with_timeout_secs(1).with_retry_attempts(0);

    let err = executor
        .execute_step("initial_translation", &initial_input(), &config)
        .await
        .unwrap_err();

    match err {
        StepError::LlmCall { attempts, message, .. } => {
            assert_eq!(attempts, 1);
            assert!(message.contains("timed out"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
