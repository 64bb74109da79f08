/*!
 * Tests for application configuration functionality
 */

use verseflow::app_config::{Config, LogLevel, ProviderKind, StepConfig};
use verseflow::{StepName, WorkflowMode};

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.workflow.default_mode, WorkflowMode::Hybrid);
    assert_eq!(config.workflow.max_concurrent_workflows, 4);
    assert_eq!(config.workflow.retry_base_delay_ms, 1000);
    assert!(config.database_path.is_none());

    let hybrid = config.workflow.steps_for(WorkflowMode::Hybrid).unwrap();
    assert_eq!(hybrid.get(StepName::EditorReview).model, "deepseek-reasoner");
    assert_eq!(
        hybrid.get(StepName::InitialTranslation).prompt_template,
        "initial_translation_nonreasoning"
    );
}

/// Every default template name has a file in the shipped prompts directory
#[test]
fn test_default_config_templates_shouldExistInPromptsDir() {
    let config = Config::default();
    let prompts = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("prompts");

    for steps in config.workflow.modes.values() {
        for step in StepName::ALL {
            let name = &steps.get(step).prompt_template;
            assert!(
                prompts.join(format!("{}.yaml", name)).exists(),
                "missing template {}",
                name
            );
        }
    }
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefault() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    let reloaded = Config::from_file(&path).unwrap();
    assert_eq!(reloaded.workflow.modes, config.workflow.modes);
    assert_eq!(reloaded.providers.len(), config.providers.len());
}

#[test]
fn test_fromFile_withPartialConfig_shouldApplyDefaults() {
    let dir = common::create_temp_dir().unwrap();
    common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{ "log_level": "debug", "workflow": { "default_mode": "reasoning" } }"#,
    )
    .unwrap();

    let config = Config::from_file(&dir.path().join("conf.json")).unwrap();

    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.workflow.default_mode, WorkflowMode::Reasoning);
    assert_eq!(config.workflow.modes.len(), 3);
    assert!(config.provider("deepseek").is_some());
    assert!(config.validate().is_ok());
}

#[test]
fn test_fromFile_withInvalidJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    assert!(Config::from_file(&dir.path().join("conf.json")).is_err());
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    let duplicate = config.providers[0].clone();
    config.providers.push(duplicate);
    assert!(config.validate().is_err());
    config.providers.pop();

    config.workflow.max_concurrent_workflows = 0;
    assert!(config.validate().is_err());
    config.workflow.max_concurrent_workflows = 2;

    config.workflow.modes.remove(&WorkflowMode::Hybrid);
    assert!(config.validate().is_err());
}

#[test]
fn test_providerKind_shouldParseAndDescribeEndpoints() {
    let kind: ProviderKind = "ollama".parse().unwrap();
    assert_eq!(kind, ProviderKind::Ollama);
    assert!(!kind.requires_api_key());
    assert!(ProviderKind::Anthropic.requires_api_key());
}

/// Unknown step options are kept verbatim across a save/load cycle
#[test]
fn test_stepConfig_extra_shouldSurviveRoundTrip() {
    let json = r#"{
        "provider": "deepseek",
        "model": "deepseek-chat",
        "prompt_template": "editor_review_nonreasoning",
        "extra": { "top_p": 0.9, "stop": ["</editor_suggestions>"] }
    }"#;

    let step: StepConfig = serde_json::from_str(json).unwrap();
    assert_eq!(step.extra["top_p"], 0.9);
    assert_eq!(step.extra["stop"][0], "</editor_suggestions>");
    assert!(step.validate(StepName::EditorReview).is_ok());

    let saved = serde_json::to_string(&step).unwrap();
    let reloaded: StepConfig = serde_json::from_str(&saved).unwrap();
    assert_eq!(reloaded, step);

    let plain = serde_json::to_value(StepConfig::new("p", "m", "t")).unwrap();
    assert!(plain.get("extra").is_none());
}
