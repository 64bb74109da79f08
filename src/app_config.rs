use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::translation::models::{StepName, WorkflowMode};
use crate::translation::pricing::ModelPricing;

/// Application configuration module
/// This module handles loading, validating and saving the workflow
/// configuration: providers and their prices, the three step
/// configurations of every workflow mode, and runtime settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Configured LLM providers
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Workflow settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Directory holding the prompt templates
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// SQLite database file; the platform data directory is used when absent
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Wire protocol a provider speaks
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (OpenAI, DeepSeek, Tongyi, LM Studio)
    #[default]
    OpenAI,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI-compatible",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
        }
    }

    /// Endpoint used when the configuration leaves it empty
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Whether the provider needs an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// One configured provider
#[derive(Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Name steps refer to (e.g. "deepseek")
    pub name: String,

    /// Wire protocol
    #[serde(rename = "type", default)]
    pub provider_type: ProviderKind,

    /// API key; prefer `api_key_env` to keep keys out of the file
    #[serde(default = "String::new", skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Service URL; the protocol's default when empty
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// HTTP client timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Models this provider serves (informational)
    #[serde(default)]
    pub models: Vec<String>,

    /// Model name -> price per 1000 tokens
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, provider_type: ProviderKind) -> Self {
        Self {
            name: name.into(),
            provider_type,
            api_key: String::new(),
            api_key_env: None,
            endpoint: String::new(),
            timeout_secs: default_provider_timeout_secs(),
            models: Vec::new(),
            pricing: HashMap::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn with_model(mut self, model: &str, pricing: ModelPricing) -> Self {
        self.models.push(model.to_string());
        self.pricing.insert(model.to_string(), pricing);
        self
    }

    /// Configured endpoint, or the protocol default
    pub fn endpoint(&self) -> &str {
        if self.endpoint.is_empty() {
            self.provider_type.default_endpoint()
        } else {
            &self.endpoint
        }
    }

    /// API key from the file, else from `api_key_env`
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

// API keys never appear in debug output
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("provider_type", &self.provider_type)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("api_key_env", &self.api_key_env)
            .field("endpoint", &self.endpoint())
            .field("timeout_secs", &self.timeout_secs)
            .field("models", &self.models)
            .finish()
    }
}

/// Configuration of one workflow step
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StepConfig {
    /// Provider name, resolved through the provider factory
    pub provider: String,

    /// Model name
    pub model: String,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Template name, without extension
    pub prompt_template: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_step_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fields the parsed output must contain
    #[serde(default)]
    pub required_fields: Option<Vec<String>>,

    /// Extra keys kept from the configuration file so that newer provider
    /// options survive a load/save cycle. Nothing reads them when calling a
    /// provider.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl StepConfig {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            prompt_template: prompt_template.into(),
            timeout_secs: default_step_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            required_fields: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn with_required_fields(mut self, fields: &[&str]) -> Self {
        self.required_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Required fields, empty when none are configured
    pub fn required_fields(&self) -> &[String] {
        self.required_fields.as_deref().unwrap_or(&[])
    }

    /// Check value ranges for the step this configuration is used by
    pub fn validate(&self, step: StepName) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidStep { step, message };

        if self.provider.trim().is_empty() {
            return Err(invalid("provider must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model must not be empty".to_string()));
        }
        if self.prompt_template.trim().is_empty() {
            return Err(invalid("prompt_template must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// The three step configurations of one workflow mode
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkflowStepsConfig {
    pub initial_translation: StepConfig,
    pub editor_review: StepConfig,
    pub translator_revision: StepConfig,
}

impl WorkflowStepsConfig {
    /// Configuration for one step
    pub fn get(&self, step: StepName) -> &StepConfig {
        match step {
            StepName::InitialTranslation => &self.initial_translation,
            StepName::EditorReview => &self.editor_review,
            StepName::TranslatorRevision => &self.translator_revision,
        }
    }

    /// Validate all three step configurations
    pub fn validate(&self) -> Result<(), ConfigError> {
        StepName::ALL
            .iter()
            .try_for_each(|step| self.get(*step).validate(*step))
    }
}

/// Workflow runtime settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkflowConfig {
    /// Mode used when none is given on the command line
    #[serde(default)]
    pub default_mode: WorkflowMode,

    /// Step configurations per mode
    #[serde(default = "default_modes")]
    pub modes: BTreeMap<WorkflowMode, WorkflowStepsConfig>,

    /// First retry delay in milliseconds, doubled on each retry
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Concurrent workflows in batch mode
    #[serde(default = "default_max_concurrent_workflows")]
    pub max_concurrent_workflows: usize,

    /// Whole-workflow timeout in seconds (0 disables it)
    #[serde(default = "default_workflow_timeout_secs")]
    pub workflow_timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_mode: WorkflowMode::default(),
            modes: default_modes(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_concurrent_workflows: default_max_concurrent_workflows(),
            workflow_timeout_secs: default_workflow_timeout_secs(),
        }
    }
}

impl WorkflowConfig {
    /// Step configurations for a mode
    pub fn steps_for(&self, mode: WorkflowMode) -> Result<&WorkflowStepsConfig, ConfigError> {
        self.modes
            .get(&mode)
            .ok_or_else(|| ConfigError::MissingMode(mode.to_string()))
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    300
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_step_timeout_secs() -> u64 {
    180
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000 // 1 second, doubled on each retry
}

fn default_max_concurrent_workflows() -> usize {
    4
}

fn default_workflow_timeout_secs() -> u64 {
    600
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("prompts")
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("tongyi", ProviderKind::OpenAI)
            .with_endpoint("https://dashscope.aliyuncs.com/compatible-mode/v1")
            .with_api_key_env("TONGYI_API_KEY")
            .with_model("qwen-plus", ModelPricing::new(0.0008, 0.002))
            .with_model("qwen-max", ModelPricing::new(0.0024, 0.0096)),
        ProviderConfig::new("deepseek", ProviderKind::OpenAI)
            .with_endpoint("https://api.deepseek.com/v1")
            .with_api_key_env("DEEPSEEK_API_KEY")
            .with_model("deepseek-chat", ModelPricing::new(0.00027, 0.0011))
            .with_model("deepseek-reasoner", ModelPricing::new(0.00055, 0.00219)),
    ]
}

fn step(
    step: StepName,
    provider: &str,
    model: &str,
    template_kind: &str,
    temperature: f32,
) -> StepConfig {
    let required: &[&str] = match step {
        StepName::InitialTranslation => &["initial_translation", "initial_translation_notes"],
        StepName::EditorReview => &["editor_suggestions"],
        StepName::TranslatorRevision => &["revised_translation", "revised_translation_notes"],
    };

    StepConfig::new(provider, model, format!("{}_{}", step.as_str(), template_kind))
        .with_temperature(temperature)
        .with_required_fields(required)
}

fn default_modes() -> BTreeMap<WorkflowMode, WorkflowStepsConfig> {
    let mut modes = BTreeMap::new();

    modes.insert(
        WorkflowMode::Reasoning,
        WorkflowStepsConfig {
            initial_translation: step(StepName::InitialTranslation, "deepseek", "deepseek-reasoner", "reasoning", 0.2),
            editor_review: step(StepName::EditorReview, "deepseek", "deepseek-reasoner", "reasoning", 0.1),
            translator_revision: step(StepName::TranslatorRevision, "deepseek", "deepseek-reasoner", "reasoning", 0.15),
        },
    );

    modes.insert(
        WorkflowMode::NonReasoning,
        WorkflowStepsConfig {
            initial_translation: step(StepName::InitialTranslation, "tongyi", "qwen-plus", "nonreasoning", 0.7),
            editor_review: step(StepName::EditorReview, "deepseek", "deepseek-chat", "nonreasoning", 0.3),
            translator_revision: step(StepName::TranslatorRevision, "tongyi", "qwen-plus", "nonreasoning", 0.5),
        },
    );

    modes.insert(
        WorkflowMode::Hybrid,
        WorkflowStepsConfig {
            initial_translation: step(StepName::InitialTranslation, "tongyi", "qwen-max", "nonreasoning", 0.7),
            editor_review: step(StepName::EditorReview, "deepseek", "deepseek-reasoner", "reasoning", 0.1),
            translator_revision: step(StepName::TranslatorRevision, "tongyi", "qwen-max", "nonreasoning", 0.5),
        },
    );

    modes
}

impl Config {
    /// Read a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Read a configuration file, writing the default one first if it is missing
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Find a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(anyhow!("Provider names must not be empty"));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(anyhow!("Provider '{}' is configured twice", provider.name));
            }
        }

        self.workflow
            .steps_for(self.workflow.default_mode)
            .context("Default workflow mode is not configured")?;

        for (mode, steps) in &self.workflow.modes {
            steps
                .validate()
                .with_context(|| format!("Invalid step configuration in mode '{}'", mode))?;

            for step in StepName::ALL {
                let provider = &steps.get(step).provider;
                if self.provider(provider).is_none() {
                    return Err(ConfigError::UnknownProvider {
                        step,
                        provider: provider.clone(),
                    })
                    .with_context(|| format!("Invalid provider reference in mode '{}'", mode));
                }
            }
        }

        if self.workflow.max_concurrent_workflows == 0 {
            return Err(anyhow!("max_concurrent_workflows must be at least 1"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            providers: default_providers(),
            workflow: WorkflowConfig::default(),
            templates_dir: default_templates_dir(),
            database_path: None,
            log_level: LogLevel::default(),
        }
    }
}
