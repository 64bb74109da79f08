/*!
 * Data model for the three-step poetry translation workflow.
 *
 * A workflow run takes one immutable `TranslationInput`, produces one
 * `StepResult` per step, wraps each in a typed view (`InitialTranslation`,
 * `EditorReview`, `RevisedTranslation`) and finally aggregates everything into
 * a `TranslationOutput`.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::{InputError, ParseError};
use crate::language_utils::Language;
use crate::translation::parser::OutputParser;

/// Maximum accepted poem length, in characters
pub const MAX_POEM_CHARS: usize = 50_000;

/// Metadata key holding the poem's stored identifier
pub const META_POEM_ID: &str = "poem_id";
/// Metadata key holding the poet's name
pub const META_POET_NAME: &str = "poet_name";
/// Metadata key holding the poem's title
pub const META_POEM_TITLE: &str = "poem_title";

/// The three steps of the workflow, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    InitialTranslation,
    EditorReview,
    TranslatorRevision,
}

impl StepName {
    /// All steps in execution order
    pub const ALL: [StepName; 3] = [
        StepName::InitialTranslation,
        StepName::EditorReview,
        StepName::TranslatorRevision,
    ];

    /// Identifier used in configuration, logs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialTranslation => "initial_translation",
            Self::EditorReview => "editor_review",
            Self::TranslatorRevision => "translator_revision",
        }
    }

    /// Human-readable label for progress displays
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitialTranslation => "Initial Translation",
            Self::EditorReview => "Editor Review",
            Self::TranslatorRevision => "Translator Revision",
        }
    }

    /// 1-based position in the workflow
    pub fn index(&self) -> usize {
        match self {
            Self::InitialTranslation => 1,
            Self::EditorReview => 2,
            Self::TranslatorRevision => 3,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown step '{}'. Known steps: {}",
                    s,
                    Self::ALL.iter().map(|st| st.as_str()).collect::<Vec<_>>().join(", ")
                )
            })
    }
}

/// Named provider/model profile selecting the configuration of each step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    Reasoning,
    NonReasoning,
    #[default]
    Hybrid,
}

impl WorkflowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::NonReasoning => "non_reasoning",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "reasoning" => Ok(Self::Reasoning),
            "non_reasoning" | "nonreasoning" => Ok(Self::NonReasoning),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("Invalid workflow mode: {}", other)),
        }
    }
}

/// Validated, immutable input to a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTranslationInput")]
pub struct TranslationInput {
    original_poem: String,
    source_lang: Language,
    target_lang: Language,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawTranslationInput {
    original_poem: String,
    source_lang: Language,
    target_lang: Language,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl TryFrom<RawTranslationInput> for TranslationInput {
    type Error = InputError;

    fn try_from(raw: RawTranslationInput) -> Result<Self, Self::Error> {
        Self::with_metadata(raw.original_poem, raw.source_lang, raw.target_lang, raw.metadata)
    }
}

impl TranslationInput {
    /// Create an input without metadata
    pub fn new(
        original_poem: impl Into<String>,
        source_lang: Language,
        target_lang: Language,
    ) -> Result<Self, InputError> {
        Self::with_metadata(original_poem, source_lang, target_lang, BTreeMap::new())
    }

    /// Create an input carrying metadata such as `poem_id` or `poet_name`
    pub fn with_metadata(
        original_poem: impl Into<String>,
        source_lang: Language,
        target_lang: Language,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self, InputError> {
        let original_poem = original_poem.into();

        if original_poem.trim().is_empty() {
            return Err(InputError::EmptyPoem);
        }

        let length = original_poem.chars().count();
        if length > MAX_POEM_CHARS {
            return Err(InputError::PoemTooLong {
                length,
                max: MAX_POEM_CHARS,
            });
        }

        if source_lang == target_lang {
            return Err(InputError::SameLanguage(source_lang));
        }

        Ok(Self {
            original_poem,
            source_lang,
            target_lang,
            metadata,
        })
    }

    pub fn original_poem(&self) -> &str {
        &self.original_poem
    }

    pub fn source_lang(&self) -> Language {
        self.source_lang
    }

    pub fn target_lang(&self) -> Language {
        self.target_lang
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn poem_id(&self) -> Option<&str> {
        self.metadata.get(META_POEM_ID).map(String::as_str)
    }

    pub fn poet_name(&self) -> Option<&str> {
        self.metadata.get(META_POET_NAME).map(String::as_str)
    }

    pub fn poem_title(&self) -> Option<&str> {
        self.metadata.get(META_POEM_TITLE).map(String::as_str)
    }
}

/// Outcome of a step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
}

/// Provider and sampling parameters a step ran with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Diagnostics attached to every step result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub timestamp: DateTime<Utc>,
    pub execution_time_secs: f64,
    pub model_info: ModelInfo,
    pub usage: TokenUsage,
    /// Filled in by the orchestrator once pricing is resolved
    pub cost: f64,
    /// First characters of the raw response
    pub raw_response_preview: String,
}

/// Result of executing one workflow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepName,
    pub status: StepStatus,
    pub output: BTreeMap<String, String>,
    pub metadata: ExecutionMetadata,
}

impl StepResult {
    /// Get a parsed field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.output.get(name).map(String::as_str)
    }

    fn required_field(&self, name: &str) -> Result<String, ParseError> {
        match self.field(name) {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            _ => Err(ParseError::Validation {
                missing: vec![name.to_string()],
            }),
        }
    }

    fn optional_field(&self, name: &str) -> Option<String> {
        self.field(name)
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    }
}

/// Bookkeeping shared by the typed step views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub tokens_used: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_secs: f64,
    pub cost: f64,
    pub model_info: ModelInfo,
    pub timestamp: DateTime<Utc>,
}

impl From<&StepResult> for StepMetrics {
    fn from(result: &StepResult) -> Self {
        let meta = &result.metadata;
        Self {
            tokens_used: meta.usage.total_tokens,
            prompt_tokens: meta.usage.prompt_tokens,
            completion_tokens: meta.usage.completion_tokens,
            duration_secs: meta.execution_time_secs,
            cost: meta.cost,
            model_info: meta.model_info.clone(),
            timestamp: meta.timestamp,
        }
    }
}

/// Output of the initial translation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialTranslation {
    pub initial_translation: String,
    pub initial_translation_notes: String,
    pub translated_poem_title: Option<String>,
    pub translated_poet_name: Option<String>,
    pub metrics: StepMetrics,
}

impl InitialTranslation {
    pub fn from_step_result(result: &StepResult) -> Result<Self, ParseError> {
        Ok(Self {
            initial_translation: result.required_field("initial_translation")?,
            initial_translation_notes: result
                .optional_field("initial_translation_notes")
                .unwrap_or_default(),
            translated_poem_title: result.optional_field("translated_poem_title"),
            translated_poet_name: result.optional_field("translated_poet_name"),
            metrics: StepMetrics::from(result),
        })
    }
}

/// Output of the editor review step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorReview {
    /// The editor's full suggestion text
    pub editor_suggestions: String,
    /// Suggestions split into numbered items
    pub suggestions: Vec<String>,
    pub overall_assessment: Option<String>,
    pub metrics: StepMetrics,
}

impl EditorReview {
    pub fn from_step_result(result: &StepResult) -> Result<Self, ParseError> {
        let editor_suggestions = result.required_field("editor_suggestions")?;
        let suggestions = OutputParser::parse_numbered_suggestions(&editor_suggestions);

        Ok(Self {
            editor_suggestions,
            suggestions,
            overall_assessment: result.optional_field("overall_assessment"),
            metrics: StepMetrics::from(result),
        })
    }
}

/// Output of the translator revision step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisedTranslation {
    pub revised_translation: String,
    pub revised_translation_notes: String,
    pub refined_translated_poem_title: Option<String>,
    pub refined_translated_poet_name: Option<String>,
    pub metrics: StepMetrics,
}

impl RevisedTranslation {
    pub fn from_step_result(result: &StepResult) -> Result<Self, ParseError> {
        Ok(Self {
            revised_translation: result.required_field("revised_translation")?,
            revised_translation_notes: result
                .optional_field("revised_translation_notes")
                .unwrap_or_default(),
            refined_translated_poem_title: result.optional_field("refined_translated_poem_title"),
            refined_translated_poet_name: result.optional_field("refined_translated_poet_name"),
            metrics: StepMetrics::from(result),
        })
    }
}

/// Terminal aggregate of a successful workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub workflow_id: String,
    pub input: TranslationInput,
    pub initial_translation: InitialTranslation,
    pub editor_review: EditorReview,
    pub revised_translation: RevisedTranslation,
    pub total_tokens: u64,
    pub total_duration_secs: f64,
    pub total_cost: f64,
    pub workflow_mode: WorkflowMode,
    pub briefing_used: bool,
    pub created_at: DateTime<Utc>,
}

impl TranslationOutput {
    /// The final translated text
    pub fn final_translation(&self) -> &str {
        &self.revised_translation.revised_translation
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "Workflow {} ({}): {} tokens | {:.2}s | ${:.6}",
            self.workflow_id,
            self.workflow_mode,
            self.total_tokens,
            self.total_duration_secs,
            self.total_cost
        )
    }
}
