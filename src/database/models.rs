/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::translation::models::{StepMetrics, StepName, TranslationOutput, WorkflowMode};

/// Summary row of a stored workflow output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Record id, distinct from the workflow id
    pub id: String,
    pub workflow_id: String,
    /// Stored poem the translation belongs to, if any
    pub poem_id: Option<String>,
    /// SHA-256 of the original poem text
    pub poem_hash: String,
    pub source_lang: String,
    pub target_lang: String,
    pub mode: WorkflowMode,
    pub final_translation: String,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub total_duration_secs: f64,
    /// RFC 3339 timestamp
    pub created_at: String,
}

impl TranslationRecord {
    /// Build the row for a finished workflow
    pub fn from_output(
        id: String,
        output: &TranslationOutput,
        poem_hash: String,
        mode: WorkflowMode,
    ) -> Self {
        Self {
            id,
            workflow_id: output.workflow_id.clone(),
            poem_id: output.input.poem_id().map(str::to_string),
            poem_hash,
            source_lang: output.input.source_lang().to_string(),
            target_lang: output.input.target_lang().to_string(),
            mode,
            final_translation: output.final_translation().to_string(),
            total_tokens: output.total_tokens as i64,
            total_cost: output.total_cost,
            total_duration_secs: output.total_duration_secs,
            created_at: output.created_at.to_rfc3339(),
        }
    }
}

impl fmt::Display for TranslationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} -> {} ({} tokens, ${:.6}, {})",
            self.id,
            self.mode,
            self.source_lang,
            self.target_lang,
            self.total_tokens,
            self.total_cost,
            self.created_at
        )
    }
}

/// Metrics of one step of a stored workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_name: StepName,
    pub provider: String,
    pub model: String,
    pub tokens_used: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub duration_secs: f64,
    pub cost: f64,
}

impl StepRecord {
    pub fn new(step_name: StepName, metrics: &StepMetrics) -> Self {
        Self {
            step_name,
            provider: metrics.model_info.provider.clone(),
            model: metrics.model_info.model.clone(),
            tokens_used: metrics.tokens_used as i64,
            prompt_tokens: metrics.prompt_tokens as i64,
            completion_tokens: metrics.completion_tokens as i64,
            duration_secs: metrics.duration_secs,
            cost: metrics.cost,
        }
    }

    /// One record per step, in execution order
    pub fn from_output(output: &TranslationOutput) -> Vec<Self> {
        vec![
            Self::new(StepName::InitialTranslation, &output.initial_translation.metrics),
            Self::new(StepName::EditorReview, &output.editor_review.metrics),
            Self::new(StepName::TranslatorRevision, &output.revised_translation.metrics),
        ]
    }
}
