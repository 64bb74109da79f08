/*!
 * Three-step workflow orchestration.
 *
 * ```text
 * Pending -> InitialTranslation -> EditorReview -> TranslatorRevision -> Complete
 *                    \                  \                  \
 *                     +------------------+------------------+--> Failed
 * ```
 *
 * Steps run strictly in order; each step's parsed output feeds the next
 * step's prompt variables. Cancellation is checked at step boundaries, so a
 * step already talking to a provider finishes (or times out) first. A step
 * failure, a cancellation and a timeout all end in `Failed`.
 */

use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::app_config::WorkflowStepsConfig;
use crate::errors::{ParseError, StepError, WorkflowError};
use crate::telemetry::Telemetry;
use crate::translation::executor::{StepExecutor, StepInput};
use crate::translation::models::{
    EditorReview, InitialTranslation, RevisedTranslation, StepName, StepResult,
    TranslationInput, TranslationOutput, WorkflowMode,
};
use crate::translation::pricing::PricingRegistry;
use crate::translation::services::BriefingLookup;
use crate::translation::workflow::progress::{ProgressObserver, WorkflowEvent};

/// Prompt value used when the poet is unknown
pub const UNKNOWN_POET: &str = "Unknown";
/// Prompt value used when the poem has no title
pub const UNTITLED_POEM: &str = "Untitled";
/// Prompt value used when no briefing is available
pub const NO_BRIEFING: &str = "(none available)";

/// Lifecycle of one workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    InitialTranslation,
    EditorReview,
    TranslatorRevision,
    Complete,
    Failed,
}

impl WorkflowState {
    /// State while `step` is running
    pub fn running(step: StepName) -> Self {
        match step {
            StepName::InitialTranslation => Self::InitialTranslation,
            StepName::EditorReview => Self::EditorReview,
            StepName::TranslatorRevision => Self::TranslatorRevision,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Step running in this state, if any
    pub fn step(&self) -> Option<StepName> {
        match self {
            Self::InitialTranslation => Some(StepName::InitialTranslation),
            Self::EditorReview => Some(StepName::EditorReview),
            Self::TranslatorRevision => Some(StepName::TranslatorRevision),
            Self::Pending | Self::Complete | Self::Failed => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InitialTranslation => "initial_translation",
            Self::EditorReview => "editor_review",
            Self::TranslatorRevision => "translator_revision",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Runs the three translation steps for one input at a time
pub struct WorkflowOrchestrator {
    executor: Arc<StepExecutor>,
    steps: WorkflowStepsConfig,
    mode: WorkflowMode,
    pricing: Arc<dyn PricingRegistry>,
    briefings: Option<Arc<dyn BriefingLookup>>,
    observer: Option<Arc<dyn ProgressObserver>>,
    telemetry: Arc<Telemetry>,
    state: Mutex<WorkflowState>,
    cancelled: AtomicBool,
}

impl WorkflowOrchestrator {
    /// Create an orchestrator; all three step configurations are validated
    pub fn new(
        executor: Arc<StepExecutor>,
        steps: WorkflowStepsConfig,
        mode: WorkflowMode,
        pricing: Arc<dyn PricingRegistry>,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self, WorkflowError> {
        steps.validate()?;

        Ok(Self {
            executor,
            steps,
            mode,
            pricing,
            briefings: None,
            observer: None,
            telemetry,
            state: Mutex::new(WorkflowState::Pending),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Look up background briefings by `poem_id` before the first step
    pub fn with_briefings(mut self, briefings: Arc<dyn BriefingLookup>) -> Self {
        self.briefings = Some(briefings);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn state(&self) -> WorkflowState {
        *self.state.lock()
    }

    /// Request cancellation; takes effect before the next step starts
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run all three steps for `input`
    pub async fn execute(&self, input: &TranslationInput) -> Result<TranslationOutput, WorkflowError> {
        let workflow_id = Uuid::new_v4().to_string();
        self.run(workflow_id, input).await
    }

    /// Run all three steps, giving up after `limit`
    pub async fn execute_with_timeout(
        &self,
        input: &TranslationInput,
        limit: Duration,
    ) -> Result<TranslationOutput, WorkflowError> {
        let workflow_id = Uuid::new_v4().to_string();

        match tokio::time::timeout(limit, self.run(workflow_id.clone(), input)).await {
            Ok(result) => result,
            Err(_) => {
                let step = self.state().step();
                error!("Workflow {} timed out after {:?}", workflow_id, limit);
                self.set_state(WorkflowState::Failed);
                self.telemetry.workflow_failed();
                self.notify(WorkflowEvent::TimedOut {
                    workflow_id: workflow_id.clone(),
                    step,
                    limit_secs: limit.as_secs_f64(),
                });
                Err(WorkflowError::Timeout { workflow_id, limit })
            }
        }
    }

    async fn run(
        &self,
        workflow_id: String,
        input: &TranslationInput,
    ) -> Result<TranslationOutput, WorkflowError> {
        let started = Instant::now();
        self.set_state(WorkflowState::Pending);
        self.telemetry.workflow_started();
        self.notify(WorkflowEvent::Started {
            workflow_id: workflow_id.clone(),
        });

        info!(
            "Workflow {} ({}): {} -> {}, {} chars",
            workflow_id,
            self.mode,
            input.source_lang(),
            input.target_lang(),
            input.original_poem().chars().count()
        );

        let briefing = self.fetch_briefing(input).await;
        let briefing_used = briefing.is_some();

        let mut variables = base_variables(input, briefing.as_deref());

        let initial = self
            .run_step(&workflow_id, StepName::InitialTranslation, &variables, |r| {
                InitialTranslation::from_step_result(r)
            })
            .await?;

        variables.insert(
            "initial_translation".to_string(),
            Value::String(initial.initial_translation.clone()),
        );
        variables.insert(
            "initial_translation_notes".to_string(),
            Value::String(initial.initial_translation_notes.clone()),
        );

        let review = self
            .run_step(&workflow_id, StepName::EditorReview, &variables, |r| {
                EditorReview::from_step_result(r)
            })
            .await?;

        variables.insert(
            "editor_suggestions".to_string(),
            Value::String(review.editor_suggestions.clone()),
        );

        let revised = self
            .run_step(&workflow_id, StepName::TranslatorRevision, &variables, |r| {
                RevisedTranslation::from_step_result(r)
            })
            .await?;

        let total_tokens = initial.metrics.tokens_used
            + review.metrics.tokens_used
            + revised.metrics.tokens_used;
        let total_cost = initial.metrics.cost + review.metrics.cost + revised.metrics.cost;
        let total_duration_secs = started.elapsed().as_secs_f64();

        let output = TranslationOutput {
            workflow_id: workflow_id.clone(),
            input: input.clone(),
            initial_translation: initial,
            editor_review: review,
            revised_translation: revised,
            total_tokens,
            total_duration_secs,
            total_cost,
            workflow_mode: self.mode,
            briefing_used,
            created_at: Utc::now(),
        };

        self.set_state(WorkflowState::Complete);
        self.telemetry.workflow_completed(total_tokens, total_cost);
        self.notify(WorkflowEvent::Completed {
            workflow_id,
            total_tokens,
            total_cost,
            total_duration_secs,
        });
        info!("{}", output.summary());

        Ok(output)
    }

    /// Run one step and convert its result into the typed view
    async fn run_step<T, F>(
        &self,
        workflow_id: &str,
        step: StepName,
        variables: &StepInput,
        convert: F,
    ) -> Result<T, WorkflowError>
    where
        F: FnOnce(&StepResult) -> Result<T, ParseError>,
    {
        if self.is_cancelled() {
            warn!("Workflow {} cancelled before step '{}'", workflow_id, step);
            self.set_state(WorkflowState::Failed);
            self.telemetry.workflow_cancelled();
            self.notify(WorkflowEvent::Cancelled {
                workflow_id: workflow_id.to_string(),
                step,
            });
            return Err(WorkflowError::Cancelled {
                workflow_id: workflow_id.to_string(),
                step,
            });
        }

        self.set_state(WorkflowState::running(step));
        self.notify(WorkflowEvent::StepStarted {
            workflow_id: workflow_id.to_string(),
            step,
            index: step.index(),
        });
        info!("Step {}/3: {}", step.index(), step.label());

        let config = self.steps.get(step);
        let outcome = self
            .executor
            .execute_step(step.as_str(), variables, config)
            .await
            .and_then(|mut result| {
                result.metadata.cost = self.pricing.cost_for(
                    &config.provider,
                    &config.model,
                    &result.metadata.usage,
                );
                let view = convert(&result)
                    .map_err(|source| StepError::OutputParsing { step, source })?;
                Ok((result, view))
            });

        match outcome {
            Ok((result, view)) => {
                debug!(
                    "Step '{}' cost ${:.6} for {} tokens",
                    step, result.metadata.cost, result.metadata.usage.total_tokens
                );
                self.notify(WorkflowEvent::StepCompleted {
                    workflow_id: workflow_id.to_string(),
                    step,
                    index: step.index(),
                    tokens: result.metadata.usage.total_tokens,
                    cost: result.metadata.cost,
                    duration_secs: result.metadata.execution_time_secs,
                });
                Ok(view)
            }
            Err(source) => {
                error!("Workflow {} failed at step '{}': {}", workflow_id, step, source);
                self.set_state(WorkflowState::Failed);
                self.telemetry.workflow_failed();
                self.notify(WorkflowEvent::StepFailed {
                    workflow_id: workflow_id.to_string(),
                    step,
                    index: step.index(),
                    error: source.to_string(),
                });
                Err(WorkflowError::StepFailed {
                    workflow_id: workflow_id.to_string(),
                    step,
                    source,
                })
            }
        }
    }

    async fn fetch_briefing(&self, input: &TranslationInput) -> Option<String> {
        let briefings = self.briefings.as_ref()?;
        let poem_id = input.poem_id()?;

        match briefings.get_briefing(poem_id).await {
            Ok(Some(briefing)) if !briefing.content.trim().is_empty() => {
                debug!("Using briefing for poem {} ({} chars)", poem_id, briefing.content.len());
                Some(briefing.content)
            }
            Ok(_) => {
                debug!("No briefing stored for poem {}", poem_id);
                None
            }
            Err(e) => {
                warn!("Briefing lookup for poem {} failed, continuing without it: {:#}", poem_id, e);
                None
            }
        }
    }

    fn set_state(&self, state: WorkflowState) {
        *self.state.lock() = state;
    }

    fn notify(&self, event: WorkflowEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

/// Prompt variables shared by all three steps
fn base_variables(input: &TranslationInput, briefing: Option<&str>) -> StepInput {
    let mut variables = StepInput::new();

    // Free-form metadata first so the named variables below win
    for (key, value) in input.metadata() {
        variables.insert(key.clone(), Value::String(value.clone()));
    }

    variables.insert(
        "original_poem".to_string(),
        Value::String(input.original_poem().to_string()),
    );
    variables.insert(
        "source_lang".to_string(),
        Value::String(input.source_lang().display_name().to_string()),
    );
    variables.insert(
        "target_lang".to_string(),
        Value::String(input.target_lang().display_name().to_string()),
    );
    variables.insert(
        "poet_name".to_string(),
        Value::String(input.poet_name().unwrap_or(UNKNOWN_POET).to_string()),
    );
    variables.insert(
        "poem_title".to_string(),
        Value::String(input.poem_title().unwrap_or(UNTITLED_POEM).to_string()),
    );
    variables.insert(
        "background_briefing".to_string(),
        Value::String(briefing.unwrap_or(NO_BRIEFING).to_string()),
    );

    variables
}
