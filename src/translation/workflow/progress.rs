/*!
 * Workflow progress reporting.
 *
 * The orchestrator emits a `WorkflowEvent` at every state change. Observers
 * receive events synchronously, in order, from the task running the
 * workflow, so `on_event` must return quickly.
 */

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;

use crate::translation::models::StepName;

/// Number of steps in a workflow run
pub const TOTAL_STEPS: usize = 3;

/// State change of a running workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Started {
        workflow_id: String,
    },
    StepStarted {
        workflow_id: String,
        step: StepName,
        /// 1-based step position
        index: usize,
    },
    StepCompleted {
        workflow_id: String,
        step: StepName,
        index: usize,
        tokens: u64,
        cost: f64,
        duration_secs: f64,
    },
    StepFailed {
        workflow_id: String,
        step: StepName,
        index: usize,
        /// Short description of the failure
        error: String,
    },
    Completed {
        workflow_id: String,
        total_tokens: u64,
        total_cost: f64,
        total_duration_secs: f64,
    },
    Cancelled {
        workflow_id: String,
        /// Step that would have run next
        step: StepName,
    },
    TimedOut {
        workflow_id: String,
        /// Step in flight when the limit expired
        step: Option<StepName>,
        limit_secs: f64,
    },
}

impl WorkflowEvent {
    pub fn workflow_id(&self) -> &str {
        match self {
            Self::Started { workflow_id }
            | Self::StepStarted { workflow_id, .. }
            | Self::StepCompleted { workflow_id, .. }
            | Self::StepFailed { workflow_id, .. }
            | Self::Completed { workflow_id, .. }
            | Self::Cancelled { workflow_id, .. }
            | Self::TimedOut { workflow_id, .. } => workflow_id,
        }
    }

    /// Step the event refers to, if any
    pub fn step(&self) -> Option<StepName> {
        match self {
            Self::StepStarted { step, .. }
            | Self::StepCompleted { step, .. }
            | Self::StepFailed { step, .. }
            | Self::Cancelled { step, .. } => Some(*step),
            Self::TimedOut { step, .. } => *step,
            Self::Started { .. } | Self::Completed { .. } => None,
        }
    }

    /// Whether no further events follow for this workflow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. }
                | Self::StepFailed { .. }
                | Self::Cancelled { .. }
                | Self::TimedOut { .. }
        )
    }
}

/// Receives workflow events
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent);
}

/// Observer that keeps every event, for tests and diagnostics
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&self, event: &WorkflowEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Progress bar on the terminal, one bar per workflow
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    /// Standalone bar
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(TOTAL_STEPS as u64))
    }

    /// Bar attached to a multi-bar display, for concurrent workflows
    pub fn attached(multi: &MultiProgress) -> Self {
        Self::with_bar(multi.add(ProgressBar::new(TOTAL_STEPS as u64)))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} steps {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:30}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("█▓▒░"));
        Self { bar }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Started { .. } => self.bar.set_message("starting"),
            WorkflowEvent::StepStarted { step, .. } => self.bar.set_message(step.label()),
            WorkflowEvent::StepCompleted { index, .. } => self.bar.set_position(*index as u64),
            WorkflowEvent::StepFailed { step, .. } => {
                self.bar.abandon_with_message(format!("{} failed", step.label()));
            }
            WorkflowEvent::Completed { total_tokens, total_cost, .. } => {
                self.bar.finish_with_message(format!(
                    "done: {} tokens, ${:.6}",
                    total_tokens, total_cost
                ));
            }
            WorkflowEvent::Cancelled { .. } => self.bar.abandon_with_message("cancelled"),
            WorkflowEvent::TimedOut { limit_secs, .. } => {
                self.bar.abandon_with_message(format!("timed out after {:.1}s", limit_secs));
            }
        }
    }
}
