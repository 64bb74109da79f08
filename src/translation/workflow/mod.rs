/*!
 * Workflow orchestration and progress reporting.
 *
 * - `orchestrator`: the three-step state machine
 * - `progress`: events emitted while a workflow runs, and their observers
 */

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{WorkflowOrchestrator, WorkflowState};
pub use progress::{ConsoleProgress, ProgressObserver, RecordingObserver, WorkflowEvent};
