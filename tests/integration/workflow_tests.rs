/*!
 * Integration tests for the three-step workflow orchestrator.
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use verseflow::errors::{StepError, WorkflowError};
use verseflow::providers::mock::{DEFAULT_MOCK_RESPONSE, MockProvider};
use verseflow::telemetry::Telemetry;
use verseflow::translation::services::{Briefing, BriefingLookup};
use verseflow::translation::workflow::{RecordingObserver, WorkflowEvent};
use verseflow::translation::{
    ModelPricing, StaticPricing, StepName, TranslationInput, WorkflowMode, WorkflowOrchestrator,
    WorkflowState,
};
use verseflow::Language;

use crate::common;

struct FixedBriefing(&'static str);

#[async_trait]
impl BriefingLookup for FixedBriefing {
    async fn get_briefing(&self, poem_id: &str) -> Result<Option<Briefing>> {
        Ok(Some(Briefing {
            poem_id: poem_id.to_string(),
            content: self.0.to_string(),
        }))
    }
}

struct BrokenBriefing;

#[async_trait]
impl BriefingLookup for BrokenBriefing {
    async fn get_briefing(&self, _poem_id: &str) -> Result<Option<Briefing>> {
        Err(anyhow!("briefing store unavailable"))
    }
}

fn input_for_poem(poem_id: &str) -> TranslationInput {
    let metadata = BTreeMap::from([
        ("poem_id".to_string(), poem_id.to_string()),
        ("poet_name".to_string(), "Carl Sandburg".to_string()),
        ("poem_title".to_string(), "Fog".to_string()),
    ]);
    TranslationInput::with_metadata(
        "The fog comes\non little cat feet.",
        Language::English,
        Language::Chinese,
        metadata,
    )
    .unwrap()
}

#[tokio::test]
async fn test_execute_withWorkingProvider_shouldProduceCompleteOutput() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let orchestrator = common::orchestrator(provider.clone(), templates.path());

    let output = orchestrator.execute(&common::sample_input()).await.unwrap();

    assert_eq!(output.initial_translation.initial_translation, "译文");
    assert_eq!(output.editor_review.editor_suggestions, "1. Fine.");
    assert_eq!(output.editor_review.suggestions, vec!["Fine.".to_string()]);
    assert_eq!(output.final_translation(), "修订译文");
    assert_eq!(output.revised_translation.revised_translation_notes, "Revised.");
    assert_eq!(output.workflow_mode, WorkflowMode::Hybrid);
    assert!(!output.briefing_used);
    assert_eq!(output.input, common::sample_input());
    assert_eq!(orchestrator.state(), WorkflowState::Complete);
    assert_eq!(provider.call_count(), 3);

    let initial_at = output.initial_translation.metrics.timestamp;
    let review_at = output.editor_review.metrics.timestamp;
    let revision_at = output.revised_translation.metrics.timestamp;
    assert!(initial_at <= review_at);
    assert!(review_at <= revision_at);
    assert!(revision_at <= output.created_at);
}

#[tokio::test]
async fn test_execute_shouldSumStepTotalsAndPriceEachStep() {
    let templates = common::template_dir();
    let orchestrator = common::orchestrator(MockProvider::working(), templates.path());

    let output = orchestrator.execute(&common::sample_input()).await.unwrap();

    let metrics = [
        &output.initial_translation.metrics,
        &output.editor_review.metrics,
        &output.revised_translation.metrics,
    ];
    let tokens: u64 = metrics.iter().map(|m| m.tokens_used).sum();
    let cost: f64 = metrics.iter().map(|m| m.cost).sum();

    assert_eq!(output.total_tokens, tokens);
    assert!((output.total_cost - cost).abs() < 1e-12);

    let pricing = ModelPricing::new(0.001, 0.002);
    for m in metrics {
        assert_eq!(m.tokens_used, m.prompt_tokens + m.completion_tokens);
        assert!((m.cost - pricing.cost(m.prompt_tokens, m.completion_tokens)).abs() < 1e-12);
        assert!(m.duration_secs <= output.total_duration_secs);
    }
    assert!(output.total_cost > 0.0);
}

#[tokio::test]
async fn test_execute_withUnknownModelPricing_shouldRecordZeroCost() {
    let templates = common::template_dir();
    let orchestrator = WorkflowOrchestrator::new(
        Arc::new(common::executor(MockProvider::working(), templates.path())),
        common::workflow_steps(),
        WorkflowMode::NonReasoning,
        Arc::new(StaticPricing::new()),
        Arc::new(Telemetry::disabled()),
    )
    .unwrap();

    let output = orchestrator.execute(&common::sample_input()).await.unwrap();

    assert_eq!(output.total_cost, 0.0);
    assert!(output.total_tokens > 0);
}

#[tokio::test]
async fn test_execute_shouldThreadEarlierOutputsIntoLaterPrompts() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let orchestrator = common::orchestrator(provider.clone(), templates.path());

    orchestrator.execute(&common::sample_input()).await.unwrap();

    let requests = provider.all_messages();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1][0].content, "You edit Chinese poetry.");
    assert!(requests[1][1].content.contains("译文"));
    assert!(requests[1][1].content.contains("Notes."));
    assert!(requests[2][1].content.contains("1. Fine."));
}

#[tokio::test]
async fn test_execute_shouldEmitEventsInOrder() {
    let templates = common::template_dir();
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = common::orchestrator(MockProvider::working(), templates.path())
        .with_observer(observer.clone());

    let output = orchestrator.execute(&common::sample_input()).await.unwrap();

    let events = observer.events();
    assert_eq!(events.len(), 8);
    assert!(matches!(events[0], WorkflowEvent::Started { .. }));
    let step_events: Vec<(StepName, bool)> = events[1..7]
        .iter()
        .map(|e| (e.step().unwrap(), matches!(e, WorkflowEvent::StepCompleted { .. })))
        .collect();
    assert_eq!(
        step_events,
        vec![
            (StepName::InitialTranslation, false),
            (StepName::InitialTranslation, true),
            (StepName::EditorReview, false),
            (StepName::EditorReview, true),
            (StepName::TranslatorRevision, false),
            (StepName::TranslatorRevision, true),
        ]
    );
    match &events[7] {
        WorkflowEvent::Completed { total_tokens, .. } => assert_eq!(*total_tokens, output.total_tokens),
        other => panic!("unexpected final event: {:?}", other),
    }
    assert!(events.iter().all(|e| e.workflow_id() == output.workflow_id));
}

#[tokio::test]
async fn test_execute_withEditorFailure_shouldStopAtReview() {
    let templates = common::template_dir();
    let provider = MockProvider::failing().then_respond(DEFAULT_MOCK_RESPONSE);
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = common::orchestrator(provider.clone(), templates.path())
        .with_observer(observer.clone());

    let err = orchestrator.execute(&common::sample_input()).await.unwrap_err();

    match &err {
        WorkflowError::StepFailed { step, source, .. } => {
            assert_eq!(*step, StepName::EditorReview);
            assert!(matches!(source, StepError::LlmCall { attempts: 3, .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.failed_step(), Some(StepName::EditorReview));
    assert_eq!(orchestrator.state(), WorkflowState::Failed);
    // one initial call plus three review attempts; revision never runs
    assert_eq!(provider.call_count(), 4);

    let last = observer.events().pop().unwrap();
    assert!(matches!(
        last,
        WorkflowEvent::StepFailed { step: StepName::EditorReview, index: 2, .. }
    ));
}

#[tokio::test]
async fn test_execute_afterCancel_shouldNotCallProvider() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let telemetry = Arc::new(Telemetry::disabled());
    let orchestrator = WorkflowOrchestrator::new(
        Arc::new(common::executor(provider.clone(), templates.path())),
        common::workflow_steps(),
        WorkflowMode::Hybrid,
        Arc::new(StaticPricing::new()),
        telemetry.clone(),
    )
    .unwrap();

    orchestrator.cancel();
    assert!(orchestrator.is_cancelled());

    let err = orchestrator.execute(&common::sample_input()).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Cancelled { step: StepName::InitialTranslation, .. }
    ));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(telemetry.snapshot().workflows_cancelled, 1);
    assert_eq!(orchestrator.state(), WorkflowState::Failed);
}

#[tokio::test]
async fn test_cancel_duringFirstStep_shouldStopBeforeReview() {
    let templates = common::template_dir();
    let provider = MockProvider::slow(300);
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = common::orchestrator(provider.clone(), templates.path())
        .with_observer(observer.clone());
    let input = common::sample_input();

    let (result, _) = tokio::join!(orchestrator.execute(&input), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.cancel();
    });

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Cancelled { step: StepName::EditorReview, .. }
    ));
    assert_eq!(provider.call_count(), 1);
    assert_eq!(orchestrator.state(), WorkflowState::Failed);
    assert!(orchestrator.state().is_terminal());

    let events = observer.events();
    assert!(events.iter().any(|e| matches!(
        e,
        WorkflowEvent::StepCompleted { step: StepName::InitialTranslation, .. }
    )));
    assert!(matches!(
        events.last(),
        Some(WorkflowEvent::Cancelled { step: StepName::EditorReview, .. })
    ));
}

#[tokio::test]
async fn test_executeWithTimeout_withSlowProvider_shouldTimeOut() {
    let templates = common::template_dir();
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = common::orchestrator(MockProvider::slow(2_000), templates.path())
        .with_observer(observer.clone());

    let err = orchestrator
        .execute_with_timeout(&common::sample_input(), Duration::from_millis(100))
        .await
        .unwrap_err();

    match &err {
        WorkflowError::Timeout { limit, .. } => assert_eq!(*limit, Duration::from_millis(100)),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("100ms"));
    assert_eq!(orchestrator.state(), WorkflowState::Failed);

    match observer.events().last() {
        Some(WorkflowEvent::TimedOut { step, limit_secs, .. }) => {
            assert_eq!(*step, Some(StepName::InitialTranslation));
            assert!((limit_secs - 0.1).abs() < 1e-9);
        }
        other => panic!("unexpected final event: {:?}", other),
    }
}

#[tokio::test]
async fn test_executeWithTimeout_withFastProvider_shouldComplete() {
    let templates = common::template_dir();
    let orchestrator = common::orchestrator(MockProvider::working(), templates.path());

    let output = orchestrator
        .execute_with_timeout(&common::sample_input(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(output.final_translation(), "修订译文");
}

#[tokio::test]
async fn test_execute_withBriefing_shouldPassItToPrompt() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let orchestrator = common::orchestrator(provider.clone(), templates.path())
        .with_briefings(Arc::new(FixedBriefing("Written in 1916 in Chicago.")));

    let output = orchestrator.execute(&input_for_poem("fog")).await.unwrap();

    assert!(output.briefing_used);
    let first = &provider.all_messages()[0];
    assert!(first[1].content.contains("Briefing: Written in 1916 in Chicago."));
    assert!(first[1].content.contains("Title: Fog"));
}

#[tokio::test]
async fn test_execute_withoutPoemId_shouldSkipBriefingLookup() {
    let templates = common::template_dir();
    let provider = MockProvider::working();
    let orchestrator = common::orchestrator(provider.clone(), templates.path())
        .with_briefings(Arc::new(FixedBriefing("never used")));

    let output = orchestrator.execute(&common::sample_input()).await.unwrap();

    assert!(!output.briefing_used);
    assert!(provider.all_messages()[0][1].content.contains("Briefing: (none available)"));
}

#[tokio::test]
async fn test_execute_withFailingBriefingLookup_shouldContinue() {
    let templates = common::template_dir();
    let orchestrator = common::orchestrator(MockProvider::working(), templates.path())
        .with_briefings(Arc::new(BrokenBriefing));

    let output = orchestrator.execute(&input_for_poem("fog")).await.unwrap();

    assert!(!output.briefing_used);
    assert_eq!(orchestrator.state(), WorkflowState::Complete);
}

#[tokio::test]
async fn test_execute_repeatedly_shouldAssignUniqueWorkflowIds() {
    let templates = common::template_dir();
    let orchestrator = common::orchestrator(MockProvider::working(), templates.path());

    let mut ids = HashSet::new();
    for _ in 0..3 {
        let output = orchestrator.execute(&common::sample_input()).await.unwrap();
        ids.insert(output.workflow_id);
    }

    assert_eq!(ids.len(), 3);
}
