/*!
 * Integration tests for persisting workflow results in SQLite.
 */

use std::collections::BTreeMap;
use tokio_test::{assert_err, assert_ok};

use verseflow::database::Repository;
use verseflow::providers::mock::MockProvider;
use verseflow::translation::services::{BriefingLookup, PoemLookup, PoemRecord, TranslationSink};
use verseflow::translation::{StepName, TranslationInput, TranslationOutput, WorkflowMode};
use verseflow::Language;

use crate::common;

async fn run_workflow(input: &TranslationInput) -> TranslationOutput {
    let templates = common::template_dir();
    let orchestrator = common::orchestrator(MockProvider::working(), templates.path());
    orchestrator.execute(input).await.unwrap()
}

fn fog_poem() -> PoemRecord {
    PoemRecord {
        id: "fog".to_string(),
        poet_name: "Carl Sandburg".to_string(),
        poem_title: "Fog".to_string(),
        source_lang: Language::English,
        original_text: "The fog comes\non little cat feet.".to_string(),
    }
}

fn fog_input() -> TranslationInput {
    TranslationInput::with_metadata(
        "The fog comes\non little cat feet.",
        Language::English,
        Language::Chinese,
        BTreeMap::from([("poem_id".to_string(), "fog".to_string())]),
    )
    .unwrap()
}

#[tokio::test]
async fn test_saveTranslation_twice_shouldReturnSameRecord() {
    let repo = Repository::new_in_memory().unwrap();
    let output = run_workflow(&common::sample_input()).await;

    let first = assert_ok!(repo.save_translation(&output, WorkflowMode::Hybrid).await);
    let second = assert_ok!(repo.save_translation(&output, WorkflowMode::Hybrid).await);

    assert_eq!(first, second);
    assert_eq!(repo.stats().unwrap().translation_count, 1);
    assert_eq!(repo.get_workflow_steps(&first).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_loadTranslation_shouldRestoreOutput() {
    let repo = Repository::new_in_memory().unwrap();
    let output = run_workflow(&common::sample_input()).await;

    let id = repo.save_translation(&output, WorkflowMode::Hybrid).await.unwrap();
    let loaded = repo.load_translation(&id).await.unwrap().unwrap();

    assert_eq!(loaded.workflow_id, output.workflow_id);
    assert_eq!(loaded.input, output.input);
    assert_eq!(loaded.final_translation(), output.final_translation());
    assert_eq!(loaded.editor_review.suggestions, output.editor_review.suggestions);
    assert_eq!(loaded.total_tokens, output.total_tokens);
    assert_eq!(loaded.workflow_mode, WorkflowMode::Hybrid);
}

#[tokio::test]
async fn test_loadTranslation_withUnknownId_shouldReturnNone() {
    let repo = Repository::new_in_memory().unwrap();

    assert!(repo.load_translation("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_getWorkflowSteps_shouldMatchStepMetrics() {
    let repo = Repository::new_in_memory().unwrap();
    let output = run_workflow(&common::sample_input()).await;

    let id = repo.save_translation(&output, WorkflowMode::Hybrid).await.unwrap();
    let steps = repo.get_workflow_steps(&id).await.unwrap();

    let names: Vec<StepName> = steps.iter().map(|s| s.step_name).collect();
    assert_eq!(
        names,
        vec![
            StepName::InitialTranslation,
            StepName::EditorReview,
            StepName::TranslatorRevision
        ]
    );
    assert_eq!(steps[0].provider, common::MOCK_PROVIDER);
    assert_eq!(steps[0].model, common::MOCK_MODEL);

    let total: i64 = steps.iter().map(|s| s.tokens_used).sum();
    assert_eq!(total as u64, output.total_tokens);
}

#[tokio::test]
async fn test_listTranslationsForPoem_shouldOnlyIncludeThatPoem() {
    let repo = Repository::new_in_memory().unwrap();
    repo.upsert_poem(&fog_poem()).await.unwrap();

    let with_poem = run_workflow(&fog_input()).await;
    let without_poem = run_workflow(&common::sample_input()).await;
    repo.save_translation(&with_poem, WorkflowMode::Hybrid).await.unwrap();
    repo.save_translation(&without_poem, WorkflowMode::Hybrid).await.unwrap();

    let records = repo.list_translations_for_poem("fog").await.unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.workflow_id, with_poem.workflow_id);
    assert_eq!(record.poem_id.as_deref(), Some("fog"));
    assert_eq!(record.final_translation, "修订译文");
    assert_eq!(record.poem_hash, Repository::hash_text(with_poem.input.original_poem()));
    assert_eq!(record.mode, WorkflowMode::Hybrid);
}

#[tokio::test]
async fn test_serviceTraits_shouldDelegateToRepository() {
    let repo = Repository::new_in_memory().unwrap();
    repo.upsert_poem(&fog_poem()).await.unwrap();
    repo.upsert_briefing("fog", "Written in 1916.").await.unwrap();
    assert_err!(repo.upsert_briefing("rain", "No such poem.").await);

    let poem = PoemLookup::get_poem(&repo, "fog").await.unwrap().unwrap();
    assert_eq!(poem, fog_poem());

    let briefing = BriefingLookup::get_briefing(&repo, "fog").await.unwrap().unwrap();
    assert_eq!(briefing.content, "Written in 1916.");
    assert!(BriefingLookup::get_briefing(&repo, "rain").await.unwrap().is_none());

    let output = run_workflow(&fog_input()).await;
    let id = TranslationSink::save(&repo, &output, WorkflowMode::Reasoning).await.unwrap();
    let records = repo.list_translations_for_poem("fog").await.unwrap();
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].mode, WorkflowMode::Reasoning);
}

#[tokio::test]
async fn test_repository_onDisk_shouldPersistAcrossConnections() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("verseflow.db");
    let output = run_workflow(&common::sample_input()).await;

    let id = {
        let repo = Repository::new(verseflow::database::DatabaseConnection::new(&path).unwrap());
        repo.save_translation(&output, WorkflowMode::Hybrid).await.unwrap()
    };

    let reopened = Repository::new(verseflow::database::DatabaseConnection::new(&path).unwrap());
    let loaded = reopened.load_translation(&id).await.unwrap().unwrap();
    assert_eq!(loaded.workflow_id, output.workflow_id);
}
