/*!
 * Tests for the prompt template service against template files on disk
 */

use serde_json::Value;
use std::path::PathBuf;
use verseflow::TemplateError;
use verseflow::translation::PromptService;
use verseflow::translation::prompts::TemplateVariables;

use crate::common;

fn shipped_prompts() -> PromptService {
    PromptService::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts"))
}

fn workflow_variables() -> TemplateVariables {
    [
        "original_poem",
        "source_lang",
        "target_lang",
        "poet_name",
        "poem_title",
        "background_briefing",
        "initial_translation",
        "initial_translation_notes",
        "editor_suggestions",
    ]
    .into_iter()
    .map(|name| (name.to_string(), Value::String(format!("<{}>", name))))
    .collect()
}

#[test]
fn test_shippedTemplates_shouldAllRenderWithWorkflowVariables() {
    let prompts = shipped_prompts();
    let names = prompts.list_templates();
    assert_eq!(names.len(), 6);

    for name in names {
        let (system, user) = prompts
            .render(&name, &workflow_variables())
            .unwrap_or_else(|e| panic!("template {} failed: {}", name, e));
        assert!(!system.contains("{{"), "{} has unrendered placeholders", name);
        assert!(!user.contains("{{"), "{} has unrendered placeholders", name);
    }
}

#[test]
fn test_shippedTemplates_shouldRequestTheirStepTags() {
    let prompts = shipped_prompts();

    let (_, user) = prompts
        .render("editor_review_nonreasoning", &workflow_variables())
        .unwrap();
    assert!(user.contains("<editor_suggestions>"));
    assert!(user.contains("<initial_translation>"));

    let (_, user) = prompts
        .render("translator_revision_reasoning", &workflow_variables())
        .unwrap();
    assert!(user.contains("<revised_translation>"));
}

#[test]
fn test_render_withMissingVariable_shouldFailAndNameIt() {
    let dir = common::template_dir();
    let prompts = PromptService::new(dir.path());

    let mut variables = workflow_variables();
    variables.remove("editor_suggestions");

    let err = prompts.render("revision", &variables).unwrap_err();
    match err {
        TemplateError::Variable { name, message } => {
            assert_eq!(name, "revision");
            assert!(message.contains("editor_suggestions"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_render_withMissingTemplate_shouldListAvailable() {
    let dir = common::template_dir();
    let prompts = PromptService::new(dir.path());

    let err = prompts.render("missing_template", &TemplateVariables::new()).unwrap_err();
    let message = err.to_string();

    assert!(matches!(err, TemplateError::Load { .. }));
    assert!(message.contains("missing_template"));
    assert!(message.contains("initial, review, revision"));
}

#[test]
fn test_invalidate_shouldReloadEditedTemplate() {
    let dir = common::template_dir();
    let prompts = PromptService::new(dir.path());
    let variables = workflow_variables();

    let (system, _) = prompts.render("review", &variables).unwrap();
    assert!(system.contains("You edit"));

    common::create_test_file(dir.path(), "review.yaml", "system: Edited {{target_lang}}\nuser: u\n").unwrap();

    // Cached until invalidated
    let (system, _) = prompts.render("review", &variables).unwrap();
    assert!(system.contains("You edit"));

    assert!(prompts.invalidate("review"));
    let (system, _) = prompts.render("review", &variables).unwrap();
    assert_eq!(system, "Edited <target_lang>");
}
