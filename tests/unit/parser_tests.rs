/*!
 * Tests for structured output parsing
 */

use verseflow::ParseError;
use verseflow::providers::mock::DEFAULT_MOCK_RESPONSE;
use verseflow::translation::OutputParser;

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_parseAndValidate_withRealisticResponse_shouldExtractEveryField() {
    let response = "Sure! Here is my translation.\n\
        <initial_translation>\n雾来了\n踮着猫的细步\n</initial_translation>\n\
        <initial_translation_notes>Kept the short lines.</initial_translation_notes>\n\
        <translated_poem_title>雾</translated_poem_title>";

    let parsed = OutputParser::new()
        .parse_and_validate(response, &fields(&["initial_translation", "initial_translation_notes"]))
        .unwrap();

    assert_eq!(parsed["initial_translation"], "雾来了\n踮着猫的细步");
    assert_eq!(parsed["translated_poem_title"], "雾");
    assert!(!parsed.contains_key("translated_poet_name"));
}

#[test]
fn test_parseAndValidate_withMissingFields_shouldListThemAll() {
    let err = OutputParser::new()
        .parse_and_validate(
            "<editor_suggestions>1. Tighten line 2.</editor_suggestions>",
            &fields(&["revised_translation", "revised_translation_notes"]),
        )
        .unwrap_err();

    assert_eq!(
        err,
        ParseError::Validation {
            missing: fields(&["revised_translation", "revised_translation_notes"])
        }
    );
}

#[test]
fn test_parseAndValidate_withBlankRequiredField_shouldTreatAsMissing() {
    let err = OutputParser::new()
        .parse_and_validate(
            "<revised_translation>   </revised_translation><revised_translation_notes>n</revised_translation_notes>",
            &fields(&["revised_translation", "revised_translation_notes"]),
        )
        .unwrap_err();

    assert!(matches!(err, ParseError::Validation { missing } if missing == fields(&["revised_translation"])));
}

#[test]
fn test_parse_withTruncatedResponse_shouldFail() {
    let err = OutputParser::new()
        .parse("<initial_translation>The fog comes on little")
        .unwrap_err();
    assert!(matches!(err, ParseError::Parsing(_)));
}

#[test]
fn test_parse_mockDefaultResponse_shouldSatisfyEveryStep() {
    let parsed = OutputParser::new().parse(DEFAULT_MOCK_RESPONSE).unwrap();
    for field in [
        "initial_translation",
        "initial_translation_notes",
        "editor_suggestions",
        "revised_translation",
        "revised_translation_notes",
    ] {
        assert!(parsed.contains_key(field), "missing {}", field);
    }
}

#[test]
fn test_parseNumberedSuggestions_withContinuationLines_shouldJoinThem() {
    let suggestions = OutputParser::parse_numbered_suggestions(
        "1. Line 2 loses the cat image.\n   Consider 猫步.\n2) The title reads flat.\n\n3. Keep the ending.",
    );

    assert_eq!(suggestions.len(), 3);
    assert_eq!(suggestions[0], "Line 2 loses the cat image.\nConsider 猫步.");
    assert_eq!(suggestions[1], "The title reads flat.");
}
