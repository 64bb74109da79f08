/*!
 * Structured output parsing for LLM responses.
 *
 * Step responses carry their fields as XML-like tags:
 *
 * ```text
 * <initial_translation>
 * 雾来了，踏着猫的细步。
 * </initial_translation>
 * <initial_translation_notes>...</initial_translation_notes>
 * ```
 *
 * Only top-level tags become fields. An opening tag without its closing tag
 * is a hard error: it almost always means the model ran out of output tokens.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::errors::ParseError;

/// Field name used when a response contains no tags at all
pub const FALLBACK_FIELD: &str = "content";

/// Opening or closing tag with a simple identifier name. The name must follow
/// `<` or `</` directly, so comparisons like `a < b > c` stay plain text.
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z_][A-Za-z0-9_\-]*)\s*>").expect("valid tag regex")
});

/// Reasoning preambles emitted by some models before the actual answer
static THINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<think>.*?</think>|<thinking>.*?</thinking>").expect("valid think regex")
});

/// Start of a numbered suggestion: "1.", "2)", "[3]"
static NUMBERED_ITEM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d+[.)]|\[\d+\])\s*(.*)$").expect("valid numbered item regex")
});

/// Parser for tag-delimited LLM output
#[derive(Debug, Clone, Default)]
pub struct OutputParser;

impl OutputParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract every top-level `<field>value</field>` pair from the text.
    ///
    /// Returns a single `content` field holding the whole (trimmed) text when no
    /// tags are present.
    pub fn parse(&self, text: &str) -> Result<BTreeMap<String, String>, ParseError> {
        let text = THINK_REGEX.replace_all(text, "");
        let text = text.as_ref();

        let mut fields = BTreeMap::new();
        let mut position = 0;
        let mut found_tag = false;

        while let Some(captures) = TAG_REGEX.captures(&text[position..]) {
            let Some(tag) = captures.get(0) else { break };
            let is_closing = !captures[1].is_empty();
            let name = captures[2].to_string();
            let tag_end = position + tag.end();

            if is_closing {
                return Err(ParseError::Parsing(format!(
                    "closing tag </{}> has no matching opening tag",
                    name
                )));
            }

            found_tag = true;

            let closing = find_closing_tag(&text[tag_end..], &name).ok_or_else(|| {
                ParseError::Parsing(format!(
                    "tag <{}> is never closed (response may be truncated)",
                    name
                ))
            })?;

            let value = text[tag_end..tag_end + closing.0].trim().to_string();
            if fields.contains_key(&name) {
                debug!("Duplicate tag <{}> in response, keeping the first value", name);
            } else {
                fields.insert(name, value);
            }

            position = tag_end + closing.1;
        }

        if !found_tag {
            debug!("No tags found in response, using '{}' fallback", FALLBACK_FIELD);
            fields.insert(FALLBACK_FIELD.to_string(), text.trim().to_string());
        }

        Ok(fields)
    }

    /// Check that every required field is present and not blank.
    ///
    /// The error lists all missing fields, not only the first one.
    pub fn validate(
        &self,
        parsed: &BTreeMap<String, String>,
        required_fields: &[String],
    ) -> Result<(), ParseError> {
        let missing: Vec<String> = required_fields
            .iter()
            .filter(|field| {
                parsed
                    .get(field.as_str())
                    .is_none_or(|value| value.trim().is_empty())
            })
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ParseError::Validation { missing })
        }
    }

    /// Parse then validate in one call
    pub fn parse_and_validate(
        &self,
        text: &str,
        required_fields: &[String],
    ) -> Result<BTreeMap<String, String>, ParseError> {
        let parsed = self.parse(text)?;
        self.validate(&parsed, required_fields)?;
        Ok(parsed)
    }

    /// Split editor suggestions into numbered items.
    ///
    /// Lines that do not start a new item are folded into the current one.
    /// Text without any numbering becomes a single item.
    pub fn parse_numbered_suggestions(text: &str) -> Vec<String> {
        let mut items: Vec<String> = Vec::new();

        for line in text.lines() {
            if let Some(captures) = NUMBERED_ITEM_REGEX.captures(line) {
                items.push(captures[1].trim().to_string());
            } else if let Some(current) = items.last_mut() {
                let line = line.trim();
                if !line.is_empty() {
                    if !current.is_empty() {
                        current.push('\n');
                    }
                    current.push_str(line);
                }
            }
        }

        if items.is_empty() {
            let whole = text.trim();
            return if whole.is_empty() {
                Vec::new()
            } else {
                vec![whole.to_string()]
            };
        }

        items.retain(|item| !item.is_empty());
        items
    }
}

/// Find `</name>` (whitespace allowed before `>`) and return (start, end)
/// offsets relative to `haystack`.
fn find_closing_tag(haystack: &str, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{}", name);
    let mut from = 0;

    while let Some(offset) = haystack[from..].find(&needle) {
        let start = from + offset;
        let after_name = start + needle.len();
        let rest = &haystack[after_name..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('>') {
            return Some((start, after_name + (rest.len() - trimmed.len()) + 1));
        }
        from = after_name;
    }

    None
}
