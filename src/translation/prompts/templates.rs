/*!
 * Prompt templates for the translation workflow steps.
 *
 * A template is a YAML document with a `system` and a `user` prompt. Both
 * may reference variables as `{{name}}`:
 *
 * ```yaml
 * version: "1.2"
 * description: Initial translation, reasoning models
 * system: You are a literary translator working from {{source_lang}}.
 * user: |
 *   Translate the following poem into {{target_lang}}:
 *   {{original_poem}}
 * ```
 *
 * Rendering is strict: a placeholder without a value, a non-primitive value
 * or an unclosed `{{` is an error.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::TemplateError;

/// Variables available to a template; values must be primitives
pub type TemplateVariables = BTreeMap<String, Value>;

/// A system/user prompt pair loaded from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name (file stem); filled in by the loader
    #[serde(default)]
    pub name: String,

    /// System prompt
    pub system: String,

    /// User prompt
    pub user: String,

    /// Free-form version tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// How missing variables are handled while rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderMode {
    /// Missing variables and malformed placeholders are errors
    Strict,
    /// Missing variables render as empty strings
    Lenient,
}

impl PromptTemplate {
    /// Create a template from its parts
    pub fn new(name: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: system.into(),
            user: user.into(),
            version: None,
            description: None,
        }
    }

    /// Parse a template from YAML text
    pub fn from_yaml(name: &str, yaml: &str) -> Result<Self, TemplateError> {
        let mut template: PromptTemplate =
            serde_yaml::from_str(yaml).map_err(|e| TemplateError::Load {
                name: name.to_string(),
                message: format!("invalid template document: {}", e),
            })?;
        template.name = name.to_string();
        Ok(template)
    }

    /// Sorted set of placeholder names used by either prompt
    pub fn required_variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for text in [&self.system, &self.user] {
            for piece in tokenize(text).into_iter().flatten() {
                if let Piece::Placeholder(name) = piece {
                    names.insert(name.to_string());
                }
            }
        }
        names
    }

    /// Render both prompts, failing on any missing variable
    pub fn render(&self, variables: &TemplateVariables) -> Result<(String, String), TemplateError> {
        self.render_with(variables, RenderMode::Strict)
    }

    pub(crate) fn render_with(
        &self,
        variables: &TemplateVariables,
        mode: RenderMode,
    ) -> Result<(String, String), TemplateError> {
        let mut missing = BTreeSet::new();
        let system = self.render_text(&self.system, variables, mode, &mut missing)?;
        let user = self.render_text(&self.user, variables, mode, &mut missing)?;

        if !missing.is_empty() {
            return Err(self.variable_error(format!(
                "missing required variable(s): {}",
                missing.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        Ok((system, user))
    }

    fn render_text(
        &self,
        text: &str,
        variables: &TemplateVariables,
        mode: RenderMode,
        missing: &mut BTreeSet<String>,
    ) -> Result<String, TemplateError> {
        let pieces = match tokenize(text) {
            Ok(pieces) => pieces,
            Err(message) if mode == RenderMode::Strict => return Err(self.variable_error(message)),
            // Lenient rendering keeps malformed text as-is
            Err(_) => return Ok(text.to_string()),
        };

        let mut rendered = String::with_capacity(text.len());
        for piece in pieces {
            match piece {
                Piece::Literal(literal) => rendered.push_str(literal),
                Piece::Placeholder(name) => match variables.get(name) {
                    Some(value) => rendered.push_str(&self.value_to_string(name, value, mode)?),
                    None if mode == RenderMode::Strict => {
                        missing.insert(name.to_string());
                    }
                    None => {}
                },
            }
        }

        Ok(rendered)
    }

    fn value_to_string(
        &self,
        name: &str,
        value: &Value,
        mode: RenderMode,
    ) -> Result<String, TemplateError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok(String::new()),
            Value::Array(_) | Value::Object(_) if mode == RenderMode::Lenient => Ok(value.to_string()),
            Value::Array(_) | Value::Object(_) => Err(self.variable_error(format!(
                "variable '{}' must be a string, number or boolean",
                name
            ))),
        }
    }

    fn variable_error(&self, message: String) -> TemplateError {
        TemplateError::Variable {
            name: self.name.clone(),
            message,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split template text into literals and `{{name}}` placeholders
fn tokenize(text: &str) -> Result<Vec<Piece<'_>>, String> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            pieces.push(Piece::Literal(&rest[..start]));
        }

        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(format!(
                "unclosed placeholder near '{}'",
                preview(&rest[start..], 30)
            ));
        };

        let name = after_open[..end].trim();
        if !is_identifier(name) {
            return Err(format!("invalid placeholder name '{}'", name));
        }

        pieces.push(Piece::Placeholder(name));
        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }

    Ok(pieces)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
