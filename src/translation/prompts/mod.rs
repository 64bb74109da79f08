/*!
 * Prompt template service.
 *
 * Templates live as `<name>.yaml` (or `<name>.yml`) files in one directory
 * and are loaded lazily by name. Loaded templates are cached and shared
 * between concurrent workflow runs.
 */

pub mod templates;

use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::errors::TemplateError;

pub use templates::{PromptTemplate, TemplateVariables};
use templates::RenderMode;

const TEMPLATE_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Loads, caches and renders prompt templates
#[derive(Debug)]
pub struct PromptService {
    template_dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<PromptTemplate>>>,
}

impl PromptService {
    /// Create a service reading templates from `template_dir`
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Put a template straight into the cache, bypassing the filesystem
    pub fn register(&self, template: PromptTemplate) {
        self.cache
            .write()
            .insert(template.name.clone(), Arc::new(template));
    }

    /// Get a template by name, loading it on first use
    pub fn get_template(&self, name: &str) -> Result<Arc<PromptTemplate>, TemplateError> {
        if let Some(template) = self.cache.read().get(name) {
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(self.load_template(name)?);

        // Another task may have loaded the same template meanwhile; keep the first
        let mut cache = self.cache.write();
        let entry = cache
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&template));
        Ok(Arc::clone(entry))
    }

    fn load_template(&self, name: &str) -> Result<PromptTemplate, TemplateError> {
        let path = TEMPLATE_EXTENSIONS
            .iter()
            .map(|ext| self.template_dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
            .ok_or_else(|| {
                let available = self.list_templates();
                TemplateError::Load {
                    name: name.to_string(),
                    message: if available.is_empty() {
                        format!("not found in {}", self.template_dir.display())
                    } else {
                        format!("not found. Available templates: {}", available.join(", "))
                    },
                }
            })?;

        let content = fs::read_to_string(&path).map_err(|e| TemplateError::Load {
            name: name.to_string(),
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        let template = PromptTemplate::from_yaml(name, &content)?;
        debug!(
            "Loaded template '{}' (version {}) from {}",
            name,
            template.version.as_deref().unwrap_or("unversioned"),
            path.display()
        );
        Ok(template)
    }

    /// Render a template into its (system, user) prompts
    pub fn render(
        &self,
        name: &str,
        variables: &TemplateVariables,
    ) -> Result<(String, String), TemplateError> {
        self.get_template(name)?.render(variables)
    }

    /// Render with fallbacks.
    ///
    /// `defaults` fill variables absent from `variables`. If strict rendering
    /// still fails on a variable problem, placeholders without a value are
    /// rendered as empty strings instead. Load errors are still returned.
    pub fn safe_render(
        &self,
        name: &str,
        variables: &TemplateVariables,
        defaults: &TemplateVariables,
    ) -> Result<(String, String), TemplateError> {
        let template = self.get_template(name)?;

        let mut merged = defaults.clone();
        merged.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));

        match template.render(&merged) {
            Ok(prompts) => Ok(prompts),
            Err(TemplateError::Variable { message, .. }) => {
                warn!(
                    "Strict rendering of '{}' failed ({}), falling back to lenient rendering",
                    name, message
                );
                template.render_with(&merged, RenderMode::Lenient)
            }
            Err(e) => Err(e),
        }
    }

    /// Names of all templates in the template directory, sorted
    pub fn list_templates(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.template_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
            })
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();

        names.sort();
        names.dedup();
        names
    }

    /// Drop one cached template. Returns whether it was cached.
    ///
    /// Only call when no workflow is in flight.
    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.write().remove(name).is_some()
    }

    /// Drop every cached template
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    /// Number of cached templates
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}
