/*!
 * Interfaces to the services around the workflow: poem storage, background
 * briefings and persistence of finished translations.
 *
 * Lookups return `Ok(None)` when nothing is stored; callers treat a missing
 * briefing as normal and an erroring lookup as a soft failure.
 */

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::language_utils::Language;
use crate::translation::models::{TranslationOutput, WorkflowMode};

/// A stored poem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoemRecord {
    pub id: String,
    pub poet_name: String,
    pub poem_title: String,
    pub source_lang: Language,
    pub original_text: String,
}

/// Background notes about a poem, fed to the translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    pub poem_id: String,
    pub content: String,
}

#[async_trait]
pub trait PoemLookup: Send + Sync {
    /// Fetch a poem by id
    async fn get_poem(&self, poem_id: &str) -> Result<Option<PoemRecord>>;
}

#[async_trait]
pub trait BriefingLookup: Send + Sync {
    /// Fetch the briefing for a poem
    async fn get_briefing(&self, poem_id: &str) -> Result<Option<Briefing>>;
}

#[async_trait]
pub trait TranslationSink: Send + Sync {
    /// Persist a finished translation and return its record id.
    ///
    /// Saving the same workflow twice returns the existing record id.
    async fn save(&self, output: &TranslationOutput, mode: WorkflowMode) -> Result<String>;
}
