/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 * `Repository` is also the SQLite-backed implementation of the poem lookup,
 * briefing lookup and translation sink used by the workflow.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use super::connection::{DatabaseConnection, DatabaseStats};
use super::models::{StepRecord, TranslationRecord};
use crate::language_utils::Language;
use crate::translation::models::{StepName, TranslationOutput, WorkflowMode};
use crate::translation::services::{
    Briefing, BriefingLookup, PoemLookup, PoemRecord, TranslationSink,
};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn parse_poem_row(row: &rusqlite::Row) -> rusqlite::Result<PoemRecord> {
    let source_lang: String = row.get(3)?;
    Ok(PoemRecord {
        id: row.get(0)?,
        poet_name: row.get(1)?,
        poem_title: row.get(2)?,
        source_lang: source_lang
            .parse::<Language>()
            .map_err(|e| conversion_error(3, e.to_string()))?,
        original_text: row.get(4)?,
    })
}

fn parse_translation_row(row: &rusqlite::Row) -> rusqlite::Result<TranslationRecord> {
    let mode: String = row.get(6)?;
    Ok(TranslationRecord {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        poem_id: row.get(2)?,
        poem_hash: row.get(3)?,
        source_lang: row.get(4)?,
        target_lang: row.get(5)?,
        mode: mode.parse().map_err(|e: String| conversion_error(6, e))?,
        final_translation: row.get(7)?,
        total_tokens: row.get(8)?,
        total_cost: row.get(9)?,
        total_duration_secs: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.db.stats()
    }

    /// Compute SHA256 hash of text
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    // =========================================================================
    // Poem Operations
    // =========================================================================

    /// Insert a poem, replacing the stored text of an existing id
    pub async fn upsert_poem(&self, poem: &PoemRecord) -> Result<()> {
        let poem = poem.clone();
        let content_hash = Self::hash_text(&poem.original_text);
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO poems (
                        id, poet_name, poem_title, source_lang, original_text, content_hash, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(id) DO UPDATE SET
                        poet_name = excluded.poet_name,
                        poem_title = excluded.poem_title,
                        source_lang = excluded.source_lang,
                        original_text = excluded.original_text,
                        content_hash = excluded.content_hash
                    "#,
                    params![
                        poem.id,
                        poem.poet_name,
                        poem.poem_title,
                        poem.source_lang.to_string(),
                        poem.original_text,
                        content_hash,
                        now,
                    ],
                )?;
                debug!("Stored poem {}", poem.id);
                Ok(())
            })
            .await
    }

    /// Get a poem by ID
    pub async fn find_poem(&self, poem_id: &str) -> Result<Option<PoemRecord>> {
        let poem_id = poem_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        r#"
                        SELECT id, poet_name, poem_title, source_lang, original_text
                        FROM poems WHERE id = ?1
                        "#,
                        [&poem_id],
                        parse_poem_row,
                    )
                    .optional()?;

                Ok(result)
            })
            .await
    }

    /// List stored poems ordered by id
    pub async fn list_poems(&self) -> Result<Vec<PoemRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, poet_name, poem_title, source_lang, original_text
                    FROM poems ORDER BY id
                    "#,
                )?;

                let poems = stmt
                    .query_map([], parse_poem_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(poems)
            })
            .await
    }

    // =========================================================================
    // Briefing Operations
    // =========================================================================

    /// Store or replace the briefing of a poem
    pub async fn upsert_briefing(&self, poem_id: &str, content: &str) -> Result<()> {
        let poem_id = poem_id.to_string();
        let content = content.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO briefings (poem_id, content, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(poem_id) DO UPDATE SET
                        content = excluded.content,
                        updated_at = excluded.updated_at
                    "#,
                    params![poem_id, content, now],
                )
                .with_context(|| format!("Failed to store briefing for poem {}", poem_id))?;
                Ok(())
            })
            .await
    }

    /// Get the briefing of a poem
    pub async fn find_briefing(&self, poem_id: &str) -> Result<Option<Briefing>> {
        let poem_id = poem_id.to_string();

        self.db
            .execute_async(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT poem_id, content FROM briefings WHERE poem_id = ?1",
                        [&poem_id],
                        |row| {
                            Ok(Briefing {
                                poem_id: row.get(0)?,
                                content: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;

                Ok(result)
            })
            .await
    }

    // =========================================================================
    // Translation Operations
    // =========================================================================

    /// Persist a finished workflow and its per-step metrics.
    ///
    /// Saving is keyed by workflow id: a second save of the same workflow
    /// writes nothing and returns the id of the first record.
    pub async fn save_translation(
        &self,
        output: &TranslationOutput,
        mode: WorkflowMode,
    ) -> Result<String> {
        let payload =
            serde_json::to_string(output).context("Failed to serialize translation output")?;
        let record = TranslationRecord::from_output(
            uuid::Uuid::new_v4().to_string(),
            output,
            Self::hash_text(output.input.original_poem()),
            mode,
        );
        let steps = StepRecord::from_output(output);

        self.db
            .transaction_async(move |tx| {
                let inserted = tx.execute(
                    r#"
                    INSERT OR IGNORE INTO translations (
                        id, workflow_id, poem_id, poem_hash, source_lang, target_lang, mode,
                        final_translation, total_tokens, total_cost, total_duration_secs,
                        payload, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        record.id,
                        record.workflow_id,
                        record.poem_id,
                        record.poem_hash,
                        record.source_lang,
                        record.target_lang,
                        record.mode.as_str(),
                        record.final_translation,
                        record.total_tokens,
                        record.total_cost,
                        record.total_duration_secs,
                        payload,
                        record.created_at,
                    ],
                )?;

                if inserted == 0 {
                    let existing: String = tx.query_row(
                        "SELECT id FROM translations WHERE workflow_id = ?1",
                        [&record.workflow_id],
                        |row| row.get(0),
                    )?;
                    debug!(
                        "Workflow {} already stored as {}",
                        record.workflow_id, existing
                    );
                    return Ok(existing);
                }

                Self::insert_steps_sync(tx, &record.id, &steps, &record.created_at)?;
                info!(
                    "Stored translation {} for workflow {}",
                    record.id, record.workflow_id
                );
                Ok(record.id)
            })
            .await
    }

    fn insert_steps_sync(
        conn: &Connection,
        translation_id: &str,
        steps: &[StepRecord],
        created_at: &str,
    ) -> Result<()> {
        let mut stmt = conn.prepare(
            r#"
            INSERT INTO workflow_steps (
                translation_id, step_name, provider, model, tokens_used,
                prompt_tokens, completion_tokens, duration_secs, cost, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )?;

        for step in steps {
            stmt.execute(params![
                translation_id,
                step.step_name.as_str(),
                step.provider,
                step.model,
                step.tokens_used,
                step.prompt_tokens,
                step.completion_tokens,
                step.duration_secs,
                step.cost,
                created_at,
            ])?;
        }

        Ok(())
    }

    /// Load the full output of a stored translation
    pub async fn load_translation(&self, translation_id: &str) -> Result<Option<TranslationOutput>> {
        let translation_id = translation_id.to_string();

        let payload: Option<String> = self
            .db
            .execute_async(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT payload FROM translations WHERE id = ?1",
                        [&translation_id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        payload
            .map(|json| {
                serde_json::from_str(&json).context("Stored translation payload is not valid JSON")
            })
            .transpose()
    }

    /// Stored translations of a poem, newest first
    pub async fn list_translations_for_poem(&self, poem_id: &str) -> Result<Vec<TranslationRecord>> {
        let poem_id = poem_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, workflow_id, poem_id, poem_hash, source_lang, target_lang, mode,
                           final_translation, total_tokens, total_cost, total_duration_secs, created_at
                    FROM translations
                    WHERE poem_id = ?1
                    ORDER BY created_at DESC
                    "#,
                )?;

                let records = stmt
                    .query_map([&poem_id], parse_translation_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    /// Per-step metrics of a stored translation, in execution order
    pub async fn get_workflow_steps(&self, translation_id: &str) -> Result<Vec<StepRecord>> {
        let translation_id = translation_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT step_name, provider, model, tokens_used, prompt_tokens,
                           completion_tokens, duration_secs, cost
                    FROM workflow_steps
                    WHERE translation_id = ?1
                    "#,
                )?;

                let mut steps = stmt
                    .query_map([&translation_id], |row| {
                        let step_name: String = row.get(0)?;
                        Ok(StepRecord {
                            step_name: step_name
                                .parse::<StepName>()
                                .map_err(|e| conversion_error(0, e))?,
                            provider: row.get(1)?,
                            model: row.get(2)?,
                            tokens_used: row.get(3)?,
                            prompt_tokens: row.get(4)?,
                            completion_tokens: row.get(5)?,
                            duration_secs: row.get(6)?,
                            cost: row.get(7)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                steps.sort_by_key(|step| step.step_name.index());
                Ok(steps)
            })
            .await
    }
}

#[async_trait]
impl PoemLookup for Repository {
    async fn get_poem(&self, poem_id: &str) -> Result<Option<PoemRecord>> {
        self.find_poem(poem_id).await
    }
}

#[async_trait]
impl BriefingLookup for Repository {
    async fn get_briefing(&self, poem_id: &str) -> Result<Option<Briefing>> {
        self.find_briefing(poem_id).await
    }
}

#[async_trait]
impl TranslationSink for Repository {
    async fn save(&self, output: &TranslationOutput, mode: WorkflowMode) -> Result<String> {
        self.save_translation(output, mode).await
    }
}
