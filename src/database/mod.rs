/*!
 * Database module for persistent storage of poems and translations.
 *
 * This module provides SQLite-based persistence for:
 * - Poems and their background briefings
 * - Finished workflow outputs, one row per workflow id
 * - Per-step metrics of every stored workflow
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{StepRecord, TranslationRecord};
pub use repository::Repository;
