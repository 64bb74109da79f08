/*!
 * SQLite handle shared by the repository.
 *
 * One `rusqlite::Connection` sits behind a mutex; every query runs on the
 * blocking thread pool so a workflow never stalls the runtime while a
 * translation is being stored. Foreign keys and the schema are set up when
 * the handle is opened.
 */

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;

/// Where the database lives
#[derive(Debug, Clone, PartialEq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Cloneable handle to the verseflow database
#[derive(Clone)]
pub struct DatabaseConnection {
    location: Location,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open `verseflow/verseflow.db` under the user's local data directory
    pub fn new_default() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .ok_or_else(|| anyhow!("No local data directory available for the database"))?;
        Self::new(data_dir.join("verseflow").join("verseflow.db"))
    }

    /// Open (or create) the database file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create database directory {:?}", dir))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {:?}", path))?;
        info!("Using translation database {:?}", path);

        Self::prepared(conn, Location::File(path))
    }

    /// Private database that disappears with the handle
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        debug!("Using in-memory translation database");

        Self::prepared(conn, Location::Memory)
    }

    fn prepared(conn: Connection, location: Location) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            location,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);

        tokio::task::spawn_blocking(move || f(&connection.lock()))
            .await
            .context("Database query task failed")?
    }

    /// Run `f` inside a transaction on the blocking pool.
    ///
    /// The transaction commits when `f` returns `Ok`; an error rolls back
    /// everything `f` wrote.
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);

        tokio::task::spawn_blocking(move || {
            let mut conn = connection.lock();
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
        .await
        .context("Database transaction task failed")?
    }

    /// Row counts and file size
    pub fn stats(&self) -> Result<DatabaseStats> {
        let conn = self.connection.lock();
        let count = |table: &str| -> Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .with_context(|| format!("Failed to count rows of {}", table))
        };

        let file_size_bytes = match &self.location {
            Location::File(path) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            Location::Memory => 0,
        };

        Ok(DatabaseStats {
            poem_count: count("poems")?,
            briefing_count: count("briefings")?,
            translation_count: count("translations")?,
            file_size_bytes,
        })
    }
}

/// What the database currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub poem_count: i64,
    pub briefing_count: i64,
    pub translation_count: i64,
    /// Zero for in-memory databases
    pub file_size_bytes: u64,
}

impl fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} poem(s), {} briefing(s), {} translation(s), {} KB",
            self.poem_count,
            self.briefing_count,
            self.translation_count,
            self.file_size_bytes / 1024
        )
    }
}
