use anyhow::{Result, Context};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::language_utils::Language;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @generates: Output path for a translated poem
    // @params: poem_file, output_dir, target language
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        poem_file: P1,
        output_dir: P2,
        target_language: Language,
    ) -> PathBuf {
        let stem = poem_file.as_ref().file_stem().unwrap_or_default();

        let output_filename = format!(
            "{}.{}.json",
            stem.to_string_lossy(),
            target_language.iso_639_3()
        );

        output_dir.as_ref().join(output_filename)
    }

    // @reads: Poem text, with a trailing newline removed
    pub fn read_poem<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read poem file: {:?}", path))?;
        Ok(content.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Write `value` as pretty JSON, replacing `path` only once the whole
    /// document is on disk
    pub fn write_json_atomic<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&dir)?;

        let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to write output file: {:?}", path))?;

        Ok(())
    }
}
