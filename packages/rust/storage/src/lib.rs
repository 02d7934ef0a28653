//! Flat-file record store.
//!
//! Every listing source owns two JSON files: the raw scrape
//! (`<raw_dir>/<source>_raw_data.json`) and the enriched, accumulated
//! collection (`<processed_dir>/<source>_processed_data.json`). Each file is a
//! JSON array of [`Record`] objects and is read and written whole.

use std::path::{Path, PathBuf};

use artcallfinder_shared::{ArtCallError, PathsConfig, PromptTemplates, Record, Result};

const RAW_SUFFIX: &str = "_raw_data.json";
const PROCESSED_SUFFIX: &str = "_processed_data.json";

/// Per-source raw and processed collections on disk.
#[derive(Debug, Clone)]
pub struct RecordStore {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl RecordStore {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    pub fn from_paths(paths: &PathsConfig) -> Self {
        Self::new(&paths.raw_dir, &paths.processed_dir)
    }

    pub fn raw_path(&self, source: &str) -> PathBuf {
        self.raw_dir.join(format!("{source}{RAW_SUFFIX}"))
    }

    pub fn processed_path(&self, source: &str) -> PathBuf {
        self.processed_dir.join(format!("{source}{PROCESSED_SUFFIX}"))
    }

    pub fn load_raw(&self, source: &str) -> Result<Vec<Record>> {
        load_records(&self.raw_path(source))
    }

    pub fn load_processed(&self, source: &str) -> Result<Vec<Record>> {
        load_records(&self.processed_path(source))
    }

    pub fn save_raw(&self, source: &str, records: &[Record]) -> Result<PathBuf> {
        let path = self.raw_path(source);
        save_records(&path, records)?;
        Ok(path)
    }

    pub fn save_processed(&self, source: &str, records: &[Record]) -> Result<PathBuf> {
        let path = self.processed_path(source);
        save_records(&path, records)?;
        Ok(path)
    }

    /// Names of sources with a raw file, sorted.
    pub fn list_raw_sources(&self) -> Result<Vec<String>> {
        let mut sources: Vec<String> = list_json_files(&self.raw_dir)?
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.strip_suffix(RAW_SUFFIX))
            .map(String::from)
            .collect();
        sources.sort();
        Ok(sources)
    }

    /// Every `*.json` file in the processed directory, sorted by path.
    pub fn list_processed_files(&self) -> Result<Vec<PathBuf>> {
        list_json_files(&self.processed_dir)
    }
}

/// Read a record collection. A missing file is an empty collection.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        tracing::debug!(?path, "record file not found, starting empty");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ArtCallError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        ArtCallError::Storage(format!(
            "{} is not a JSON array of records: {e}",
            path.display()
        ))
    })
}

/// Write a record collection, creating parent directories as needed.
pub fn save_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ArtCallError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(records)
        .map_err(|e| ArtCallError::Storage(format!("failed to serialize records: {e}")))?;
    std::fs::write(path, json).map_err(|e| ArtCallError::io(path, e))?;

    tracing::debug!(?path, count = records.len(), "saved records");
    Ok(())
}

/// Load prompt templates, falling back to built-in defaults when the file is
/// missing.
pub fn load_prompts(path: &Path) -> Result<PromptTemplates> {
    if !path.exists() {
        tracing::warn!(?path, "prompts file not found, using built-in prompts");
        return Ok(PromptTemplates::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ArtCallError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| ArtCallError::config(format!("failed to parse {}: {e}", path.display())))
}

fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ArtCallError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ArtCallError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
