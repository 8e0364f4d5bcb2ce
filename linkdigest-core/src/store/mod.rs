//! Persistence for the ledger and the configuration lists.
//!
//! The ledger (seen, posted, parsed) goes through a [`LedgerStore`] backend.
//! Configuration lists (blacklist, stopwords, keyword tables) are always plain
//! files in the data directory.

pub mod files;
pub mod sqlite;

use crate::error::{CoreError, Result};
use crate::keywords::KeywordVocabulary;
use crate::ledger::{Blacklist, LedgerState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub use files::FileStore;
pub use sqlite::SqliteStore;

pub const SETTINGS_FILE: &str = "linkdigest.toml";

/// Locations of every persisted file under one data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub settings: PathBuf,
    pub blacklist: PathBuf,
    pub stopwords: PathBuf,
    pub keywords: PathBuf,
    pub keyword_deny: PathBuf,
    pub posted: PathBuf,
    pub seen: PathBuf,
    pub parsed: PathBuf,
    pub database: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            settings: root.join(SETTINGS_FILE),
            blacklist: root.join("blacklist.txt"),
            stopwords: root.join("stopwords.txt"),
            keywords: root.join("keywords.csv"),
            keyword_deny: root.join("keyword_deny.txt"),
            posted: root.join("posted.txt"),
            seen: root.join("seen.txt"),
            parsed: root.join("parsed.csv"),
            database: root.join("linkdigest.db"),
            root,
        }
    }

    /// Creates the directory and any missing list files (empty). Existing
    /// files are left alone. Returns the files created.
    pub fn initialize(&self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.root)?;
        let mut created = Vec::new();
        for path in [
            &self.blacklist,
            &self.stopwords,
            &self.keyword_deny,
            &self.posted,
            &self.seen,
        ] {
            if !path.exists() {
                File::create(path)?;
                created.push(path.clone());
            }
        }
        if !self.keywords.exists() {
            save_vocabulary(&self.keywords, &KeywordVocabulary::default())?;
            created.push(self.keywords.clone());
        }
        Ok(created)
    }

    pub fn load_blacklist(&self) -> Result<Blacklist> {
        Ok(Blacklist::new(read_required_list(&self.blacklist)?))
    }

    pub fn load_stopwords(&self) -> Result<HashSet<String>> {
        Ok(read_list(&self.stopwords)?
            .into_iter()
            .map(|w| w.to_lowercase())
            .collect())
    }

    pub fn load_vocabulary(&self) -> Result<KeywordVocabulary> {
        let deny = read_list(&self.keyword_deny)?;
        if !self.keywords.exists() {
            return Ok(KeywordVocabulary::new(Vec::new(), deny));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.keywords)?;
        let mut display = Vec::new();
        for row in reader.deserialize::<KeywordRow>() {
            match row {
                Ok(row) => display.push((row.keyword, row.display)),
                Err(e) => debug!("Skipping keyword row: {}", e),
            }
        }
        Ok(KeywordVocabulary::new(display, deny))
    }

    pub fn save_vocabulary(&self, vocabulary: &KeywordVocabulary) -> Result<()> {
        save_vocabulary(&self.keywords, vocabulary)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KeywordRow {
    keyword: String,
    display: String,
}

fn save_vocabulary(path: &Path, vocabulary: &KeywordVocabulary) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        // header even when empty
        writer.write_record(["keyword", "display"])?;
        for (keyword, display) in vocabulary.entries() {
            writer.write_record([keyword, display])?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Summary of one curation run, kept by backends that track history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observed: usize,
    pub admitted: usize,
    pub enriched: usize,
    pub post_failures: usize,
}

/// Backend holding the ledger between runs.
pub trait LedgerStore {
    fn load(&self) -> Result<LedgerState>;

    /// Persists the whole state.
    ///
    /// Nothing is replaced until every part has been written out, so a
    /// failure while writing leaves the previous state intact. Backends
    /// without transactions swap parts in one at a time afterwards, with the
    /// posted log last: a kill during the swap can leave a newer seen log or
    /// cache beside the previous posted log, never the reverse.
    fn commit(&self, state: &LedgerState) -> Result<()>;

    fn record_run(&self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Lines of a list file, skipping blanks and `#` comments. A missing file
/// reads as empty.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Like [`read_list`] but a missing file is a configuration error.
pub fn read_required_list(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(CoreError::MissingFile(path.to_path_buf()));
    }
    read_list(path)
}

/// Writes one entry per line, replacing the file atomically.
pub fn write_list<S: AsRef<str>>(path: &Path, entries: &[S]) -> Result<()> {
    stage_list(path, entries)?.persist()
}

pub fn stage_list<S: AsRef<str>>(path: &Path, entries: &[S]) -> Result<StagedFile> {
    stage_atomic(path, |file| {
        for entry in entries {
            writeln!(file, "{}", entry.as_ref())?;
        }
        Ok(())
    })
}

/// Writes through a temp file in the target directory, then renames it over
/// `path`.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    stage_atomic(path, write)?.persist()
}

/// Fully written temp file waiting to replace its target. Dropping it
/// without [`StagedFile::persist`] removes the temp file and leaves the
/// target untouched.
pub struct StagedFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn persist(self) -> Result<()> {
        self.tmp
            .persist(&self.target)
            .map_err(|e| CoreError::Io(e.error))?;
        Ok(())
    }
}

/// Writes and syncs the new content of `path` into a temp file beside it.
pub fn stage_atomic<F>(path: &Path, write: F) -> Result<StagedFile>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file_mut().sync_all()?;
    Ok(StagedFile {
        tmp,
        target: path.to_path_buf(),
    })
}
