// Flat-file ledger: posted.txt, seen.txt and parsed.csv

use super::{DataPaths, LedgerStore, StagedFile, read_list, stage_atomic, stage_list};
use crate::error::Result;
use crate::ledger::{LedgerState, ParsedCache, UrlLog};
use linkdigest_fetch::LinkRecord;
use linkdigest_fetch::enricher::parse_date;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// One row of `parsed.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParsedRow {
    uri: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl From<ParsedRow> for LinkRecord {
    fn from(row: ParsedRow) -> Self {
        let link = if row.link.is_empty() {
            row.uri.clone()
        } else {
            row.link
        };
        LinkRecord {
            url: row.uri,
            title: row.title,
            description: row.description,
            link,
            thumbnail: row.thumbnail.filter(|t| !t.is_empty()),
            published: row.date.as_deref().and_then(parse_date),
        }
    }
}

impl From<&LinkRecord> for ParsedRow {
    fn from(record: &LinkRecord) -> Self {
        Self {
            uri: record.url.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            link: record.link.clone(),
            date: record.published.map(|d| d.format("%Y-%m-%d").to_string()),
            thumbnail: record.thumbnail.clone(),
        }
    }
}

/// Ledger kept as plain files in the data directory.
pub struct FileStore {
    paths: DataPaths,
}

impl FileStore {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }
}

impl LedgerStore for FileStore {
    fn load(&self) -> Result<LedgerState> {
        let state = LedgerState {
            seen: UrlLog::from_entries(read_list(&self.paths.seen)?),
            posted: UrlLog::from_entries(read_list(&self.paths.posted)?),
            parsed: read_parsed(&self.paths.parsed)?,
        };
        debug!(
            "Loaded ledger from {}: {} seen, {} posted, {} parsed",
            self.paths.root.display(),
            state.seen.len(),
            state.posted.len(),
            state.parsed.len()
        );
        Ok(state)
    }

    fn commit(&self, state: &LedgerState) -> Result<()> {
        let staged = [
            stage_parsed(&self.paths.parsed, &state.parsed)?,
            stage_list(&self.paths.seen, state.seen.entries())?,
            // posted last: it is what prevents re-posting
            stage_list(&self.paths.posted, state.posted.entries())?,
        ];
        for file in staged {
            file.persist()?;
        }
        info!(
            "Committed ledger to {}: {} posted, {} parsed",
            self.paths.root.display(),
            state.posted.len(),
            state.parsed.len()
        );
        Ok(())
    }
}

/// Reads `parsed.csv`, skipping malformed rows and rows without a URI.
pub fn read_parsed(path: &Path) -> Result<ParsedCache> {
    if !path.exists() {
        return Ok(ParsedCache::new());
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut records = Vec::new();
    let mut skipped = 0;
    for row in reader.deserialize::<ParsedRow>() {
        match row {
            Ok(row) if !row.uri.trim().is_empty() => records.push(LinkRecord::from(row)),
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!("Bad row in {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} unreadable rows in {}", skipped, path.display());
    }
    Ok(ParsedCache::from_records(records))
}

pub fn write_parsed(path: &Path, cache: &ParsedCache) -> Result<()> {
    stage_parsed(path, cache)?.persist()
}

fn stage_parsed(path: &Path, cache: &ParsedCache) -> Result<StagedFile> {
    stage_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        for record in cache.iter() {
            writer.serialize(ParsedRow::from(record))?;
        }
        writer.flush()?;
        Ok(())
    })
}
