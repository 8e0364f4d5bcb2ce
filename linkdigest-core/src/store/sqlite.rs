// SQLite-backed ledger

use super::{LedgerStore, RunSummary};
use crate::error::Result;
use crate::ledger::{LedgerState, ParsedCache, UrlLog};
use linkdigest_fetch::LinkRecord;
use linkdigest_fetch::enricher::parse_date;
use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use tracing::info;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = SqliteStore { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Append-only logs; seq keeps insertion order
            CREATE TABLE IF NOT EXISTS posted (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS seen (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE
            );

            -- Bounded parsed-link cache, oldest seq evicted first
            CREATE TABLE IF NOT EXISTS parsed (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                uri TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                link TEXT NOT NULL DEFAULT '',
                date TEXT,
                thumbnail TEXT
            );

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                observed INTEGER NOT NULL,
                admitted INTEGER NOT NULL,
                enriched INTEGER NOT NULL,
                post_failures INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_start ON runs(start_time);
            ",
        )?;
        Ok(())
    }

    fn load_log(&self, table: &str) -> Result<UrlLog> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT url FROM {} ORDER BY seq", table))?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(UrlLog::from_entries(urls))
    }

    fn load_parsed(&self) -> Result<ParsedCache> {
        let mut stmt = self.conn.prepare(
            "SELECT uri, title, description, link, date, thumbnail FROM parsed ORDER BY seq",
        )?;
        let records = stmt
            .query_map([], |row| {
                let url: String = row.get(0)?;
                let link: String = row.get(3)?;
                let date: Option<String> = row.get(4)?;
                Ok(LinkRecord {
                    link: if link.is_empty() { url.clone() } else { link },
                    url,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    published: date.as_deref().and_then(parse_date),
                    thumbnail: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ParsedCache::from_records(records))
    }

    /// Past runs, newest first: `(id, start_time, admitted, post_failures)`.
    pub fn get_runs(&self, limit: usize) -> Result<Vec<(String, i64, i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, admitted, post_failures FROM runs
             ORDER BY start_time DESC, rowid DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

impl LedgerStore for SqliteStore {
    fn load(&self) -> Result<LedgerState> {
        Ok(LedgerState {
            seen: self.load_log("seen")?,
            posted: self.load_log("posted")?,
            parsed: self.load_parsed()?,
        })
    }

    fn commit(&self, state: &LedgerState) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        for (table, log) in [("seen", &state.seen), ("posted", &state.posted)] {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {} (url) VALUES (?1)",
                table
            ))?;
            for url in log.entries() {
                stmt.execute(params![url])?;
            }
        }

        // parsed is rewritten whole so evictions are reflected
        tx.execute("DELETE FROM parsed", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO parsed (uri, title, description, link, date, thumbnail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in state.parsed.iter() {
                stmt.execute(params![
                    &record.url,
                    &record.title,
                    &record.description,
                    &record.link,
                    record.published.map(|d| d.format("%Y-%m-%d").to_string()),
                    &record.thumbnail,
                ])?;
            }
        }

        tx.commit()?;
        info!(
            "Committed ledger to database: {} posted, {} parsed",
            state.posted.len(),
            state.parsed.len()
        );
        Ok(())
    }

    fn record_run(&self, summary: &RunSummary) -> Result<()> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO runs (id, start_time, end_time, observed, admitted, enriched, post_failures)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &run_id,
                summary.started_at.timestamp(),
                summary.finished_at.timestamp(),
                summary.observed as i64,
                summary.admitted as i64,
                summary.enriched as i64,
                summary.post_failures as i64,
            ],
        )?;
        Ok(())
    }
}
