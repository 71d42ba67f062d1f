//! Durable per-company results, keyed by company number.
//!
//! The existence of a row is the sole idempotency marker: once a company
//! number is recorded it is done forever and later writes are ignored.
//! Sharded workers each open their own connection to the same file; when
//! their slices overlap the insert-if-absent write keeps the first result.

use std::path::Path;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// One recorded company outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub name: String,
    /// Origin URL of the chosen site, or `"none"`.
    pub result: String,
    pub confidence: i64,
    pub maximum_possible_confidence: i64,
    /// UTC timestamp of the write, lexicographically sortable.
    pub gm_date: String,
}

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Open (or create) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                id TEXT,
                name TEXT,
                result TEXT,
                confidence INTEGER,
                maximumPossibleConfidence INTEGER,
                gmDate TEXT,
                PRIMARY KEY(id)
            )",
            [],
        )?;

        Ok(Self { conn })
    }

    /// Is this company number already resolved?
    pub fn is_done(&self, id: &str) -> Result<bool, HistoryError> {
        let row: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM history WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(row.is_some())
    }

    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>, HistoryError> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, name, result, confidence, maximumPossibleConfidence, gmDate
                 FROM history
                 WHERE id = ?",
                params![id],
                |row| {
                    Ok(HistoryEntry {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        result: row.get(2)?,
                        confidence: row.get(3)?,
                        maximum_possible_confidence: row.get(4)?,
                        gm_date: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(entry)
    }

    /// Record an outcome for a company number. Returns false when a row for
    /// that id already exists; the existing row always wins.
    pub fn record(
        &self,
        id: &str,
        name: &str,
        result: &str,
        confidence: i64,
        maximum_possible: i64,
    ) -> Result<bool, HistoryError> {
        debug!("Inserting into database: {id} -> {result}");

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO history
             (id, name, result, confidence, maximumPossibleConfidence, gmDate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, name, result, confidence, maximum_possible, utc_stamp()],
        )?;

        Ok(inserted > 0)
    }

    /// Delete entries older than `days` days. `days <= 0` keeps everything.
    pub fn prune(&self, days: i64) -> Result<usize, HistoryError> {
        if days <= 0 {
            return Ok(0);
        }

        let cutoff = (Utc::now() - Duration::days(days))
            .format(STAMP_FORMAT)
            .to_string();

        let deleted = self
            .conn
            .execute("DELETE FROM history WHERE gmDate < ?", params![cutoff])?;

        if deleted > 0 {
            debug!("Pruned {deleted} history entries older than {days} days");
        }

        Ok(deleted)
    }

    pub fn count(&self) -> Result<usize, HistoryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;

        Ok(count as usize)
    }
}

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn utc_stamp() -> String {
    Utc::now().format(STAMP_FORMAT).to_string()
}
