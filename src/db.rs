use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Outcome of one import pass (audit trail: "every pass is an event")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Unique id of the pass
    pub run_id: String,

    /// Display name of the data source (usually its path)
    pub source: String,

    /// SHA-256 of the bytes read; None when the source never opened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,

    pub status: ImportStatus,

    /// Source-level failure message when the pass was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportReport {
    /// Start a report for a pass that begins now
    pub fn begin(source: &str) -> Self {
        let now = Utc::now();

        ImportReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            source: source.to_string(),
            source_sha256: None,
            started_at: now,
            finished_at: now,
            inserted: 0,
            updated: 0,
            skipped: 0,
            status: ImportStatus::Completed,
            error: None,
        }
    }

    /// Rows that reached the store (inserted + updated)
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn is_completed(&self) -> bool {
        self.status == ImportStatus::Completed
    }

    pub fn summary(&self) -> String {
        format!(
            "Import {} from {}: {} inserted, {} updated, {} skipped ({})",
            self.run_id,
            self.source,
            self.inserted,
            self.updated,
            self.skipped,
            self.status.as_str()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Every row was read; some may have been skipped
    Completed,

    /// Source-level failure stopped the pass early
    Aborted,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Completed => "completed",
            ImportStatus::Aborted => "aborted",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "completed" => ImportStatus::Completed,
            _ => ImportStatus::Aborted,
        }
    }
}

/// Open (or create) the registry database at `db_path`
pub fn open_database(db_path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(busy_timeout)?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases answer "memory"
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    // Required for cascade delete and SET NULL on head-office removal
    conn.pragma_update(None, "foreign_keys", true)?;

    // ==========================================================================
    // Countries
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS countries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            iso_code TEXT UNIQUE NOT NULL CHECK (length(iso_code) = 2),
            name TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // SWIFT codes (self-referencing head office)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS swift_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            swift_code TEXT UNIQUE NOT NULL,
            bank_name TEXT NOT NULL,
            branch_name TEXT,
            address TEXT,
            is_headquarter INTEGER NOT NULL,
            country_id INTEGER NOT NULL
                REFERENCES countries(id) ON DELETE CASCADE,
            headquarters_id INTEGER
                REFERENCES swift_codes(id) ON DELETE SET NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Import runs (append-only audit trail, not part of registry state)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            source TEXT NOT NULL,
            source_sha256 TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            inserted INTEGER NOT NULL,
            updated INTEGER NOT NULL,
            skipped INTEGER NOT NULL,
            status TEXT NOT NULL,
            error TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_swift_codes_country ON swift_codes(country_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_swift_codes_headquarters ON swift_codes(headquarters_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_import_runs_started ON import_runs(started_at)",
        [],
    )?;

    Ok(())
}

/// Append an import pass to the audit trail
pub fn insert_import_run(conn: &Connection, report: &ImportReport) -> Result<()> {
    conn.execute(
        "INSERT INTO import_runs (
            run_id, source, source_sha256, started_at, finished_at,
            inserted, updated, skipped, status, error
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            report.run_id,
            report.source,
            report.source_sha256,
            report.started_at.to_rfc3339(),
            report.finished_at.to_rfc3339(),
            report.inserted as i64,
            report.updated as i64,
            report.skipped as i64,
            report.status.as_str(),
            report.error,
        ],
    )?;

    Ok(())
}

const IMPORT_RUN_COLUMNS: &str = "run_id, source, source_sha256, started_at, finished_at,
     inserted, updated, skipped, status, error";

/// Most recent import passes first
pub fn get_recent_import_runs(conn: &Connection, limit: usize) -> Result<Vec<ImportReport>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM import_runs ORDER BY id DESC LIMIT ?1",
        IMPORT_RUN_COLUMNS
    ))?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let runs = stmt
        .query_map(params![limit], map_import_run)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(runs)
}

/// Look up one import pass by its run id
pub fn get_import_run(conn: &Connection, run_id: &str) -> Result<Option<ImportReport>> {
    let run = conn
        .query_row(
            &format!("SELECT {} FROM import_runs WHERE run_id = ?1", IMPORT_RUN_COLUMNS),
            params![run_id],
            map_import_run,
        )
        .optional()?;

    Ok(run)
}

fn map_import_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportReport> {
    let started_at: String = row.get(3)?;
    let finished_at: String = row.get(4)?;
    let status: String = row.get(8)?;

    Ok(ImportReport {
        run_id: row.get(0)?,
        source: row.get(1)?,
        source_sha256: row.get(2)?,
        started_at: parse_timestamp(3, &started_at)?,
        finished_at: parse_timestamp(4, &finished_at)?,
        inserted: count_column(row, 5)?,
        updated: count_column(row, 6)?,
        skipped: count_column(row, 7)?,
        status: ImportStatus::parse(&status),
        error: row.get(9)?,
    })
}

fn count_column(row: &rusqlite::Row<'_>, column: usize) -> rusqlite::Result<usize> {
    let value: i64 = row.get(column)?;
    usize::try_from(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Integer,
            Box::new(e),
        )
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
