//! Repository layer for SQLite persistence.
//!
//! Two stores share one database file: the raw report store (written by the
//! scraper, read by the pipeline) and the processed report store (written
//! once per report by the pipeline, read by the query API). Connections are
//! opened per call; SQLite connections are cheap and WAL mode plus a busy
//! timeout make concurrent writers safe.

mod processed;
mod raw;

pub use processed::{
    month_name, InsertOutcome, LocationStats, MonthlyStats, ProcessedReportRepository,
    Recommendation, ReportFilter, ReportRow, SpeciesCount, StoreStats,
};
pub use raw::RawReportRepository;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Errors from the persistence layer.
///
/// Any variant reaching the pipeline driver means the store is unavailable
/// and the current run aborts rather than silently dropping results.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Open a connection with the pragmas every store relies on.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 30000;
        PRAGMA foreign_keys = ON;
        "#,
    )?;
    Ok(conn)
}

/// Initialize both report tables. Idempotent; called by each repository
/// constructor so either store can be opened first.
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS raw_reports (
            id INTEGER PRIMARY KEY,
            date_posted TEXT,
            username TEXT,
            raw_content TEXT NOT NULL,
            weather_badge TEXT,
            image_urls TEXT,
            scraped_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS processed_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_report_id INTEGER NOT NULL UNIQUE,
            date_posted TEXT,
            month INTEGER,
            season TEXT,
            species_caught TEXT,
            species_targeted TEXT,
            bait_lure TEXT,
            location TEXT,
            water_depth_feet REAL,
            water_temp_f REAL,
            air_temp_f REAL,
            weather_conditions TEXT,
            ice_thickness_inches REAL,
            notes TEXT,
            processed_at TEXT NOT NULL,
            FOREIGN KEY (raw_report_id) REFERENCES raw_reports(id)
        );

        CREATE INDEX IF NOT EXISTS idx_processed_month
            ON processed_reports(month);
        CREATE INDEX IF NOT EXISTS idx_processed_season
            ON processed_reports(season);
        CREATE INDEX IF NOT EXISTS idx_processed_species
            ON processed_reports(species_caught);
        CREATE INDEX IF NOT EXISTS idx_processed_location
            ON processed_reports(location);
        "#,
    )?;
    Ok(())
}

/// Serialize a naive datetime for storage.
pub(crate) fn store_naive(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse an optional naive datetime from the database, tolerating the
/// formats the scraper and extractor produce.
pub(crate) fn parse_naive_opt(s: Option<String>) -> Option<NaiveDateTime> {
    let s = s?;
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a UTC timestamp from the database, defaulting to the Unix epoch.
pub(crate) fn parse_utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
