//! Raw report store.
//!
//! Written by the scraper (upsert keyed on the source post id), read by the
//! extraction pipeline. The pipeline never writes here.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_naive_opt, parse_utc, store_naive, Result};
use crate::models::{NewRawReport, RawReport};

/// SQLite-backed repository for scraped reports.
#[derive(Clone)]
pub struct RawReportRepository {
    db_path: PathBuf,
}

impl RawReportRepository {
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        let conn = repo.connect()?;
        super::init_schema(&conn)?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    /// Insert or overwrite a scraped report, keyed on the source post id.
    /// Returns true when the report was new.
    pub fn upsert(&self, report: &NewRawReport) -> Result<bool> {
        let conn = self.connect()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM raw_reports WHERE id = ?1",
                params![report.id],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            r#"
            INSERT INTO raw_reports
                (id, date_posted, username, raw_content, weather_badge, image_urls, scraped_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                date_posted = excluded.date_posted,
                username = excluded.username,
                raw_content = excluded.raw_content,
                weather_badge = excluded.weather_badge,
                image_urls = excluded.image_urls,
                scraped_at = excluded.scraped_at
            "#,
            params![
                report.id,
                report.date_posted.as_ref().map(store_naive),
                report.username,
                report.raw_content,
                report.weather_badge,
                report.image_urls,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(existing.is_none())
    }

    /// Get a report by post id.
    pub fn get(&self, id: i64) -> Result<Option<RawReport>> {
        let conn = self.connect()?;
        let report = conn
            .query_row(
                "SELECT * FROM raw_reports WHERE id = ?1",
                params![id],
                row_to_raw_report,
            )
            .optional()?;
        Ok(report)
    }

    /// Count all scraped reports.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM raw_reports", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Reports with no processed row yet, oldest post id first so repeated
    /// runs work through the backlog deterministically.
    pub fn get_unprocessed(&self, limit: Option<usize>) -> Result<Vec<RawReport>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT r.* FROM raw_reports r
            LEFT JOIN processed_reports p ON p.raw_report_id = r.id
            WHERE p.id IS NULL
            ORDER BY r.id ASC
            LIMIT ?1
            "#,
        )?;

        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let reports = stmt
            .query_map(params![limit], row_to_raw_report)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    /// Count reports with no processed row.
    pub fn count_unprocessed(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM raw_reports r
            LEFT JOIN processed_reports p ON p.raw_report_id = r.id
            WHERE p.id IS NULL
            "#,
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub async fn get_unprocessed_async(&self, limit: Option<usize>) -> Result<Vec<RawReport>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.get_unprocessed(limit)).await?
    }

    pub async fn count_async(&self) -> Result<u64> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.count()).await?
    }

    pub async fn count_unprocessed_async(&self) -> Result<u64> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.count_unprocessed()).await?
    }
}

fn row_to_raw_report(row: &Row<'_>) -> rusqlite::Result<RawReport> {
    let date_posted: Option<String> = row.get("date_posted")?;
    let scraped_at: String = row.get("scraped_at")?;
    Ok(RawReport {
        id: row.get("id")?,
        date_posted: parse_naive_opt(date_posted),
        username: row.get("username")?,
        raw_content: row.get("raw_content")?,
        weather_badge: row.get("weather_badge")?,
        image_urls: row.get("image_urls")?,
        scraped_at: parse_utc(&scraped_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn new_report(id: i64, content: &str) -> NewRawReport {
        NewRawReport {
            id,
            date_posted: NaiveDate::from_ymd_opt(2024, 1, 14)
                .unwrap()
                .and_hms_opt(19, 25, 0),
            username: Some("icehound".to_string()),
            raw_content: content.to_string(),
            weather_badge: Some("Sunny 25°".to_string()),
            image_urls: None,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let dir = tempdir().unwrap();
        let repo = RawReportRepository::new(&dir.path().join("test.db")).unwrap();

        assert!(repo.upsert(&new_report(501, "first pass")).unwrap());
        assert_eq!(repo.count().unwrap(), 1);

        // Re-scrape overwrites, does not duplicate.
        assert!(!repo.upsert(&new_report(501, "second pass")).unwrap());
        assert_eq!(repo.count().unwrap(), 1);

        let report = repo.get(501).unwrap().unwrap();
        assert_eq!(report.raw_content, "second pass");
        assert_eq!(report.username.as_deref(), Some("icehound"));
        assert!(report.date_posted.is_some());
    }

    #[test]
    fn test_unprocessed_selection_is_ordered_and_limited() {
        let dir = tempdir().unwrap();
        let repo = RawReportRepository::new(&dir.path().join("test.db")).unwrap();

        for id in [30, 10, 20] {
            repo.upsert(&new_report(id, "report")).unwrap();
        }

        let all = repo.get_unprocessed(None).unwrap();
        let ids: Vec<i64> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        let capped = repo.get_unprocessed(Some(2)).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].id, 10);
        assert_eq!(repo.count_unprocessed().unwrap(), 3);
    }
}
