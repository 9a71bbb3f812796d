//! Processed report store.
//!
//! One row per raw report, written at most once by the pipeline. The UNIQUE
//! constraint on `raw_report_id` is what enforces at-most-once extraction:
//! a duplicate insert from a concurrent run is reported as
//! `AlreadyProcessed`, not an error. Rows are never updated or deleted here.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{parse_naive_opt, parse_utc, store_naive, Result};
use crate::models::{NewProcessedReport, ProcessedReport, Season};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("Unknown")
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Row written; carries the new row id.
    Inserted(i64),
    /// A row for this raw report already exists (written by a concurrent
    /// run); treated as success-equivalent by callers.
    AlreadyProcessed,
}

/// Filters for the report search query. All optional and ANDed together.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub month: Option<u32>,
    pub season: Option<Season>,
    pub species: Option<String>,
    pub location: Option<String>,
    pub weather: Option<String>,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// A processed report joined with the raw post it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub report: ProcessedReport,
    pub raw_content: String,
    pub username: Option<String>,
    pub image_urls: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesCount {
    pub species: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStats {
    pub month: u32,
    pub month_name: &'static str,
    pub report_count: u64,
    pub avg_water_temp: Option<f64>,
    pub avg_air_temp: Option<f64>,
    pub top_species: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationStats {
    pub location: String,
    pub count: u64,
    pub avg_depth: Option<f64>,
    pub species: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub species: String,
    pub location: Option<String>,
    pub bait_lure: Option<String>,
    pub depth_feet: Option<f64>,
    pub weather: Option<String>,
    pub success_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub raw_reports: u64,
    pub processed_reports: u64,
    pub top_species: Vec<SpeciesCount>,
}

/// SQLite-backed repository for extracted reports.
#[derive(Clone)]
pub struct ProcessedReportRepository {
    db_path: PathBuf,
}

impl ProcessedReportRepository {
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

    /// Insert a processed report, at most once per raw report.
    pub fn insert(&self, report: &NewProcessedReport) -> Result<InsertOutcome> {
        let conn = self.connect()?;

        let result = conn.execute(
            r#"
            INSERT INTO processed_reports
                (raw_report_id, date_posted, month, season, species_caught,
                 species_targeted, bait_lure, location, water_depth_feet,
                 water_temp_f, air_temp_f, weather_conditions,
                 ice_thickness_inches, notes, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                report.raw_report_id,
                report.date_posted.as_ref().map(store_naive),
                report.month,
                report.season.map(|s| s.as_str()),
                report.species_caught,
                report.species_targeted,
                report.bait_lure,
                report.location,
                report.water_depth_feet,
                report.water_temp_f,
                report.air_temp_f,
                report.weather_conditions,
                report.ice_thickness_inches,
                report.notes,
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Ok(InsertOutcome::AlreadyProcessed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get the processed row for a raw report, if any.
    pub fn get_by_raw_id(&self, raw_report_id: i64) -> Result<Option<ProcessedReport>> {
        let conn = self.connect()?;
        let report = conn
            .query_row(
                "SELECT * FROM processed_reports WHERE raw_report_id = ?1",
                params![raw_report_id],
                row_to_processed,
            )
            .optional()?;
        Ok(report)
    }

    /// Count all processed reports.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM processed_reports", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Search processed reports with optional filters, newest first.
    pub fn search(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>> {
        let conn = self.connect()?;

        let mut sql = String::from(
            r#"
            SELECT p.*, r.raw_content, r.username, r.image_urls
            FROM processed_reports p
            JOIN raw_reports r ON p.raw_report_id = r.id
            WHERE 1=1
            "#,
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(month) = filter.month {
            sql.push_str(" AND p.month = ?");
            params_vec.push(Box::new(month));
        }
        if let Some(season) = filter.season {
            sql.push_str(" AND p.season = ?");
            params_vec.push(Box::new(season.as_str().to_string()));
        }
        if let Some(species) = &filter.species {
            sql.push_str(" AND (p.species_caught LIKE ? OR p.species_targeted LIKE ?)");
            let pattern = format!("%{}%", species);
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern));
        }
        if let Some(location) = &filter.location {
            sql.push_str(" AND p.location LIKE ?");
            params_vec.push(Box::new(format!("%{}%", location)));
        }
        if let Some(weather) = &filter.weather {
            sql.push_str(" AND p.weather_conditions LIKE ?");
            params_vec.push(Box::new(format!("%{}%", weather)));
        }
        if let Some(min_depth) = filter.min_depth {
            sql.push_str(" AND p.water_depth_feet >= ?");
            params_vec.push(Box::new(min_depth));
        }
        if let Some(max_depth) = filter.max_depth {
            sql.push_str(" AND p.water_depth_feet <= ?");
            params_vec.push(Box::new(max_depth));
        }

        sql.push_str(" ORDER BY p.date_posted DESC LIMIT ? OFFSET ?");
        params_vec.push(Box::new(filter.limit.map(|l| l as i64).unwrap_or(100)));
        params_vec.push(Box::new(filter.offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), row_to_report_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Per-species report counts, most common first.
    pub fn species_counts(&self) -> Result<Vec<SpeciesCount>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT species_caught, COUNT(*) as count
            FROM processed_reports
            WHERE species_caught IS NOT NULL AND species_caught != ''
            GROUP BY species_caught
            ORDER BY count DESC
            "#,
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(SpeciesCount {
                    species: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Per-month aggregates over all processed reports.
    pub fn monthly_stats(&self) -> Result<Vec<MonthlyStats>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                month,
                COUNT(*) as report_count,
                AVG(water_temp_f) as avg_water_temp,
                AVG(air_temp_f) as avg_air_temp,
                GROUP_CONCAT(DISTINCT species_caught) as species
            FROM processed_reports
            WHERE month IS NOT NULL
            GROUP BY month
            ORDER BY month
            "#,
        )?;
        let stats = stmt
            .query_map([], |row| {
                let month: u32 = row.get(0)?;
                Ok(MonthlyStats {
                    month,
                    month_name: month_name(month),
                    report_count: row.get::<_, i64>(1)? as u64,
                    avg_water_temp: row.get::<_, Option<f64>>(2)?.map(round1),
                    avg_air_temp: row.get::<_, Option<f64>>(3)?.map(round1),
                    top_species: split_species(row.get(4)?, 5),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Per-location aggregates, busiest locations first.
    pub fn location_stats(&self) -> Result<Vec<LocationStats>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                location,
                COUNT(*) as count,
                AVG(water_depth_feet) as avg_depth,
                GROUP_CONCAT(DISTINCT species_caught) as species
            FROM processed_reports
            WHERE location IS NOT NULL AND location != ''
            GROUP BY location
            ORDER BY count DESC
            "#,
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(LocationStats {
                    location: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    avg_depth: row.get::<_, Option<f64>>(2)?.map(round1),
                    species: split_species(row.get(3)?, 10),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Top (species, location, bait) combinations for a month, ranked by how
    /// often they appear in reports.
    pub fn recommendations(
        &self,
        month: u32,
        species: Option<&str>,
    ) -> Result<Vec<Recommendation>> {
        let conn = self.connect()?;

        let mut sql = String::from(
            r#"
            SELECT
                species_caught,
                location,
                bait_lure,
                water_depth_feet,
                weather_conditions,
                COUNT(*) as success_count
            FROM processed_reports
            WHERE month = ?
            "#,
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(month) as Box<dyn rusqlite::ToSql>];

        if let Some(species) = species {
            sql.push_str(" AND species_caught LIKE ?");
            params_vec.push(Box::new(format!("%{}%", species)));
        }

        sql.push_str(
            r#"
            AND species_caught IS NOT NULL AND species_caught != ''
            GROUP BY species_caught, location, bait_lure
            ORDER BY success_count DESC
            LIMIT 20
            "#,
        );

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let recs = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(Recommendation {
                    species: row.get(0)?,
                    location: row.get(1)?,
                    bait_lure: row.get(2)?,
                    depth_feet: row.get(3)?,
                    weather: row.get(4)?,
                    success_count: row.get::<_, i64>(5)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(recs)
    }

    /// Store-wide counts plus the ten most reported species.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.connect()?;
        let raw_reports: i64 =
            conn.query_row("SELECT COUNT(*) FROM raw_reports", [], |row| row.get(0))?;
        let processed_reports: i64 =
            conn.query_row("SELECT COUNT(*) FROM processed_reports", [], |row| row.get(0))?;
        drop(conn);

        let mut top_species = self.species_counts()?;
        top_species.truncate(10);

        Ok(StoreStats {
            raw_reports: raw_reports as u64,
            processed_reports: processed_reports as u64,
            top_species,
        })
    }

    pub async fn insert_async(&self, report: NewProcessedReport) -> Result<InsertOutcome> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.insert(&report)).await?
    }

    pub async fn search_async(&self, filter: ReportFilter) -> Result<Vec<ReportRow>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.search(&filter)).await?
    }

    pub async fn species_counts_async(&self) -> Result<Vec<SpeciesCount>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.species_counts()).await?
    }

    pub async fn monthly_stats_async(&self) -> Result<Vec<MonthlyStats>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.monthly_stats()).await?
    }

    pub async fn location_stats_async(&self) -> Result<Vec<LocationStats>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.location_stats()).await?
    }

    pub async fn recommendations_async(
        &self,
        month: u32,
        species: Option<String>,
    ) -> Result<Vec<Recommendation>> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.recommendations(month, species.as_deref())).await?
    }

    pub async fn stats_async(&self) -> Result<StoreStats> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.stats()).await?
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Split a GROUP_CONCAT of comma-joined species lists into distinct names.
fn split_species(joined: Option<String>, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(joined) = joined {
        for part in joined.split(',') {
            let name = part.trim();
            if name.is_empty() || out.iter().any(|s| s == name) {
                continue;
            }
            out.push(name.to_string());
            if out.len() == limit {
                break;
            }
        }
    }
    out
}

fn row_to_processed(row: &Row<'_>) -> rusqlite::Result<ProcessedReport> {
    let date_posted: Option<String> = row.get("date_posted")?;
    let season: Option<String> = row.get("season")?;
    let processed_at: String = row.get("processed_at")?;
    Ok(ProcessedReport {
        id: row.get("id")?,
        raw_report_id: row.get("raw_report_id")?,
        date_posted: parse_naive_opt(date_posted),
        month: row.get("month")?,
        season: season.as_deref().and_then(Season::from_str),
        species_caught: row.get("species_caught")?,
        species_targeted: row.get("species_targeted")?,
        bait_lure: row.get("bait_lure")?,
        location: row.get("location")?,
        water_depth_feet: row.get("water_depth_feet")?,
        water_temp_f: row.get("water_temp_f")?,
        air_temp_f: row.get("air_temp_f")?,
        weather_conditions: row.get("weather_conditions")?,
        ice_thickness_inches: row.get("ice_thickness_inches")?,
        notes: row.get("notes")?,
        processed_at: parse_utc(&processed_at),
    })
}

fn row_to_report_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        report: row_to_processed(row)?,
        raw_content: row.get("raw_content")?,
        username: row.get("username")?,
        image_urls: row.get("image_urls")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRawReport;
    use crate::repository::RawReportRepository;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn seed_raw(raw: &RawReportRepository, id: i64) {
        raw.upsert(&NewRawReport {
            id,
            date_posted: NaiveDate::from_ymd_opt(2024, 1, 14)
                .unwrap()
                .and_hms_opt(7, 0, 0),
            username: Some("angler".to_string()),
            raw_content: format!("report {}", id),
            weather_badge: None,
            image_urls: None,
        })
        .unwrap();
    }

    fn row(raw_report_id: i64, month: u32, species: &str) -> NewProcessedReport {
        NewProcessedReport {
            raw_report_id,
            date_posted: NaiveDate::from_ymd_opt(2024, month, 10)
                .unwrap()
                .and_hms_opt(7, 0, 0),
            month: Some(month),
            season: Season::from_month(month),
            species_caught: Some(species.to_string()),
            species_targeted: None,
            bait_lure: Some("waxies".to_string()),
            location: Some("north shore weed beds".to_string()),
            water_depth_feet: Some(8.0),
            water_temp_f: None,
            air_temp_f: Some(25.0),
            weather_conditions: Some("sunny".to_string()),
            ice_thickness_inches: Some(10.0),
            notes: None,
        }
    }

    fn setup() -> (tempfile::TempDir, RawReportRepository, ProcessedReportRepository) {
        let dir = tempdir().unwrap();
        let db = dir.path().join("test.db");
        let raw = RawReportRepository::new(&db).unwrap();
        let processed = ProcessedReportRepository::new(&db).unwrap();
        (dir, raw, processed)
    }

    #[test]
    fn test_insert_is_at_most_once() {
        let (_dir, raw, processed) = setup();
        seed_raw(&raw, 501);

        match processed.insert(&row(501, 1, "Bluegill, Crappie")).unwrap() {
            InsertOutcome::Inserted(id) => assert!(id > 0),
            other => panic!("expected insert, got {:?}", other),
        }

        // Second insert for the same raw report is a conflict, not an error.
        assert_eq!(
            processed.insert(&row(501, 1, "Bluegill")).unwrap(),
            InsertOutcome::AlreadyProcessed
        );
        assert_eq!(processed.count().unwrap(), 1);

        // The original row is untouched.
        let stored = processed.get_by_raw_id(501).unwrap().unwrap();
        assert_eq!(stored.species_caught.as_deref(), Some("Bluegill, Crappie"));
    }

    #[test]
    fn test_processed_rows_leave_unprocessed_selection() {
        let (_dir, raw, processed) = setup();
        seed_raw(&raw, 1);
        seed_raw(&raw, 2);

        processed.insert(&row(1, 1, "Walleye")).unwrap();

        let pending = raw.get_unprocessed(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 2);
    }

    #[test]
    fn test_search_filters() {
        let (_dir, raw, processed) = setup();
        for id in 1..=3 {
            seed_raw(&raw, id);
        }
        processed.insert(&row(1, 1, "Bluegill")).unwrap();
        processed.insert(&row(2, 1, "Walleye")).unwrap();
        processed.insert(&row(3, 7, "Largemouth Bass")).unwrap();

        let by_month = processed
            .search(&ReportFilter {
                month: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_month.len(), 2);

        let by_season = processed
            .search(&ReportFilter {
                season: Some(Season::Summer),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_season.len(), 1);
        assert_eq!(
            by_season[0].report.species_caught.as_deref(),
            Some("Largemouth Bass")
        );

        let by_species = processed
            .search(&ReportFilter {
                species: Some("walleye".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_species.len(), 1);

        let by_depth = processed
            .search(&ReportFilter {
                min_depth: Some(5.0),
                max_depth: Some(10.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_depth.len(), 3);

        let none = processed
            .search(&ReportFilter {
                min_depth: Some(20.0),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_aggregates() {
        let (_dir, raw, processed) = setup();
        for id in 1..=3 {
            seed_raw(&raw, id);
        }
        processed.insert(&row(1, 1, "Bluegill")).unwrap();
        processed.insert(&row(2, 1, "Bluegill")).unwrap();
        processed.insert(&row(3, 7, "Walleye")).unwrap();

        let species = processed.species_counts().unwrap();
        assert_eq!(species[0].species, "Bluegill");
        assert_eq!(species[0].count, 2);

        let monthly = processed.monthly_stats().unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].month, 1);
        assert_eq!(monthly[0].month_name, "January");
        assert_eq!(monthly[0].report_count, 2);
        assert_eq!(monthly[0].avg_air_temp, Some(25.0));
        assert_eq!(monthly[0].avg_water_temp, None);

        let locations = processed.location_stats().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].count, 3);
        assert_eq!(locations[0].avg_depth, Some(8.0));

        let recs = processed.recommendations(1, None).unwrap();
        assert_eq!(recs[0].species, "Bluegill");
        assert_eq!(recs[0].success_count, 2);
        assert!(processed.recommendations(1, Some("Walleye")).unwrap().is_empty());

        let stats = processed.stats().unwrap();
        assert_eq!(stats.raw_reports, 3);
        assert_eq!(stats.processed_reports, 3);
        assert_eq!(stats.top_species.len(), 2);
    }

    #[test]
    fn test_split_species_dedupes() {
        let joined = Some("Bluegill, Crappie,Bluegill, Perch".to_string());
        assert_eq!(split_species(joined, 10), vec!["Bluegill", "Crappie", "Perch"]);
        assert!(split_species(None, 5).is_empty());
    }
}
