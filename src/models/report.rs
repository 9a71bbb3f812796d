//! Report models for the raw and processed stores.
//!
//! A raw report is the free-text post as scraped from the archive, keyed by
//! the source's numeric post id. A processed report holds the structured
//! fields extracted from exactly one raw report.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Season of the year, derived from the month of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Fixed month-to-season mapping. Months outside 1-12 yield `None`.
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Self::Winter),
            3..=5 => Some(Self::Spring),
            6..=8 => Some(Self::Summer),
            9..=11 => Some(Self::Fall),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "winter" => Some(Self::Winter),
            "spring" => Some(Self::Spring),
            "summer" => Some(Self::Summer),
            "fall" => Some(Self::Fall),
            _ => None,
        }
    }
}

/// A scraped fishing report, exactly as posted on the source site.
///
/// Read-only to the extraction pipeline; only the scraper writes these rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReport {
    /// Source-assigned post id (primary key).
    pub id: i64,
    /// When the report was posted, if the site showed a parseable timestamp.
    pub date_posted: Option<NaiveDateTime>,
    /// Poster's username.
    pub username: Option<String>,
    /// Free-text body of the report.
    pub raw_content: String,
    /// Weather badge shown next to the post (e.g. "Sunny 40°").
    pub weather_badge: Option<String>,
    /// Comma-joined image URLs attached to the post.
    pub image_urls: Option<String>,
    /// When we scraped the report.
    pub scraped_at: DateTime<Utc>,
}

/// A raw report as produced by the scraper, before it has a `scraped_at`.
#[derive(Debug, Clone)]
pub struct NewRawReport {
    pub id: i64,
    pub date_posted: Option<NaiveDateTime>,
    pub username: Option<String>,
    pub raw_content: String,
    pub weather_badge: Option<String>,
    pub image_urls: Option<String>,
}

/// Structured fields returned by the extraction service for one report.
///
/// Every field is optional: the extractor legitimately finds none of them in
/// some reports, and absence is never an error. The service's own opinion on
/// the season is discarded; season is derived from the month downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub date_posted: Option<NaiveDateTime>,
    pub month: Option<u32>,
    pub species_caught: Option<String>,
    pub species_targeted: Option<String>,
    pub bait_lure: Option<String>,
    pub location: Option<String>,
    pub water_depth_feet: Option<f64>,
    pub water_temp_f: Option<f64>,
    pub air_temp_f: Option<f64>,
    pub weather_conditions: Option<String>,
    pub ice_thickness_inches: Option<f64>,
    pub notes: Option<String>,
}

/// The structured extraction result for one raw report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedReport {
    pub id: i64,
    pub raw_report_id: i64,
    pub date_posted: Option<NaiveDateTime>,
    pub month: Option<u32>,
    pub season: Option<Season>,
    pub species_caught: Option<String>,
    pub species_targeted: Option<String>,
    pub bait_lure: Option<String>,
    pub location: Option<String>,
    pub water_depth_feet: Option<f64>,
    pub water_temp_f: Option<f64>,
    pub air_temp_f: Option<f64>,
    pub weather_conditions: Option<String>,
    pub ice_thickness_inches: Option<f64>,
    pub notes: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// A processed report ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewProcessedReport {
    pub raw_report_id: i64,
    pub date_posted: Option<NaiveDateTime>,
    pub month: Option<u32>,
    pub season: Option<Season>,
    pub species_caught: Option<String>,
    pub species_targeted: Option<String>,
    pub bait_lure: Option<String>,
    pub location: Option<String>,
    pub water_depth_feet: Option<f64>,
    pub water_temp_f: Option<f64>,
    pub air_temp_f: Option<f64>,
    pub weather_conditions: Option<String>,
    pub ice_thickness_inches: Option<f64>,
    pub notes: Option<String>,
}

impl NewProcessedReport {
    /// Combine a raw report with its extracted fields.
    ///
    /// The posting date wins over the model's date guess only when the model
    /// returned none. Month comes from the date when one exists (the model's
    /// month is a fallback for undated reports with content cues), and season
    /// is always recomputed from the final month so the two derived fields
    /// can never disagree.
    pub fn from_extraction(raw: &RawReport, fields: ExtractedFields) -> Self {
        let date_posted = fields.date_posted.or(raw.date_posted);
        let month = date_posted.map(|d| d.month()).or(fields.month);
        let season = month.and_then(Season::from_month);

        Self {
            raw_report_id: raw.id,
            date_posted,
            month,
            season,
            species_caught: fields.species_caught,
            species_targeted: fields.species_targeted,
            bait_lure: fields.bait_lure,
            location: fields.location,
            water_depth_feet: fields.water_depth_feet,
            water_temp_f: fields.water_temp_f,
            air_temp_f: fields.air_temp_f,
            weather_conditions: fields.weather_conditions,
            ice_thickness_inches: fields.ice_thickness_inches,
            notes: fields.notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(id: i64, date: Option<NaiveDateTime>) -> RawReport {
        RawReport {
            id,
            date_posted: date,
            username: Some("angler".to_string()),
            raw_content: "test report".to_string(),
            weather_badge: None,
            image_urls: None,
            scraped_at: Utc::now(),
        }
    }

    fn datetime(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_season_mapping() {
        assert_eq!(Season::from_month(1), Some(Season::Winter));
        assert_eq!(Season::from_month(2), Some(Season::Winter));
        assert_eq!(Season::from_month(12), Some(Season::Winter));
        assert_eq!(Season::from_month(3), Some(Season::Spring));
        assert_eq!(Season::from_month(5), Some(Season::Spring));
        assert_eq!(Season::from_month(7), Some(Season::Summer));
        assert_eq!(Season::from_month(9), Some(Season::Fall));
        assert_eq!(Season::from_month(11), Some(Season::Fall));
        assert_eq!(Season::from_month(0), None);
        assert_eq!(Season::from_month(13), None);
    }

    #[test]
    fn test_season_is_deterministic() {
        for month in 1..=12 {
            assert_eq!(Season::from_month(month), Season::from_month(month));
        }
    }

    #[test]
    fn test_month_and_season_derived_from_date() {
        let fields = ExtractedFields {
            // The model disagreeing about month/season must not matter.
            month: Some(7),
            ..Default::default()
        };
        let row = NewProcessedReport::from_extraction(&raw(1, Some(datetime(2024, 1, 14))), fields);
        assert_eq!(row.month, Some(1));
        assert_eq!(row.season, Some(Season::Winter));
    }

    #[test]
    fn test_model_month_used_when_report_undated() {
        let fields = ExtractedFields {
            month: Some(7),
            ..Default::default()
        };
        let row = NewProcessedReport::from_extraction(&raw(2, None), fields);
        assert_eq!(row.date_posted, None);
        assert_eq!(row.month, Some(7));
        assert_eq!(row.season, Some(Season::Summer));
    }

    #[test]
    fn test_no_date_no_month_leaves_both_null() {
        let row = NewProcessedReport::from_extraction(&raw(3, None), ExtractedFields::default());
        assert_eq!(row.month, None);
        assert_eq!(row.season, None);
    }

    #[test]
    fn test_extracted_date_preferred_over_posting_date() {
        let fields = ExtractedFields {
            date_posted: Some(datetime(2023, 6, 2)),
            ..Default::default()
        };
        let row = NewProcessedReport::from_extraction(&raw(4, Some(datetime(2024, 1, 14))), fields);
        assert_eq!(row.date_posted, Some(datetime(2023, 6, 2)));
        assert_eq!(row.month, Some(6));
        assert_eq!(row.season, Some(Season::Summer));
    }
}
