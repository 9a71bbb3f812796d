//! Extraction prompt construction.
//!
//! The prompt carries the domain grounding for the target lake: known
//! species, the location vocabulary anglers use, and common baits. The
//! model is told to prefer null over guessing so that absent fields stay
//! absent downstream.

use crate::models::RawReport;

/// Prompt template. `{date_posted}`, `{weather_badge}` and `{content}` are
/// replaced per report.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert at extracting structured fishing information from fishing reports.

Analyze the following fishing report and extract the relevant information. Return ONLY valid JSON with the following structure:

{
    "date_posted": "ISO format date if available, or null",
    "month": 1-12 integer for the month, or null if unknown,
    "water_depth_feet": number in feet, or null if not mentioned,
    "species_caught": "comma-separated list of fish species actually caught",
    "species_targeted": "comma-separated list of fish species they were trying to catch",
    "bait_lure": "comma-separated list of baits or lures used",
    "location": "specific location on the lake if mentioned",
    "water_temp_f": number in Fahrenheit, or null if not mentioned,
    "air_temp_f": number in Fahrenheit, or null if not mentioned,
    "weather_conditions": "sunny, cloudy, partly cloudy, rainy, snowy, etc.",
    "ice_thickness_inches": number in inches if ice fishing, or null,
    "notes": "any other relevant fishing tips or observations"
}

Common fish species in Delavan Lake include: Largemouth Bass, Smallmouth Bass, Walleye, Northern Pike, Musky (Muskellunge), Bluegill, Crappie, Perch, Catfish, Carp, Panfish.

For location, look for references to: weed beds, drop-offs, points, bays, north/south/east/west shore, specific road names, depth contours, structures.

For bait/lures, look for: minnows, nightcrawlers, worms, jigs, crankbaits, spinnerbaits, soft plastics, live bait, tip-ups, jigging spoons, etc.

If information is not explicitly stated, use null rather than guessing.

FISHING REPORT:
Date: {date_posted}
Weather Badge: {weather_badge}
Content: {content}

Return ONLY the JSON object, no other text."#;

/// System message sent with every extraction request.
pub const SYSTEM_PROMPT: &str = "You are a fishing report analyzer. Return only valid JSON.";

/// Build the extraction prompt for one report, truncating oversized bodies.
pub fn build_extraction_prompt(report: &RawReport, max_content_chars: usize) -> String {
    let date = report
        .date_posted
        .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "Not specified".to_string());
    let badge = report.weather_badge.as_deref().unwrap_or("Not specified");
    let content = truncate_content(&report.raw_content, max_content_chars);

    EXTRACTION_PROMPT
        .replace("{date_posted}", &date)
        .replace("{weather_badge}", badge)
        .replace("{content}", content)
}

/// Truncate to a maximum byte length at a valid UTF-8 boundary.
fn truncate_content(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn report(content: &str) -> RawReport {
        RawReport {
            id: 501,
            date_posted: NaiveDate::from_ymd_opt(2024, 1, 14)
                .unwrap()
                .and_hms_opt(19, 25, 0),
            username: Some("icehound".to_string()),
            raw_content: content.to_string(),
            weather_badge: Some("Sunny 25°".to_string()),
            image_urls: None,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_includes_report_fields() {
        let prompt = build_extraction_prompt(&report("Caught 15 bluegill on waxies."), 12000);
        assert!(prompt.contains("Date: 2024-01-14T19:25:00"));
        assert!(prompt.contains("Weather Badge: Sunny 25°"));
        assert!(prompt.contains("Caught 15 bluegill on waxies."));
        assert!(prompt.contains("Delavan Lake"));
        assert!(!prompt.contains("{content}"));
    }

    #[test]
    fn test_missing_date_and_badge_marked_unspecified() {
        let mut r = report("short");
        r.date_posted = None;
        r.weather_badge = None;
        let prompt = build_extraction_prompt(&r, 12000);
        assert!(prompt.contains("Date: Not specified"));
        assert!(prompt.contains("Weather Badge: Not specified"));
    }

    #[test]
    fn test_truncation_respects_utf8_boundaries() {
        let text = "ééééé";
        let truncated = truncate_content(text, 3);
        assert_eq!(truncated, "é");
        assert!(truncate_content("short", 100).len() == 5);
    }
}
