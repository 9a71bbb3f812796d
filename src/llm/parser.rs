//! Lenient parsing of extraction responses.
//!
//! The service is asked for a single JSON object but models wander: fences,
//! stray prose around the object, numbers quoted as strings. A response that
//! is not a JSON object at all is a malformed response; within an object,
//! any field that is absent or the wrong type becomes `None`.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use super::client::ExtractionError;
use crate::models::ExtractedFields;

/// Parse the model's reply into extracted fields.
pub fn parse_extraction(response: &str) -> Result<ExtractedFields, ExtractionError> {
    let json_str = strip_code_fences(response);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| ExtractionError::MalformedResponse(format!("JSON parse error: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ExtractionError::MalformedResponse("expected a JSON object".to_string()))?;

    // The model's "season" is deliberately ignored; season is derived from
    // the month when the row is built.
    Ok(ExtractedFields {
        date_posted: string_field(obj, "date_posted").and_then(|s| parse_loose_datetime(&s)),
        month: month_field(obj),
        species_caught: string_field(obj, "species_caught"),
        species_targeted: string_field(obj, "species_targeted"),
        bait_lure: string_field(obj, "bait_lure"),
        location: string_field(obj, "location"),
        water_depth_feet: number_field(obj, "water_depth_feet"),
        water_temp_f: number_field(obj, "water_temp_f"),
        air_temp_f: number_field(obj, "air_temp_f"),
        weather_conditions: string_field(obj, "weather_conditions"),
        ice_thickness_inches: number_field(obj, "ice_thickness_inches"),
        notes: string_field(obj, "notes"),
    })
}

/// Strip a markdown code fence wrapper, if present.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed
        .trim_start_matches("```")
        .trim_start_matches("json")
        .trim_start_matches("JSON");
    inner.trim_end_matches("```").trim()
}

/// A non-empty string field; null, absent or other types become None.
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let s = obj.get(key)?.as_str()?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("unknown") {
        return None;
    }
    Some(s.to_string())
}

/// A numeric field; accepts JSON numbers and numeric strings like "8".
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = obj.get(key)?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|v| v.is_finite())
}

/// A 1-12 month; anything else is None.
fn month_field(obj: &Map<String, Value>) -> Option<u32> {
    let month = number_field(obj, "month")?;
    let month = month as i64;
    (1..=12).contains(&month).then_some(month as u32)
}

/// Parse the date formats the model actually produces.
fn parse_loose_datetime(s: &str) -> Option<NaiveDateTime> {
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
