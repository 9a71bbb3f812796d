//! API endpoint handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Datelike;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::models::Season;
use crate::repository::{
    month_name, LocationStats, MonthlyStats, Recommendation, ReportFilter, ReportRow,
    SpeciesCount, StoreStats,
};

type ApiError = (StatusCode, Json<serde_json::Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message })),
    )
}

fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    warn!("query failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "report store unavailable" })),
    )
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(100).clamp(1, 1000)
}

fn validate_month(month: u32) -> Result<u32, ApiError> {
    if (1..=12).contains(&month) {
        Ok(month)
    } else {
        Err(bad_request("month must be between 1 and 12"))
    }
}

/// API root: service banner plus endpoint map.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Delavan Lake Fishing Reports API",
        "endpoints": {
            "/reports": "Get all processed reports",
            "/reports/month/{month}": "Get reports for a specific month (1-12)",
            "/reports/species/{species}": "Get reports for a specific species",
            "/reports/search": "Search reports with filters",
            "/species": "Get list of all species with counts",
            "/months": "Get statistics by month",
            "/locations": "Get location statistics",
            "/stats": "Get database statistics",
            "/recommendations": "Top species/bait/location combinations by month"
        }
    }))
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// All processed reports, newest first, with pagination.
pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<ReportRow>> {
    let filter = ReportFilter {
        limit: Some(clamp_limit(params.limit)),
        offset: params.offset.unwrap_or(0),
        ..Default::default()
    };
    let rows = state
        .processed_repo
        .search_async(filter)
        .await
        .map_err(internal_error)?;
    Ok(Json(rows))
}

/// Reports posted in a given month.
pub async fn reports_by_month(
    State(state): State<AppState>,
    Path(month): Path<u32>,
) -> ApiResult<Vec<ReportRow>> {
    let month = validate_month(month)?;
    let filter = ReportFilter {
        month: Some(month),
        ..Default::default()
    };
    let rows = state
        .processed_repo
        .search_async(filter)
        .await
        .map_err(internal_error)?;
    Ok(Json(rows))
}

/// Reports mentioning a species, caught or targeted.
pub async fn reports_by_species(
    State(state): State<AppState>,
    Path(species): Path<String>,
) -> ApiResult<Vec<ReportRow>> {
    let filter = ReportFilter {
        species: Some(species),
        ..Default::default()
    };
    let rows = state
        .processed_repo
        .search_async(filter)
        .await
        .map_err(internal_error)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub month: Option<u32>,
    pub season: Option<String>,
    pub species: Option<String>,
    pub location: Option<String>,
    pub weather: Option<String>,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Search reports with multiple filters.
pub async fn search_reports(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<ReportRow>> {
    let month = params.month.map(validate_month).transpose()?;
    let season = params
        .season
        .as_deref()
        .map(|s| {
            Season::from_str(&s.to_lowercase())
                .ok_or_else(|| bad_request("season must be one of winter, spring, summer, fall"))
        })
        .transpose()?;

    let filter = ReportFilter {
        month,
        season,
        species: params.species,
        location: params.location,
        weather: params.weather,
        min_depth: params.min_depth,
        max_depth: params.max_depth,
        limit: Some(clamp_limit(params.limit)),
        offset: params.offset.unwrap_or(0),
    };
    let rows = state
        .processed_repo
        .search_async(filter)
        .await
        .map_err(internal_error)?;
    Ok(Json(rows))
}

/// All species with report counts.
pub async fn species_counts(State(state): State<AppState>) -> ApiResult<Vec<SpeciesCount>> {
    let counts = state
        .processed_repo
        .species_counts_async()
        .await
        .map_err(internal_error)?;
    Ok(Json(counts))
}

/// Per-month aggregates.
pub async fn monthly_stats(State(state): State<AppState>) -> ApiResult<Vec<MonthlyStats>> {
    let stats = state
        .processed_repo
        .monthly_stats_async()
        .await
        .map_err(internal_error)?;
    Ok(Json(stats))
}

/// Per-location aggregates.
pub async fn location_stats(State(state): State<AppState>) -> ApiResult<Vec<LocationStats>> {
    let stats = state
        .processed_repo
        .location_stats_async()
        .await
        .map_err(internal_error)?;
    Ok(Json(stats))
}

/// Store-wide statistics.
pub async fn stats(State(state): State<AppState>) -> ApiResult<StoreStats> {
    let stats = state
        .processed_repo
        .stats_async()
        .await
        .map_err(internal_error)?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    pub month: Option<u32>,
    pub species: Option<String>,
}

/// Fishing recommendations from historical data, defaulting to the current
/// month when none is given.
pub async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationParams>,
) -> ApiResult<serde_json::Value> {
    let month = match params.month {
        Some(month) => validate_month(month)?,
        None => chrono::Local::now().month(),
    };

    let recommendations: Vec<Recommendation> = state
        .processed_repo
        .recommendations_async(month, params.species)
        .await
        .map_err(internal_error)?;

    Ok(Json(json!({
        "month": month,
        "month_name": month_name(month),
        "recommendations": recommendations,
    })))
}
