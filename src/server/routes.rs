//! Router configuration for the query API.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/reports", get(handlers::list_reports))
        .route("/reports/month/:month", get(handlers::reports_by_month))
        .route("/reports/species/:species", get(handlers::reports_by_species))
        .route("/reports/search", get(handlers::search_reports))
        .route("/species", get(handlers::species_counts))
        .route("/months", get(handlers::monthly_stats))
        .route("/locations", get(handlers::location_stats))
        .route("/stats", get(handlers::stats))
        .route("/recommendations", get(handlers::recommendations))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
