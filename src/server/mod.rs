//! Read-only query API over the processed report store.
//!
//! Every endpoint is a plain filtered or grouped read; the server never
//! writes. Responses are JSON only.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::repository::{ProcessedReportRepository, RawReportRepository};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub raw_repo: Arc<RawReportRepository>,
    pub processed_repo: Arc<ProcessedReportRepository>,
}

impl AppState {
    pub fn new(raw_repo: RawReportRepository, processed_repo: ProcessedReportRepository) -> Self {
        Self {
            raw_repo: Arc::new(raw_repo),
            processed_repo: Arc::new(processed_repo),
        }
    }
}

/// Start the web server.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::models::{NewProcessedReport, NewRawReport, Season};

    async fn setup_test_app() -> (axum::Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = dir.path().join("test.db");
        let raw = RawReportRepository::new(&db).unwrap();
        let processed = ProcessedReportRepository::new(&db).unwrap();

        for (id, month, species, depth) in [
            (1, 1, "Bluegill, Crappie", Some(8.0)),
            (2, 1, "Bluegill", Some(12.0)),
            (3, 7, "Largemouth Bass", None),
        ] {
            raw.upsert(&NewRawReport {
                id,
                date_posted: NaiveDate::from_ymd_opt(2024, month, 10)
                    .unwrap()
                    .and_hms_opt(7, 0, 0),
                username: Some("angler".to_string()),
                raw_content: format!("report {}", id),
                weather_badge: None,
                image_urls: None,
            })
            .unwrap();

            processed
                .insert(&NewProcessedReport {
                    raw_report_id: id,
                    date_posted: NaiveDate::from_ymd_opt(2024, month, 10)
                        .unwrap()
                        .and_hms_opt(7, 0, 0),
                    month: Some(month),
                    season: Season::from_month(month),
                    species_caught: Some(species.to_string()),
                    species_targeted: None,
                    bait_lure: Some("jigs".to_string()),
                    location: Some("north shore".to_string()),
                    water_depth_feet: depth,
                    water_temp_f: None,
                    air_temp_f: Some(25.0),
                    weather_conditions: Some("sunny".to_string()),
                    ice_thickness_inches: None,
                    notes: None,
                })
                .unwrap();
        }

        (create_router(AppState::new(raw, processed)), dir)
    }

    async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let (app, _dir) = setup_test_app().await;
        let (status, body) = get_json(&app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"]["/reports"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = setup_test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reports_and_pagination() {
        let (app, _dir) = setup_test_app().await;

        let (status, body) = get_json(&app, "/reports").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (_, body) = get_json(&app, "/reports?limit=1&offset=1").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reports_by_month_validates_range() {
        let (app, _dir) = setup_test_app().await;

        let (status, body) = get_json(&app, "/reports/month/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, _) = get_json(&app, "/reports/month/13").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reports_by_species() {
        let (app, _dir) = setup_test_app().await;
        let (status, body) = get_json(&app, "/reports/species/bluegill").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_with_filters() {
        let (app, _dir) = setup_test_app().await;

        let (status, body) =
            get_json(&app, "/reports/search?season=winter&min_depth=10").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["species_caught"], "Bluegill");
        assert_eq!(rows[0]["raw_content"], "report 2");

        let (status, _) = get_json(&app, "/reports/search?season=monsoon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_species_counts() {
        let (app, _dir) = setup_test_app().await;
        let (status, body) = get_json(&app, "/species").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows[0]["species"], "Bluegill");
    }

    #[tokio::test]
    async fn test_months_locations_stats() {
        let (app, _dir) = setup_test_app().await;

        let (_, months) = get_json(&app, "/months").await;
        assert_eq!(months.as_array().unwrap().len(), 2);
        assert_eq!(months[0]["month_name"], "January");

        let (_, locations) = get_json(&app, "/locations").await;
        assert_eq!(locations[0]["location"], "north shore");
        assert_eq!(locations[0]["count"], 3);

        let (_, stats) = get_json(&app, "/stats").await;
        assert_eq!(stats["raw_reports"], 3);
        assert_eq!(stats["processed_reports"], 3);
    }

    #[tokio::test]
    async fn test_recommendations_for_month() {
        let (app, _dir) = setup_test_app().await;
        let (status, body) = get_json(&app, "/recommendations?month=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["month"], 1);
        assert_eq!(body["month_name"], "January");
        assert!(!body["recommendations"].as_array().unwrap().is_empty());
    }
}
