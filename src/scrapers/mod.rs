//! Scraper for the Lake-Link fishing report archive.

mod lakelink;

pub use lakelink::{LakeLinkScraper, PageParser, ScrapeSummary};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Configuration for the Lake-Link scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Report archive URL for the target lake.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Login page, fetched first to establish session cookies.
    #[serde(default = "default_login_page_url")]
    pub login_page_url: String,
    /// Authentication endpoint.
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// Account email; read from `LAKELINK_EMAIL`, never the config file.
    #[serde(skip)]
    pub email: Option<String>,
    /// Account password; read from `LAKELINK_PASSWORD`.
    #[serde(skip)]
    pub password: Option<String>,
    /// Reports requested per page.
    #[serde(default = "default_records_per_page")]
    pub records_per_page: usize,
    /// Delay between page requests in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://www.lake-link.com/wisconsin-fishing-reports/delavan-lake-walworth-county/4470/"
        .to_string()
}
fn default_login_page_url() -> String {
    "https://www.lake-link.com/login/".to_string()
}
fn default_login_url() -> String {
    "https://www.lake-link.com/assets/cfcs/authenticate.cfc?method=authenticateUser".to_string()
}
fn default_records_per_page() -> usize {
    50
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_page_url: default_login_page_url(),
            login_url: default_login_url(),
            email: None,
            password: None,
            records_per_page: default_records_per_page(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// One report parsed out of an archive page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedReport {
    /// Numeric post id from the report's `post-id-*` element.
    pub post_id: i64,
    pub date_posted: Option<chrono::NaiveDateTime>,
    pub username: Option<String>,
    pub raw_content: String,
    pub weather_badge: Option<String>,
    /// Comma-joined image URLs.
    pub image_urls: Option<String>,
}

/// Errors from a scrape run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}
