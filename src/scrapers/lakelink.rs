//! Paginated scraping of the Lake-Link report archive.
//!
//! The archive serves server-rendered HTML pages of posts, newest first,
//! with `startRow`/`recordsToDisplay` pagination. Authenticated sessions see
//! the full history; without credentials the site only serves a window of
//! recent reports, so login failure degrades to unauthenticated scraping
//! with a warning rather than aborting.

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{info, warn};

use super::{ScrapeError, ScrapedReport, ScraperConfig};
use crate::models::NewRawReport;
use crate::repository::RawReportRepository;

/// Counts from a completed scrape run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeSummary {
    pub pages: usize,
    pub scraped: usize,
    pub inserted: usize,
}

/// Scrapes the archive and upserts reports into the raw store.
pub struct LakeLinkScraper {
    config: ScraperConfig,
    client: Client,
    repo: RawReportRepository,
    parser: PageParser,
}

impl LakeLinkScraper {
    pub fn new(config: ScraperConfig, repo: RawReportRepository) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            repo,
            parser: PageParser::new(),
        }
    }

    /// Log in to Lake-Link. Returns true when the session is authenticated;
    /// missing or refused credentials degrade to unauthenticated scraping.
    pub async fn authenticate(&self) -> Result<bool, ScrapeError> {
        let (Some(email), Some(password)) = (&self.config.email, &self.config.password) else {
            warn!("LAKELINK_EMAIL/LAKELINK_PASSWORD not set, scraping without authentication");
            return Ok(false);
        };

        // Hit the login page first to establish cookies.
        self.client
            .get(&self.config.login_page_url)
            .send()
            .await?
            .error_for_status()?;

        let payload = serde_json::json!({
            "loginAccount": "Lake-Link",
            "email": email,
            "password": password,
        });
        let resp = self
            .client
            .post(&self.config.login_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = resp.json().await?;
        if body.get("SUCCESS").and_then(Value::as_bool).unwrap_or(false) {
            info!(email = %email, "authenticated with Lake-Link");
            Ok(true)
        } else {
            let message = body
                .get("MESSAGE")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            warn!(message, "authentication failed, scraping without authentication");
            Ok(false)
        }
    }

    /// Fetch and parse a single archive page.
    pub async fn scrape_page(
        &self,
        start_row: usize,
    ) -> Result<(Vec<ScrapedReport>, Option<u64>), ScrapeError> {
        let html = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("startRow", start_row.to_string()),
                ("sortOrder", "DESC".to_string()),
                ("recordsToDisplay", self.config.records_per_page.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(self.parser.parse_page(&html))
    }

    /// Scrape the archive page by page, upserting every parsed report.
    ///
    /// Stops at `max_pages`, after three consecutive empty pages, or once
    /// past the post total reported by the site.
    pub async fn scrape_all(&self, max_pages: Option<usize>) -> Result<ScrapeSummary, ScrapeError> {
        let delay = std::time::Duration::from_millis(self.config.request_delay_ms);
        let records_per_page = self.config.records_per_page.max(1);

        let mut summary = ScrapeSummary::default();
        let mut start_row = 1usize;
        let mut page = 1usize;
        let mut consecutive_empty = 0u32;
        let mut total_count: Option<u64> = None;

        loop {
            if let Some(max) = max_pages {
                if page > max {
                    info!(max, "reached page limit");
                    break;
                }
            }
            if page > 1 {
                tokio::time::sleep(delay).await;
            }

            let (reports, total) = self.scrape_page(start_row).await?;
            if page == 1 {
                total_count = total;
                match total_count {
                    Some(total) => info!(total, "scraping report archive"),
                    None => info!("post total unknown, scraping until pages run dry"),
                }
            }

            if reports.is_empty() {
                consecutive_empty += 1;
                if consecutive_empty >= 3 {
                    info!("three consecutive empty pages, stopping");
                    break;
                }
                start_row += records_per_page;
                page += 1;
                continue;
            }
            consecutive_empty = 0;

            for report in reports {
                summary.scraped += 1;
                if self.repo.upsert(&to_new_raw(report))? {
                    summary.inserted += 1;
                }
            }
            summary.pages = page;
            info!(
                page,
                scraped = summary.scraped,
                inserted = summary.inserted,
                "page scraped"
            );

            start_row += records_per_page;
            page += 1;

            if let Some(total) = total_count {
                if start_row as u64 > total {
                    break;
                }
            }
        }

        Ok(summary)
    }
}

fn to_new_raw(report: ScrapedReport) -> NewRawReport {
    NewRawReport {
        id: report.post_id,
        date_posted: report.date_posted,
        username: report.username,
        raw_content: report.raw_content,
        weather_badge: report.weather_badge,
        image_urls: report.image_urls,
    }
}

/// Parses archive pages into reports. Selectors and regexes are compiled
/// once and reused across pages.
pub struct PageParser {
    post: Selector,
    date: Selector,
    username: Selector,
    badge_row: Selector,
    badge: Selector,
    content: Selector,
    card_body: Selector,
    image: Selector,
    total_re: Regex,
    date_re: Regex,
    weather_re: Regex,
    report_image_re: Regex,
}

impl PageParser {
    pub fn new() -> Self {
        Self {
            post: Selector::parse(r#"div[id^="post-id-"]"#).expect("valid selector"),
            date: Selector::parse("strong.text-primary").expect("valid selector"),
            username: Selector::parse("h6").expect("valid selector"),
            badge_row: Selector::parse("div.d-flex.align-items-center.flex-wrap")
                .expect("valid selector"),
            badge: Selector::parse("strong").expect("valid selector"),
            content: Selector::parse("div.post-content").expect("valid selector"),
            card_body: Selector::parse("div.card-body").expect("valid selector"),
            image: Selector::parse("img[src]").expect("valid selector"),
            total_re: Regex::new(r"Displaying\s+[\d,]+\s+to\s+[\d,]+\s+of\s+([\d,]+)\s+posts")
                .expect("valid regex"),
            date_re: Regex::new(
                r"(?i)^(\d{1,2})/(\d{1,2})/(\d{2,4})\s*@?\s*(\d{1,2}):(\d{2})\s*(AM|PM)?",
            )
            .expect("valid regex"),
            weather_re: Regex::new(r"(?i)(Sunny|Cloudy|Overcast|Rain|Snow|Clear|Fog|Windy)")
                .expect("valid regex"),
            report_image_re: Regex::new(r"cloudinary|upload").expect("valid regex"),
        }
    }

    /// Parse one archive page into reports plus the site's post total.
    pub fn parse_page(&self, html: &str) -> (Vec<ScrapedReport>, Option<u64>) {
        let doc = Html::parse_document(html);

        let total = self
            .total_re
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<u64>().ok());

        let mut reports = Vec::new();
        for post in doc.select(&self.post) {
            match self.parse_post(post) {
                Some(report) => reports.push(report),
                None => continue,
            }
        }

        (reports, total)
    }

    fn parse_post(&self, post: ElementRef<'_>) -> Option<ScrapedReport> {
        let post_id = post
            .value()
            .id()
            .and_then(|id| id.strip_prefix("post-id-"))
            .and_then(|id| id.parse::<i64>().ok())?;

        let date_posted = post
            .select(&self.date)
            .next()
            .and_then(|el| self.parse_date(element_text(el).trim()));
        // Posts without a visible timestamp are ads or malformed markup.
        date_posted.as_ref()?;

        // Username is the h6's direct text, skipping the online-status icon.
        let username = post.select(&self.username).next().and_then(|h6| {
            h6.children()
                .filter_map(|c| c.value().as_text())
                .map(|t| t.trim().to_string())
                .find(|t| !t.is_empty())
        });

        let weather_badge = post.select(&self.badge_row).next().and_then(|row| {
            row.select(&self.badge)
                .map(|b| element_text(b).trim().to_string())
                .find(|text| self.weather_re.is_match(text))
        });

        let raw_content = post
            .select(&self.content)
            .next()
            .map(|el| element_text(el).trim().to_string())?;
        if raw_content.len() < 10 {
            return None;
        }

        let image_urls = post.select(&self.card_body).next().and_then(|body| {
            let urls: Vec<String> = body
                .select(&self.image)
                .filter_map(|img| img.value().attr("src"))
                .filter(|src| self.report_image_re.is_match(src))
                .map(|src| src.to_string())
                .collect();
            if urls.is_empty() {
                None
            } else {
                Some(urls.join(","))
            }
        });

        Some(ScrapedReport {
            post_id,
            date_posted,
            username,
            raw_content,
            weather_badge,
            image_urls,
        })
    }

    /// Parse the archive's `M/D/YY @ H:MM AM/PM` timestamps.
    pub fn parse_date(&self, s: &str) -> Option<chrono::NaiveDateTime> {
        let caps = self.date_re.captures(s)?;

        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let mut year: i32 = caps[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }

        let mut hour: u32 = caps[4].parse().ok()?;
        let minute: u32 = caps[5].parse().ok()?;
        match caps.get(6).map(|m| m.as_str().to_ascii_uppercase()) {
            Some(ref ampm) if ampm == "PM" && hour != 12 => hour += 12,
            Some(ref ampm) if ampm == "AM" && hour == 12 => hour = 0,
            _ => {}
        }

        chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
    }
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new()
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}
