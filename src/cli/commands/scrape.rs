//! `creel scrape` - pull reports from the archive into the raw store.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::repository::RawReportRepository;
use crate::scrapers::LakeLinkScraper;

pub async fn run(
    settings: &Settings,
    pages: usize,
    delay: Option<f64>,
    no_auth: bool,
    sample: bool,
) -> anyhow::Result<()> {
    settings.ensure_data_dir()?;

    let mut scraper_config = settings.config.scraper.clone();
    if let Some(delay) = delay {
        scraper_config.request_delay_ms = (delay * 1000.0) as u64;
    }

    let max_pages = if sample {
        scraper_config.request_delay_ms = 500;
        Some(5)
    } else if pages > 0 {
        Some(pages)
    } else {
        None
    };

    let repo = RawReportRepository::new(&settings.database_path())?;
    let scraper = LakeLinkScraper::new(scraper_config, repo.clone());

    if no_auth {
        println!(
            "{} Skipping authentication (limited to recent reports)",
            style("→").cyan()
        );
    } else if scraper.authenticate().await? {
        println!("{} Authenticated with Lake-Link", style("✓").green());
    } else {
        println!(
            "{} Running without authentication (limited to recent reports)",
            style("!").yellow()
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message("Scraping report archive...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let summary = scraper.scrape_all(max_pages).await?;
    spinner.finish_and_clear();

    println!(
        "{} Scraped {} reports across {} pages ({} new)",
        style("✓").green(),
        summary.scraped,
        summary.pages,
        summary.inserted
    );
    println!(
        "  Raw store now contains {} reports",
        repo.count()?
    );

    Ok(())
}
