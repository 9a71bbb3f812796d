//! `creel status` - show store counts and the species leaderboard.

use console::style;

use crate::config::Settings;
use crate::repository::{ProcessedReportRepository, RawReportRepository};

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let db_path = settings.database_path();
    if !db_path.exists() {
        println!(
            "{} No database at {} (run `creel init` first)",
            style("!").yellow(),
            db_path.display()
        );
        return Ok(());
    }

    let raw_repo = RawReportRepository::new(&db_path)?;
    let processed_repo = ProcessedReportRepository::new(&db_path)?;

    let raw = raw_repo.count()?;
    let pending = raw_repo.count_unprocessed()?;
    let stats = processed_repo.stats()?;

    println!("{}", style("Creel status").bold());
    println!("  Database:          {}", db_path.display());
    println!("  Raw reports:       {}", raw);
    println!("  Processed reports: {}", stats.processed_reports);
    println!("  Pending:           {}", pending);

    if !stats.top_species.is_empty() {
        println!("  Top species caught:");
        for entry in stats.top_species.iter().take(5) {
            println!("    - {}: {} reports", entry.species, entry.count);
        }
    }

    Ok(())
}
