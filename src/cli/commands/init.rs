//! `creel init` - create the data directory and database.

use console::style;

use crate::config::Settings;
use crate::repository::{ProcessedReportRepository, RawReportRepository};

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_data_dir()?;

    let db_path = settings.database_path();
    RawReportRepository::new(&db_path)?;
    ProcessedReportRepository::new(&db_path)?;
    println!(
        "{} Database initialized at {}",
        style("✓").green(),
        db_path.display()
    );

    let config_path = settings.data_dir.join(crate::config::CONFIG_FILE);
    if !config_path.exists() {
        settings.write_config()?;
        println!(
            "{} Wrote default configuration to {}",
            style("✓").green(),
            config_path.display()
        );
    }

    Ok(())
}
