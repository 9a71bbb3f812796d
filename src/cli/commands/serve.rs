//! `creel serve` - run the query API server.

use crate::config::Settings;
use crate::repository::{ProcessedReportRepository, RawReportRepository};
use crate::server::{self, AppState};

pub async fn run(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let db_path = settings.database_path();
    let raw_repo = RawReportRepository::new(&db_path)?;
    let processed_repo = ProcessedReportRepository::new(&db_path)?;

    let (host, port) = parse_bind(bind);
    server::serve(AppState::new(raw_repo, processed_repo), &host, port).await
}

/// Accepts `PORT`, `HOST`, or `HOST:PORT`.
fn parse_bind(bind: &str) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return ("127.0.0.1".to_string(), port);
    }
    if let Some((host, port)) = bind.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return (host.to_string(), port);
        }
    }
    (bind.to_string(), 8000)
}
