//! `creel process` - extract structured fields from pending reports.

use std::sync::Arc;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::llm::ExtractionClient;
use crate::pipeline::{Pipeline, PipelineEvent};
use crate::repository::{ProcessedReportRepository, RawReportRepository};

pub async fn run(
    settings: &Settings,
    workers: Option<usize>,
    max: usize,
    sample: bool,
) -> anyhow::Result<()> {
    if settings.config.llm.api_key.is_none() {
        anyhow::bail!(
            "OPENAI_API_KEY is not set.\n\
             Put it in the environment or a .env file:\n  OPENAI_API_KEY=your-api-key-here"
        );
    }

    let mut pipeline_config = settings.config.pipeline.clone();
    if let Some(workers) = workers {
        pipeline_config.workers = workers;
    }
    let limit = if sample {
        Some(10)
    } else if max > 0 {
        Some(max)
    } else {
        None
    };

    let db_path = settings.database_path();
    let raw_repo = RawReportRepository::new(&db_path)?;
    let processed_repo = ProcessedReportRepository::new(&db_path)?;
    let extractor = Arc::new(ExtractionClient::new(settings.config.llm.clone()));

    println!(
        "{} Processing pending reports with {} workers",
        style("→").cyan(),
        pipeline_config.workers
    );

    let pipeline = Pipeline::new(
        raw_repo,
        processed_repo.clone(),
        extractor,
        &pipeline_config,
    );

    let (tx, mut rx) = mpsc::channel(64);
    let run = tokio::spawn(async move { pipeline.run(limit, Some(tx)).await });

    let mut pb: Option<ProgressBar> = None;
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::Started { selected } => {
                let bar = ProgressBar::new(selected as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                        )
                        .unwrap()
                        .progress_chars("#>-"),
                );
                pb = Some(bar);
            }
            PipelineEvent::Processed { report_id } => {
                if let Some(pb) = &pb {
                    pb.set_message(format!("report {}", report_id));
                    pb.inc(1);
                }
            }
            PipelineEvent::Failed { report_id, kind, .. } => {
                if let Some(pb) = &pb {
                    pb.set_message(format!("report {} failed ({})", report_id, kind));
                    pb.inc(1);
                }
            }
            PipelineEvent::Skipped { .. } => {
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
            }
        }
    }
    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let summary = run.await??;

    println!(
        "{} Run complete: {} processed, {} failed, {} skipped",
        style("✓").green(),
        summary.processed,
        summary.failed,
        summary.skipped
    );

    let stats = processed_repo.stats()?;
    println!("  Raw reports:       {}", stats.raw_reports);
    println!("  Processed reports: {}", stats.processed_reports);
    if !stats.top_species.is_empty() {
        println!("  Top species caught:");
        for entry in stats.top_species.iter().take(5) {
            println!("    - {}: {} reports", entry.species, entry.count);
        }
    }

    Ok(())
}
