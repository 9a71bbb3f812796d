//! Extraction pipeline: selects pending raw reports, fans out extraction
//! calls, and persists the structured results.
//!
//! Per-report state is only ever "pending" (no processed row) or terminal
//! (processed row written, or failure logged and the report left pending).
//! In-flight work is purely in-memory; a crash mid-run just leaves more
//! reports pending for the next run.

mod coordinator;

pub use coordinator::{ExtractionCoordinator, ExtractionOutcome};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::llm::{Extractor, RetryPolicy};
use crate::models::NewProcessedReport;
use crate::repository::{
    InsertOutcome, ProcessedReportRepository, RawReportRepository, RepositoryError,
};

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum extraction calls in flight at once.
    pub workers: usize,
    /// Reports handed to the coordinator per batch.
    pub batch_size: usize,
    /// Attempts per report, including the first call.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds.
    pub retry_base_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            batch_size: 100,
            max_attempts: 3,
            retry_base_delay_ms: 2000,
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: std::time::Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Progress events emitted while a run is underway.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Selection finished; `selected` reports will be attempted.
    Started { selected: usize },
    /// A processed row was written.
    Processed { report_id: i64 },
    /// Extraction failed terminally; the report stays pending.
    Failed {
        report_id: i64,
        kind: &'static str,
        message: String,
    },
    /// A concurrent run already wrote this report's row.
    Skipped { report_id: i64 },
}

/// Counts reported by a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed + self.skipped
    }
}

/// Store-level failures abort the run; per-report failures never do.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("report store unavailable: {0}")]
    Store(#[from] RepositoryError),
}

/// Drives extraction over the pending backlog.
pub struct Pipeline {
    raw_repo: RawReportRepository,
    processed_repo: ProcessedReportRepository,
    coordinator: ExtractionCoordinator,
    batch_size: usize,
}

impl Pipeline {
    pub fn new(
        raw_repo: RawReportRepository,
        processed_repo: ProcessedReportRepository,
        extractor: Arc<dyn Extractor>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            raw_repo,
            processed_repo,
            coordinator: ExtractionCoordinator::new(
                extractor,
                config.retry_policy(),
                config.workers,
            ),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Process pending reports, optionally capped at `limit`.
    ///
    /// Every selected report lands in exactly one summary bucket. Reports
    /// that fail stay pending and are selectable by the next run.
    pub async fn run(
        &self,
        limit: Option<usize>,
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<RunSummary, PipelineError> {
        let pending = self.raw_repo.get_unprocessed_async(limit).await?;
        info!(selected = pending.len(), "starting extraction run");
        emit(&events, PipelineEvent::Started { selected: pending.len() }).await;

        let mut summary = RunSummary::default();

        for batch in pending.chunks(self.batch_size) {
            let mut rx = self.coordinator.spawn(batch.to_vec());

            while let Some(outcome) = rx.recv().await {
                let report_id = outcome.report.id;
                match outcome.result {
                    Ok(fields) => {
                        let row = NewProcessedReport::from_extraction(&outcome.report, fields);
                        match self.processed_repo.insert_async(row).await? {
                            InsertOutcome::Inserted(_) => {
                                summary.processed += 1;
                                emit(&events, PipelineEvent::Processed { report_id }).await;
                            }
                            InsertOutcome::AlreadyProcessed => {
                                summary.skipped += 1;
                                info!(report_id, "already processed by a concurrent run");
                                emit(&events, PipelineEvent::Skipped { report_id }).await;
                            }
                        }
                    }
                    Err(err) => {
                        summary.failed += 1;
                        warn!(
                            report_id,
                            kind = err.kind(),
                            error = %err,
                            "extraction failed, report left pending"
                        );
                        emit(
                            &events,
                            PipelineEvent::Failed {
                                report_id,
                                kind: err.kind(),
                                message: err.to_string(),
                            },
                        )
                        .await;
                    }
                }
            }
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            skipped = summary.skipped,
            "extraction run complete"
        );
        Ok(summary)
    }
}

async fn emit(events: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
