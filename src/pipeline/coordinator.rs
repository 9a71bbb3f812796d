//! Fan-out of extraction calls under a fixed concurrency cap.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};

use crate::llm::{with_retry, Extractor, RetryError, RetryPolicy};
use crate::models::{ExtractedFields, RawReport};

/// Terminal result of one report's extraction, retries included.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub report: RawReport,
    pub result: Result<ExtractedFields, RetryError>,
}

/// Dispatches extraction calls for a set of reports, keeping at most
/// `concurrency` calls in flight. Outcomes arrive in completion order; one
/// report's failure never cancels or delays another's extraction.
pub struct ExtractionCoordinator {
    extractor: Arc<dyn Extractor>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl ExtractionCoordinator {
    pub fn new(extractor: Arc<dyn Extractor>, retry: RetryPolicy, concurrency: usize) -> Self {
        Self {
            extractor,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Spawn one task per report and return the stream of outcomes.
    ///
    /// The receiver yields exactly one outcome per submitted report and
    /// closes when the last task finishes.
    pub fn spawn(&self, reports: Vec<RawReport>) -> mpsc::Receiver<ExtractionOutcome> {
        let (tx, rx) = mpsc::channel(self.concurrency);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        for report in reports {
            let tx = tx.clone();
            let semaphore = semaphore.clone();
            let extractor = self.extractor.clone();
            let retry = self.retry.clone();

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let result = with_retry(&retry, || extractor.extract(&report)).await;
                // Receiver dropped means the run was abandoned; nothing to do.
                let _ = tx.send(ExtractionOutcome { report, result }).await;
            });
        }

        rx
    }
}
