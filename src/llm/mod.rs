//! Structured-field extraction via an external language model.
//!
//! The client is stateless and safe to share across workers; retry policy
//! and the error taxonomy that drives it live here too.

mod client;
mod parser;
mod prompt;
mod retry;

pub use client::{ExtractionClient, ExtractionError, LlmConfig};
pub use parser::parse_extraction;
pub use prompt::build_extraction_prompt;
pub use retry::{with_retry, RetryError, RetryPolicy};

use async_trait::async_trait;

use crate::models::{ExtractedFields, RawReport};

/// The extraction contract the pipeline depends on.
///
/// `ExtractionClient` is the production implementation; tests substitute
/// scripted fakes.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, report: &RawReport) -> Result<ExtractedFields, ExtractionError>;
}
