//! Domain models for fishing report storage and extraction.

mod report;

pub use report::{
    ExtractedFields, NewProcessedReport, NewRawReport, ProcessedReport, RawReport, Season,
};
