//! Creel - lake fishing report acquisition and analysis.
//!
//! Scrapes community fishing reports from the Lake-Link archive for a single
//! lake, extracts structured fields from each report with a language model,
//! and serves the results through a read-only query API.

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod scrapers;
pub mod server;
