//! Incident report generator.
//!
//! Incident-chat notes go in; one streaming generation job per report format
//! runs concurrently against the generation backend; each format's progress is
//! tracked in the [`report::ReportStore`]; finished reports export as one
//! paginated PDF or as raw markdown.

pub mod api;
pub mod cli;
pub mod config;
pub mod export;
pub mod orchestrator;
pub mod report;
pub mod stream;
