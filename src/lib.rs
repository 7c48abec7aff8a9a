pub mod annotate;
pub mod baseline;
pub mod cli;
pub mod config;
pub mod detect;
pub mod diff;
pub mod error;
pub mod git;
pub mod github;
pub mod ingest;
pub mod model;
pub mod notes;
pub mod parsers;
pub mod ranges;
pub mod report;
pub mod retry;
pub mod snapshot;
