//! Command-line interface for concert-enricher.
//!
//! This module provides CLI commands for enriching concert CSV files,
//! single lookups, manual mapping edits and cache/config inspection.

mod commands;

pub use commands::{Cli, Commands, run_command};
