//! Concert Enricher - resolves city and artist names in concert ticketing
//! data to US states and musical genres.
//!
//! Lookups go through interchangeable external providers, are cached on
//! disk so a name is never looked up twice, and are merged into
//! hand-editable mapping files that drive the CSV enrichment.

pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod mapping;
pub mod records;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("concert_enricher=info".parse()?))
        .init();

    cli::run_command(&args)
}
