//! CLI command definitions and dispatch.
//!
//! This module provides the command-line interface for Concert Enricher.
//! Each group of subcommands lives in its own submodule:
//! - `enrich`: Batch enrichment of concert CSV files (cities, artists, both)
//! - `lookup`: Single lookups and manual mapping overrides
//! - `status`: Cache statistics and configuration checks

mod enrich;
mod lookup;
mod status;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::batch::{BatchEvent, BatchOutcome, RunMode};
use crate::cache::PersistentCache;
use crate::config::{self, Config};
use crate::enrichment::{
    Country, Credentials, Domain, LookupOptions, LookupService, Provider, ProviderConfig,
    ProviderId,
};
use crate::error::{self, Error, ResultExt};
use crate::records::{RecordFilter, Table};

pub use enrich::{ArtistsArgs, CitiesArgs, EnrichAllArgs, cmd_artists, cmd_cities, cmd_enrich_all};
pub use lookup::{LookupArgs, MapSetArgs, cmd_lookup, cmd_map_set};
pub use status::{cmd_cache_stats, cmd_check_config};

/// Concert Enricher CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: OS config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a State column to a concert CSV by geocoding its cities
    Cities(CitiesArgs),
    /// Add Genre columns to a concert CSV by looking up its artists
    Artists(ArtistsArgs),
    /// Enrich cities and artists at the same time
    EnrichAll(EnrichAllArgs),
    /// Look up a single name
    Lookup(LookupArgs),
    /// Set a mapping entry by hand
    MapSet(MapSetArgs),
    /// Show lookup cache statistics
    CacheStats {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Show which providers are configured
    CheckConfig {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

/// API credentials; flags win over environment, environment over the config file
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Google Geocoding API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
    /// Mapbox access token
    #[arg(long, env = "MAPBOX_ACCESS_TOKEN", hide_env_values = true)]
    pub mapbox_access_token: Option<String>,
    /// Spotify application client ID
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    pub spotify_client_id: Option<String>,
    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,
    /// Last.fm API key
    #[arg(long, env = "LASTFM_API_KEY", hide_env_values = true)]
    pub lastfm_api_key: Option<String>,
}

impl CredentialArgs {
    /// Merge with the `[credentials]` section of the config file.
    pub fn resolve(&self, config: &Config) -> Credentials {
        Credentials {
            google_api_key: self.google_api_key.clone(),
            mapbox_access_token: self.mapbox_access_token.clone(),
            spotify_client_id: self.spotify_client_id.clone(),
            spotify_client_secret: self.spotify_client_secret.clone(),
            lastfm_api_key: self.lastfm_api_key.clone(),
        }
        .or(&config.credentials)
    }
}

/// Settings for commands that touch the network or the cache
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Lookup cache database (default from config, then OS cache directory)
    #[arg(long)]
    pub cache: Option<PathBuf>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Settings shared by the batch commands
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Look everything up but write neither the mapping nor the output CSV
    #[arg(long)]
    pub dry_run: bool,
    /// Query again names whose cached lookup failed
    #[arg(long)]
    pub retry_errors: bool,
}

impl BatchArgs {
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Apply
        }
    }

    pub fn options(&self) -> LookupOptions {
        LookupOptions {
            bypass_cache: false,
            retry_cached_errors: self.retry_errors,
        }
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Cities(args) => cmd_cities(&rt, &config, args)?,
        Commands::Artists(args) => cmd_artists(&rt, &config, args)?,
        Commands::EnrichAll(args) => cmd_enrich_all(&rt, &config, args)?,
        Commands::Lookup(args) => cmd_lookup(&rt, &config, args)?,
        Commands::MapSet(args) => cmd_map_set(args)?,
        Commands::CacheStats { run } => cmd_cache_stats(&rt, &config, run)?,
        Commands::CheckConfig { init, credentials } => {
            cmd_check_config(&config, cli.config.as_deref(), *init, credentials)?
        }
    }
    Ok(())
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the lookup cache chosen by flag, config or OS default.
pub(crate) async fn open_cache(config: &Config, run: &RunArgs) -> error::Result<PersistentCache> {
    let path = run
        .cache
        .clone()
        .or_else(|| config.storage.cache_path.clone())
        .unwrap_or_else(PersistentCache::default_path);

    PersistentCache::open(&path)
        .await
        .with_context(format!("opening lookup cache {}", path.display()))
}

/// Build a lookup service with one client per provider in `providers`.
///
/// Geocoders are restricted to `country`; `None` searches worldwide.
pub(crate) fn build_service(
    cache: PersistentCache,
    config: &Config,
    run: &RunArgs,
    credentials: &Credentials,
    providers: &[ProviderId],
    country: Option<Country>,
) -> error::Result<LookupService> {
    let mut http = config.http.clone();
    if let Some(timeout) = run.timeout {
        http.timeout_secs = timeout;
    }
    let settings = http.settings();

    let mut service = LookupService::new(cache).with_retry_policy(config.retry.policy());
    for &id in providers {
        if service.is_registered(id) {
            continue;
        }
        let provider = ProviderConfig::from_credentials(id, credentials, country)
            .map(Provider::new)
            .with_context(format!("configuring {}", id.display_name()))?;
        let provider = config.tune(provider);
        tracing::debug!(
            "Using {} (max {:?} req/s)",
            id.display_name(),
            provider.max_requests_per_second
        );
        service.register(provider.connect(&settings)?);
    }
    Ok(service)
}

/// Every provider must serve `domain`.
pub(crate) fn require_domain(providers: &[ProviderId], domain: Domain) -> error::Result<()> {
    if providers.is_empty() {
        return Err(Error::usage("at least one --provider is required"));
    }
    if let Some(wrong) = providers.iter().find(|p| p.domain() != domain) {
        return Err(Error::usage(format!(
            "{} cannot be used for {}",
            wrong,
            match domain {
                Domain::CityState => "cities",
                Domain::ArtistGenre => "artists",
            }
        )));
    }
    Ok(())
}

/// Read the input CSV and check that `key_column` exists.
pub(crate) fn load_table(path: &Path, key_columns: &[&str]) -> error::Result<Table> {
    let table = Table::read_csv(path)?;
    for column in key_columns {
        if !table.headers().iter().any(|h| h == column) {
            return Err(Error::usage(format!(
                "column '{}' not found in {} (columns: {})",
                column,
                path.display(),
                table.headers().join(", ")
            )));
        }
    }
    Ok(table)
}

/// The `--country` a geocoder is restricted to; blank means worldwide.
pub(crate) fn parse_country(value: &str) -> error::Result<Option<Country>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(value.parse()?))
}

/// Restrict to rows whose `column` equals `value`, when the table has that column.
pub(crate) fn country_filter(table: &Table, column: &str, value: &str) -> Option<RecordFilter> {
    if value.trim().is_empty() {
        return None;
    }
    if !table.headers().iter().any(|h| h == column) {
        tracing::warn!("No '{}' column, enriching every row", column);
        return None;
    }
    Some(RecordFilter::new(column, value.trim()))
}

/// `concerts.csv` + `with_states` -> `concerts_with_states.csv`
pub(crate) fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_{}.csv", stem, suffix))
}

/// A cancel signal that flips on Ctrl-C.
///
/// Must be called from inside the runtime.
pub(crate) fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("Interrupted, stopping after saving what was found so far...");
            let _ = tx.send(true);
        }
    });
    rx
}

/// Print batch events as they arrive.
///
/// The printer finishes once every sender clone is dropped.
pub(crate) fn progress_printer() -> (mpsc::UnboundedSender<BatchEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                BatchEvent::Started {
                    label,
                    name,
                    index,
                    total,
                } => println!("[{} {}/{}] {}", label, index, total, name),
                BatchEvent::Resolved {
                    values, provider, ..
                } => println!(
                    "    ✓ {} ({})",
                    values.join(", "),
                    provider.map(|p| p.as_str()).unwrap_or("?")
                ),
                BatchEvent::Unresolved { reason, .. } => println!("    ✗ {}", reason),
            }
        }
    });
    (tx, handle)
}

/// Print the end-of-run report for one job.
pub(crate) fn print_summary(label: &str, outcome: &BatchOutcome) {
    let s = &outcome.summary;
    println!();
    println!("{}:", label);
    println!("  Distinct names:   {}", s.candidates);
    println!("  Already mapped:   {}", s.already_mapped);
    println!("  Looked up:        {}", s.looked_up);
    println!("  Newly mapped:     {}", s.merged);
    println!("  Unresolved:       {}", s.unresolved);
    println!("  Rows enriched:    {} ({} without a value)", s.rows_enriched, s.rows_unmapped);

    if !outcome.unresolved.is_empty() {
        println!("  Could not resolve:");
        for u in &outcome.unresolved {
            println!("    - {} ({})", u.name, u.reason);
        }
    }
    if outcome.cancelled {
        println!("  Cancelled before all names were looked up");
    }
}

/// Report providers that were switched off during the run.
pub(crate) fn print_disabled(service: &LookupService) {
    for (id, err) in service.disabled_providers() {
        eprintln!("Warning: {} was disabled: {}", id.display_name(), err);
    }
}
