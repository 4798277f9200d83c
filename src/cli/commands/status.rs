//! Cache statistics and configuration checks.

use std::path::Path;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::enrichment::{Credentials, ProviderId};

use super::{CredentialArgs, RunArgs, open_cache};

/// Show lookup cache statistics
pub fn cmd_cache_stats(rt: &Runtime, config: &Config, run: &RunArgs) -> anyhow::Result<()> {
    rt.block_on(async {
        let cache = open_cache(config, run).await?;
        let total = cache.stats().await?;
        let by_provider = cache.stats_by_provider().await?;

        println!("Lookup cache: {:?}", cache.path());
        println!();
        println!(
            "  Total: {} (found {}, not found {}, errors {})",
            total.total_cached, total.found_count, total.not_found_count, total.error_count
        );

        if !by_provider.is_empty() {
            println!();
            println!(
                "  {:<12} {:>8} {:>8} {:>10} {:>8}",
                "provider", "total", "found", "not found", "errors"
            );
            for (provider, stats) in &by_provider {
                println!(
                    "  {:<12} {:>8} {:>8} {:>10} {:>8}",
                    provider.as_str(),
                    stats.total_cached,
                    stats.found_count,
                    stats.not_found_count,
                    stats.error_count
                );
            }
        }

        cache.close().await;
        anyhow::Ok(())
    })
}

/// Show which providers are usable with the current credentials
pub fn cmd_check_config(
    config: &Config,
    config_file: Option<&Path>,
    init: bool,
    credentials: &CredentialArgs,
) -> anyhow::Result<()> {
    let path = match config_file {
        Some(path) => Some(path.to_path_buf()),
        None => config::config_path(),
    };

    match &path {
        Some(path) if path.exists() => println!("Config file: {:?}", path),
        Some(path) if init => {
            config::save_to(&Config::default(), path)?;
            println!("✓ Wrote default config to {:?}", path);
        }
        Some(path) => {
            println!("Config file: {:?} (not found, using defaults)", path);
            println!("  Run with --init to create it.");
        }
        None => println!("Config file: could not determine config directory"),
    }

    println!();
    println!("Storage:");
    println!("  City mapping:   {:?}", config.storage.city_mapping);
    println!("  Artist mapping: {:?}", config.storage.artist_mapping);
    match &config.storage.cache_path {
        Some(cache) => println!("  Lookup cache:   {:?}", cache),
        None => println!(
            "  Lookup cache:   {:?}",
            crate::cache::PersistentCache::default_path()
        ),
    }

    println!();
    println!("Providers:");
    let resolved = credentials.resolve(config);
    for line in provider_lines(&resolved, config) {
        println!("  {}", line);
    }

    Ok(())
}

/// Environment variables that supply a provider's credentials
fn credential_hint(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Nominatim | ProviderId::MusicBrainz => "no credentials needed",
        ProviderId::Google => "set GOOGLE_API_KEY",
        ProviderId::Mapbox => "set MAPBOX_ACCESS_TOKEN",
        ProviderId::Spotify => "set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET",
        ProviderId::LastFm => "set LASTFM_API_KEY",
    }
}

fn provider_lines(credentials: &Credentials, config: &Config) -> Vec<String> {
    ProviderId::ALL
        .iter()
        .map(|&id| {
            let limit = match config.rate_limits.get(id.as_str()) {
                Some(0) => " [unlimited]".to_string(),
                Some(rps) => format!(" [{} req/s]", rps),
                None => String::new(),
            };
            if credentials.has(id) {
                format!("✓ {:<12} {}{}", id.as_str(), id.display_name(), limit)
            } else {
                format!("✗ {:<12} {} ({})", id.as_str(), id.display_name(), credential_hint(id))
            }
        })
        .collect()
}
