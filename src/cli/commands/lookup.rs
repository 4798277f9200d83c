//! Single-name lookups and manual mapping overrides.

use clap::Args;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::enrichment::{AttributeResult, EntityName, LookupOptions, ProviderId};
use crate::error;
use crate::mapping::MappingStore;

use super::{CredentialArgs, RunArgs, build_service, open_cache, parse_country, print_disabled};

/// Arguments for `lookup`
#[derive(Args, Debug, Clone)]
pub struct LookupArgs {
    /// City or artist name, exactly as it appears in the data
    pub name: String,
    /// Providers to try, in order
    #[arg(long = "provider", required = true)]
    pub providers: Vec<ProviderId>,
    /// Ignore the cache and ask the provider again
    #[arg(long)]
    pub refresh: bool,
    /// Country geocoders are restricted to (English name or ISO code; empty = worldwide)
    #[arg(long, default_value = "United States")]
    pub country: String,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Arguments for `map-set`
#[derive(Args, Debug, Clone)]
pub struct MapSetArgs {
    /// Mapping file to edit
    pub mapping_file: PathBuf,
    /// Key to set
    pub name: String,
    /// One or more values, most relevant first
    #[arg(required = true, num_args = 1..)]
    pub values: Vec<String>,
}

/// Look up a single name through a provider chain
pub fn cmd_lookup(rt: &Runtime, config: &Config, args: &LookupArgs) -> anyhow::Result<()> {
    let name = EntityName::new(args.name.as_str())?;
    let country = parse_country(&args.country)?;
    let credentials = args.credentials.resolve(config);
    let options = LookupOptions {
        bypass_cache: args.refresh,
        retry_cached_errors: false,
    };

    rt.block_on(async {
        let cache = open_cache(config, &args.run).await?;
        let service = build_service(
            cache.clone(),
            config,
            &args.run,
            &credentials,
            &args.providers,
            country,
        )?;

        println!("Looking up {:?}", name.as_str());
        let outcome = service.fallback_with(&name, &args.providers, options).await;

        for attempt in &outcome.attempts {
            match &attempt.result {
                AttributeResult::Error(e) => println!("  ✗ {}: {}", attempt.provider, e),
                _ => println!("  - {}: no match", attempt.provider),
            }
        }
        match (&outcome.result, outcome.provider) {
            (AttributeResult::Found(values), Some(provider)) => {
                println!("  ✓ {}: {}", provider, values.join(", "))
            }
            _ => println!("No provider could resolve {:?}", name.as_str()),
        }

        print_disabled(&service);
        cache.close().await;
        Ok::<_, error::Error>(())
    })?;

    Ok(())
}

/// Set a mapping entry by hand
pub fn cmd_map_set(args: &MapSetArgs) -> anyhow::Result<()> {
    let changed = set_mapping(&args.mapping_file, &args.name, &args.values)?;
    if changed {
        println!("✓ {} -> {}", args.name, args.values.join(", "));
    } else {
        println!("{} already maps to {}", args.name, args.values.join(", "));
    }
    Ok(())
}

/// Merge one entry into the mapping file and save it. Returns whether it changed.
fn set_mapping(path: &Path, name: &str, values: &[String]) -> error::Result<bool> {
    let name = EntityName::new(name)?;
    let values: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(error::Error::usage("at least one non-blank value is required"));
    }

    let mut store = MappingStore::load(path)?;
    Ok(store.merge_and_save(&name, &values)?)
}
