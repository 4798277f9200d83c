//! Batch enrichment commands for concert CSV files.

use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::batch::{self, BatchEnricher, BatchJob, BatchOutcome, RunMode};
use crate::config::Config;
use crate::enrichment::{Country, Credentials, Domain, LookupService, ProviderId};
use crate::error;
use crate::mapping::MappingStore;
use crate::records::Table;

use super::{
    BatchArgs, CredentialArgs, RunArgs, build_service, cancel_on_ctrl_c, country_filter,
    default_output, load_table, open_cache, parse_country, print_disabled, print_summary,
    progress_printer, require_domain,
};

/// Arguments for `cities`
#[derive(Args, Debug, Clone)]
pub struct CitiesArgs {
    /// Concert CSV file
    pub input: PathBuf,
    /// City -> state mapping file (default from config)
    #[arg(long)]
    pub mapping_file: Option<PathBuf>,
    /// Output CSV (default: <input>_with_states.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Geocoders to try, in order: nominatim, google, mapbox
    #[arg(long = "provider", default_value = "nominatim")]
    pub providers: Vec<ProviderId>,
    /// Column holding the city name
    #[arg(long, default_value = "City")]
    pub key_column: String,
    /// Column holding the country
    #[arg(long, default_value = "Country")]
    pub country_column: String,
    /// Only rows from this country are enriched, and geocoding is restricted
    /// to it (English name or ISO code; empty = all rows, worldwide search)
    #[arg(long, default_value = "United States")]
    pub country: String,
    /// Name of the appended column
    #[arg(long, default_value = "State")]
    pub column: String,
    #[command(flatten)]
    pub batch: BatchArgs,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Arguments for `artists`
#[derive(Args, Debug, Clone)]
pub struct ArtistsArgs {
    /// Concert CSV file
    pub input: PathBuf,
    /// Artist -> genres mapping file (default from config)
    #[arg(long)]
    pub mapping_file: Option<PathBuf>,
    /// Output CSV (default: <input>_with_genres.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Music catalogs to try, in order: musicbrainz, spotify, lastfm
    #[arg(long = "provider", default_value = "musicbrainz")]
    pub providers: Vec<ProviderId>,
    /// Column holding the artist name
    #[arg(long, default_value = "Artist")]
    pub key_column: String,
    /// Name of the appended genre column
    #[arg(long, default_value = "Genre")]
    pub column: String,
    /// Genres shown in the genre column; the All_Genres column has every genre
    #[arg(long, default_value_t = 3)]
    pub max_values: usize,
    #[command(flatten)]
    pub batch: BatchArgs,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Arguments for `enrich-all`
#[derive(Args, Debug, Clone)]
pub struct EnrichAllArgs {
    /// Concert CSV file
    pub input: PathBuf,
    /// Output CSV (default: <input>_enriched.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// City -> state mapping file (default from config)
    #[arg(long)]
    pub city_mapping: Option<PathBuf>,
    /// Artist -> genres mapping file (default from config)
    #[arg(long)]
    pub artist_mapping: Option<PathBuf>,
    /// Geocoders to try, in order
    #[arg(long = "city-provider", default_value = "nominatim")]
    pub city_providers: Vec<ProviderId>,
    /// Music catalogs to try, in order
    #[arg(long = "artist-provider", default_value = "musicbrainz")]
    pub artist_providers: Vec<ProviderId>,
    #[arg(long, default_value = "City")]
    pub city_column: String,
    #[arg(long, default_value = "Artist")]
    pub artist_column: String,
    #[arg(long, default_value = "Country")]
    pub country_column: String,
    /// Only rows from this country get a state, and geocoding is restricted
    /// to it (English name or ISO code; empty = all rows, worldwide search)
    #[arg(long, default_value = "United States")]
    pub country: String,
    /// Genres shown in the Genre column
    #[arg(long, default_value_t = 3)]
    pub max_values: usize,
    #[command(flatten)]
    pub batch: BatchArgs,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Column name holding every genre, next to the shortened one
const ALL_GENRES_COLUMN: &str = "All_Genres";

/// Add a State column to a concert CSV
pub fn cmd_cities(rt: &Runtime, config: &Config, args: &CitiesArgs) -> anyhow::Result<()> {
    require_domain(&args.providers, Domain::CityState)?;
    let country = parse_country(&args.country)?;
    let table = load_table(&args.input, &[args.key_column.as_str()])?;
    let job = city_job(&table, &args.key_column, &args.country_column, &args.country, &args.providers)
        .with_options(args.batch.options());
    let mapping = args
        .mapping_file
        .clone()
        .unwrap_or_else(|| config.mapping_path(Domain::CityState).to_path_buf());
    let credentials = args.credentials.resolve(config);

    println!("Enriching cities in {:?}", args.input);
    let outcome = rt.block_on(run_single(
        config,
        &args.run,
        &credentials,
        country,
        &table,
        &job,
        &mapping,
        args.batch.mode(),
    ))?;
    print_summary("Cities", &outcome);

    if args.batch.dry_run {
        println!();
        println!("Dry run - no files written.");
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, "with_states"));
    let enriched = table.with_column(&args.column, &joined(&outcome.attributes))?;
    enriched.write_csv(&output)?;
    println!();
    println!("✓ Wrote {:?}", output);
    Ok(())
}

/// Add Genre and All_Genres columns to a concert CSV
pub fn cmd_artists(rt: &Runtime, config: &Config, args: &ArtistsArgs) -> anyhow::Result<()> {
    require_domain(&args.providers, Domain::ArtistGenre)?;
    let table = load_table(&args.input, &[args.key_column.as_str()])?;
    let job = BatchJob::new("artists", &args.key_column, args.providers.clone())
        .with_options(args.batch.options());
    let mapping = args
        .mapping_file
        .clone()
        .unwrap_or_else(|| config.mapping_path(Domain::ArtistGenre).to_path_buf());
    let credentials = args.credentials.resolve(config);

    println!("Enriching artists in {:?}", args.input);
    let outcome = rt.block_on(run_single(
        config,
        &args.run,
        &credentials,
        None,
        &table,
        &job,
        &mapping,
        args.batch.mode(),
    ))?;
    print_summary("Artists", &outcome);

    if args.batch.dry_run {
        println!();
        println!("Dry run - no files written.");
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, "with_genres"));
    let enriched = with_genre_columns(&table, &args.column, &outcome.attributes, args.max_values)?;
    enriched.write_csv(&output)?;
    println!();
    println!("✓ Wrote {:?}", output);
    Ok(())
}

/// Enrich cities and artists concurrently into one output file
pub fn cmd_enrich_all(rt: &Runtime, config: &Config, args: &EnrichAllArgs) -> anyhow::Result<()> {
    require_domain(&args.city_providers, Domain::CityState)?;
    require_domain(&args.artist_providers, Domain::ArtistGenre)?;
    let country = parse_country(&args.country)?;
    let table = load_table(&args.input, &[args.city_column.as_str(), args.artist_column.as_str()])?;

    let city = city_job(
        &table,
        &args.city_column,
        &args.country_column,
        &args.country,
        &args.city_providers,
    )
    .with_options(args.batch.options());
    let artist = BatchJob::new("artists", &args.artist_column, args.artist_providers.clone())
        .with_options(args.batch.options());
    let city_mapping = args
        .city_mapping
        .clone()
        .unwrap_or_else(|| config.mapping_path(Domain::CityState).to_path_buf());
    let artist_mapping = args
        .artist_mapping
        .clone()
        .unwrap_or_else(|| config.mapping_path(Domain::ArtistGenre).to_path_buf());
    let credentials = args.credentials.resolve(config);
    let mode = args.batch.mode();

    println!("Enriching cities and artists in {:?}", args.input);
    let (cities, artists) = rt.block_on(async {
        let cache = open_cache(config, &args.run).await?;
        let providers: Vec<ProviderId> = city
            .providers
            .iter()
            .chain(&artist.providers)
            .copied()
            .collect();
        let service = Arc::new(build_service(
            cache.clone(),
            config,
            &args.run,
            &credentials,
            &providers,
            country,
        )?);

        let (progress, printer) = progress_printer();
        let mut city_enricher = BatchEnricher::new(Arc::clone(&service), MappingStore::load(&city_mapping)?)
            .with_progress(progress.clone());
        let mut artist_enricher =
            BatchEnricher::new(Arc::clone(&service), MappingStore::load(&artist_mapping)?)
                .with_progress(progress);
        let cancel = cancel_on_ctrl_c();

        let mut results = batch::run_concurrent(
            vec![(&mut city_enricher, &city), (&mut artist_enricher, &artist)],
            &table,
            mode,
            &cancel,
        )
        .await
        .into_iter();

        drop(city_enricher);
        drop(artist_enricher);
        let _ = printer.await;
        print_disabled(&service);
        cache.close().await;

        let cities = results.next().transpose()?;
        let artists = results.next().transpose()?;
        Ok::<_, error::Error>((cities, artists))
    })?;
    let (Some(cities), Some(artists)) = (cities, artists) else {
        anyhow::bail!("enrichment jobs did not report back");
    };

    print_summary("Cities", &cities);
    print_summary("Artists", &artists);

    if args.batch.dry_run {
        println!();
        println!("Dry run - no files written.");
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, "enriched"));
    let enriched = table.with_column("State", &joined(&cities.attributes))?;
    let enriched = with_genre_columns(&enriched, "Genre", &artists.attributes, args.max_values)?;
    enriched.write_csv(&output)?;
    println!();
    println!("✓ Wrote {:?}", output);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn city_job(
    table: &Table,
    key_column: &str,
    country_column: &str,
    country: &str,
    providers: &[ProviderId],
) -> BatchJob {
    let job = BatchJob::new("cities", key_column, providers.to_vec());
    match country_filter(table, country_column, country) {
        Some(filter) => job.with_filter(filter),
        None => job,
    }
}

/// Open the cache, connect the job's providers and run it.
async fn run_single(
    config: &Config,
    run: &RunArgs,
    credentials: &Credentials,
    country: Option<Country>,
    table: &Table,
    job: &BatchJob,
    mapping: &Path,
    mode: RunMode,
) -> error::Result<BatchOutcome> {
    let cache = open_cache(config, run).await?;
    let service = Arc::new(build_service(
        cache.clone(),
        config,
        run,
        credentials,
        &job.providers,
        country,
    )?);

    let outcome = execute(Arc::clone(&service), table, job, mapping, mode).await;
    print_disabled(&service);
    cache.close().await;
    outcome
}

/// Run one job against an already configured service, printing progress.
async fn execute(
    service: Arc<LookupService>,
    table: &Table,
    job: &BatchJob,
    mapping: &Path,
    mode: RunMode,
) -> error::Result<BatchOutcome> {
    let store = MappingStore::load(mapping)?;
    let (progress, printer) = progress_printer();
    let mut enricher = BatchEnricher::new(service, store).with_progress(progress);

    let outcome = enricher.run(table, job, mode, cancel_on_ctrl_c()).await;
    drop(enricher);
    let _ = printer.await;
    Ok(outcome?)
}

/// One cell per row: every value joined with ", "
fn joined(attributes: &[Option<Vec<String>>]) -> Vec<Option<String>> {
    attributes
        .iter()
        .map(|a| a.as_ref().map(|values| values.join(", ")))
        .collect()
}

/// Append `column` (the first `max_values` genres) and `All_Genres`.
fn with_genre_columns(
    table: &Table,
    column: &str,
    attributes: &[Option<Vec<String>>],
    max_values: usize,
) -> error::Result<Table> {
    let shortened: Vec<Option<String>> = attributes
        .iter()
        .map(|a| {
            a.as_ref()
                .map(|values| values.iter().take(max_values.max(1)).cloned().collect::<Vec<_>>().join(", "))
        })
        .collect();

    let table = table.with_column(column, &shortened)?;
    Ok(table.with_column(ALL_GENRES_COLUMN, &joined(attributes))?)
}
