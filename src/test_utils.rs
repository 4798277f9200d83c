//! Test utilities and fixtures for concert-enricher tests.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{temp_cache, sample_concerts};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (cache, _dir) = temp_cache().await;
//!     let table = sample_concerts();
//!     // ... test logic
//! }
//! ```

use tempfile::TempDir;

use crate::cache::PersistentCache;
use crate::records::Table;

/// Creates a temporary lookup cache for testing.
///
/// The database lives in a temporary directory that is removed when the
/// returned `TempDir` is dropped. Migrations are run automatically.
/// Keep the TempDir alive for the duration of your test; other files
/// (mapping JSON, CSV output) can go in the same directory.
pub async fn temp_cache() -> (PersistentCache, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let cache = PersistentCache::open(&dir.path().join("test_cache.db"))
        .await
        .expect("Failed to initialize test cache");

    (cache, dir)
}

/// Concert rows used across batch and CLI tests.
///
/// Cities: Las Vegas (twice), Reno (padded), Montreal (Canada), Austin,
/// Gotham (unknown to every geocoder) and one blank city.
pub const SAMPLE_CONCERTS_CSV: &str = "\
Artist,City,Country,Date
Coldplay,Las Vegas,United States,2024-06-08
Muse, Reno ,United States,2024-07-01
Arcade Fire,Montreal,Canada,2024-08-15
Beyoncé,Austin,United States,2024-09-20
The Unknowns,Gotham,United States,2024-10-02
Lorde,,United States,2024-10-30
Coldplay,Las Vegas,United States,2024-11-11
";

/// [`SAMPLE_CONCERTS_CSV`] parsed into a table.
pub fn sample_concerts() -> Table {
    Table::from_reader(SAMPLE_CONCERTS_CSV.as_bytes()).expect("Fixture CSV must parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_cache_creates_working_database() {
        let (cache, dir) = temp_cache().await;

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_cached, 0);
        assert!(cache.path().starts_with(dir.path()));
    }

    #[test]
    fn test_sample_concerts_shape() {
        let table = sample_concerts();
        assert_eq!(table.len(), 7);
        assert_eq!(table.headers(), ["Artist", "City", "Country", "Date"]);
        assert_eq!(table.records()[1].get("City"), Some("Reno"));
        assert_eq!(table.records()[5].get("City"), None);
    }
}
