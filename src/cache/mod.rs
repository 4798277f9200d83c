//! Persistent lookup cache.
//!
//! Every provider answer (found, not found, or error) is stored in a SQLite
//! table keyed by `(provider, scope, name)`, so a name is never sent to the
//! same provider twice across runs. The scope is whatever else shapes the
//! answer, such as a geocoder's country; it is empty for most providers. Rows are only replaced by an explicit
//! re-lookup; nothing expires.
//!
//! # Example
//!
//! ```ignore
//! let cache = PersistentCache::open(&PersistentCache::default_path()).await?;
//! if let Some(entry) = cache.get(&name, ProviderId::Nominatim, "us").await? {
//!     println!("{} -> {:?}", entry.name, entry.result);
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::enrichment::domain::{
    AttributeResult, EntityName, ErrorKind, LookupStatus, ProviderError, ProviderId,
};

/// Default cache database filename.
pub const DEFAULT_CACHE_NAME: &str = "lookup_cache.db";

/// Errors from the cache store
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cannot create cache directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt cache row for {provider}/{name}: {reason}")]
    Corrupt {
        provider: String,
        name: String,
        reason: String,
    },
}

/// One stored provider answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub name: EntityName,
    pub provider: ProviderId,
    pub scope: String,
    pub result: AttributeResult,
    pub looked_up_at: DateTime<Utc>,
}

/// Entry counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_cached: u64,
    pub found_count: u64,
    pub not_found_count: u64,
    pub error_count: u64,
}

impl CacheStats {
    fn add(&mut self, status: LookupStatus, count: u64) {
        self.total_cached += count;
        match status {
            LookupStatus::Found => self.found_count += count,
            LookupStatus::NotFound => self.not_found_count += count,
            LookupStatus::Error => self.error_count += count,
        }
    }
}

/// Database row
#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    provider: String,
    scope: String,
    name: String,
    status: String,
    vals: String,
    error_kind: Option<String>,
    error_message: Option<String>,
    looked_up_at: String,
}

impl CacheRow {
    fn into_entry(self) -> Result<CacheEntry, CacheError> {
        let corrupt = |reason: String| CacheError::Corrupt {
            provider: self.provider.clone(),
            name: self.name.clone(),
            reason,
        };

        let provider: ProviderId = self.provider.parse().map_err(|e| corrupt(format!("{}", e)))?;
        let name = EntityName::new(self.name.clone()).map_err(|e| corrupt(e.to_string()))?;
        let status: LookupStatus = self.status.parse().map_err(corrupt)?;
        let looked_up_at = DateTime::parse_from_rfc3339(&self.looked_up_at)
            .map_err(|e| corrupt(format!("bad timestamp: {}", e)))?
            .with_timezone(&Utc);

        let result = match status {
            LookupStatus::Found => {
                let vals: Vec<String> = serde_json::from_str(&self.vals)
                    .map_err(|e| corrupt(format!("bad values: {}", e)))?;
                AttributeResult::Found(vals)
            }
            LookupStatus::NotFound => AttributeResult::NotFound,
            LookupStatus::Error => {
                let kind: ErrorKind = self
                    .error_kind
                    .as_deref()
                    .unwrap_or_default()
                    .parse()
                    .unwrap_or(ErrorKind::Transient);
                AttributeResult::Error(ProviderError::new(
                    kind,
                    self.error_message.clone().unwrap_or_default(),
                ))
            }
        };

        Ok(CacheEntry {
            name,
            provider,
            scope: self.scope,
            result,
            looked_up_at,
        })
    }
}

/// Durable `(provider, name) -> result` store.
///
/// Cloning is cheap: clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PersistentCache {
    pool: SqlitePool,
    path: PathBuf,
}

impl PersistentCache {
    /// Default location: `<user cache dir>/concert-enricher/lookup_cache.db`.
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("concert-enricher")
            .join(DEFAULT_CACHE_NAME)
    }

    /// Open (creating if needed) the cache database and run migrations.
    ///
    /// WAL journaling plus a busy timeout lets several processes share one
    /// cache file; `synchronous = FULL` makes every committed `put` durable.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::debug!("Opened lookup cache at {}", path.display());
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored answer for `name` from `provider` under `scope`, if any.
    pub async fn get(
        &self,
        name: &EntityName,
        provider: ProviderId,
        scope: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT provider, scope, name, status, vals, error_kind, error_message, looked_up_at
             FROM lookup_cache WHERE provider = ? AND scope = ? AND name = ?",
        )
        .bind(provider.as_str())
        .bind(scope)
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CacheRow::into_entry).transpose()
    }

    /// Store (or overwrite) the answer for `name` from `provider` under `scope`.
    ///
    /// The row is committed before this returns.
    pub async fn put(
        &self,
        name: &EntityName,
        provider: ProviderId,
        scope: &str,
        result: &AttributeResult,
    ) -> Result<CacheEntry, CacheError> {
        let looked_up_at = Utc::now();
        let vals = match result {
            AttributeResult::Found(values) => {
                serde_json::to_string(values).map_err(|e| CacheError::Corrupt {
                    provider: provider.to_string(),
                    name: name.to_string(),
                    reason: e.to_string(),
                })?
            }
            _ => "[]".to_string(),
        };
        let (error_kind, error_message) = match result {
            AttributeResult::Error(e) => (Some(e.kind().as_str()), Some(e.message())),
            _ => (None, None),
        };

        sqlx::query(
            "INSERT INTO lookup_cache
                (provider, scope, name, status, vals, error_kind, error_message, looked_up_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(provider, scope, name) DO UPDATE SET
                status = excluded.status,
                vals = excluded.vals,
                error_kind = excluded.error_kind,
                error_message = excluded.error_message,
                looked_up_at = excluded.looked_up_at",
        )
        .bind(provider.as_str())
        .bind(scope)
        .bind(name.as_str())
        .bind(result.status().as_str())
        .bind(&vals)
        .bind(error_kind)
        .bind(error_message)
        .bind(looked_up_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(CacheEntry {
            name: name.clone(),
            provider,
            scope: scope.to_string(),
            result: result.clone(),
            looked_up_at,
        })
    }

    /// Counts across all providers.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM lookup_cache GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = CacheStats::default();
        for (status, count) in rows {
            if let Ok(status) = status.parse::<LookupStatus>() {
                stats.add(status, count.max(0) as u64);
            }
        }
        Ok(stats)
    }

    /// Counts per provider, in provider order.
    pub async fn stats_by_provider(&self) -> Result<BTreeMap<ProviderId, CacheStats>, CacheError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT provider, status, COUNT(*) FROM lookup_cache GROUP BY provider, status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_provider: BTreeMap<ProviderId, CacheStats> = BTreeMap::new();
        for (provider, status, count) in rows {
            let (Ok(provider), Ok(status)) =
                (provider.parse::<ProviderId>(), status.parse::<LookupStatus>())
            else {
                tracing::warn!("Skipping unrecognized cache rows: {}/{}", provider, status);
                continue;
            };
            by_provider
                .entry(provider)
                .or_default()
                .add(status, count.max(0) as u64);
        }
        Ok(by_provider)
    }

    /// Close the pool, flushing the WAL.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
