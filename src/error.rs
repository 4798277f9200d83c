//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while the
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors (e.g., [`CacheError`], [`MappingError`]) for detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use concert_enricher::error::{Result, ResultExt};
//!
//! fn load(path: &Path) -> Result<Table> {
//!     Table::read_csv(path).with_context(format!("loading {}", path.display()))
//! }
//! ```

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::enrichment::ProviderError;
use crate::enrichment::domain::{InvalidName, UnknownCountry, UnknownProvider};
use crate::mapping::MappingError;
use crate::records::RecordsError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lookup cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Mapping file error
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// CSV input/output error
    #[error("Records error: {0}")]
    Records(#[from] RecordsError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider could not be set up or failed outright
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Empty entity name
    #[error(transparent)]
    InvalidName(#[from] InvalidName),

    /// Provider id not recognised
    #[error(transparent)]
    UnknownProvider(#[from] UnknownProvider),

    /// Country name or code not recognised
    #[error(transparent)]
    UnknownCountry(#[from] UnknownCountry),

    /// Invalid command-line usage
    #[error("Invalid usage: {0}")]
    Usage(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_display() {
        let err = Error::from(ProviderError::Auth("HTTP 401".into()));
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::usage("no providers given").context("while enriching cities");
        let msg = err.to_string();
        assert!(msg.contains("while enriching cities"));
        assert!(msg.contains("no providers given"));
    }

    #[test]
    fn test_mapping_error() {
        let err: Error = MappingError::Io {
            path: PathBuf::from("/data/city_state_mapping.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("city_state_mapping.json"));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::usage("test"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));

        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = io.with_context("reading concerts.csv").unwrap_err();
        assert!(matches!(err, Error::WithContext { ref source, .. } if matches!(**source, Error::Io(_))));
    }

    #[test]
    fn test_invalid_name_converts() {
        let err: Error = crate::enrichment::EntityName::new("  ").unwrap_err().into();
        assert!(matches!(err, Error::InvalidName(_)));
    }
}
