//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\concert-enricher\config.toml
//! - macOS: ~/Library/Application Support/concert-enricher/config.toml
//! - Linux: ~/.config/concert-enricher/config.toml
//!
//! The config file is human-readable and editable. Command-line flags and
//! environment variables take precedence over anything set here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::enrichment::http::{HttpSettings, USER_AGENT};
use crate::enrichment::provider::Credentials;
use crate::enrichment::service::RetryPolicy;
use crate::enrichment::{Domain, Provider};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials for the providers that need them
    pub credentials: Credentials,

    /// Where the cache and mapping files live
    pub storage: StorageConfig,

    /// Per-provider request ceilings, keyed by provider id (0 = unbounded)
    pub rate_limits: BTreeMap<String, u32>,

    /// Backoff for transient provider failures
    pub retry: RetryConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,
}

/// File locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Lookup cache database (None = OS cache directory)
    pub cache_path: Option<PathBuf>,

    /// City -> state mapping file
    pub city_mapping: PathBuf,

    /// Artist -> genres mapping file
    pub artist_mapping: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            city_mapping: PathBuf::from("city_state_mapping.json"),
            artist_mapping: PathBuf::from("artist_genre_mapping.json"),
        }
    }
}

/// Retry settings, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per provider call, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            rate_limit_delay_ms: policy.rate_limit_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_secs: u64,

    /// Override the default User-Agent (Nominatim asks for contact details)
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| USER_AGENT.to_string()),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

impl Config {
    /// Apply the `[rate_limits]` override for this provider, if any.
    pub fn tune(&self, provider: Provider) -> Provider {
        match self.rate_limits.get(provider.id().as_str()) {
            Some(rps) => provider.with_rate_limit(Some(*rps)),
            None => provider,
        }
    }

    /// Default mapping file for a domain
    pub fn mapping_path(&self, domain: Domain) -> &Path {
        match domain {
            Domain::CityState => &self.storage.city_mapping,
            Domain::ArtistGenre => &self.storage.artist_mapping,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("concert-enricher"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    load_from(&path)
}

/// Load configuration from an explicit path, with the same fallbacks as [`load`].
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to `path`, creating its directory if needed.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::ProviderConfig;
    use crate::enrichment::nominatim::NominatimConfig;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[storage]"));
        assert!(toml.contains("[retry]"));
        assert!(toml.contains("[http]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.credentials.google_api_key = Some("test-key-123".to_string());
        config.rate_limits.insert("nominatim".to_string(), 2);
        config.storage.cache_path = Some(PathBuf::from("/tmp/cache.db"));
        config.retry.max_attempts = 5;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        // Config with only some fields
        let toml = r#"
[credentials]
lastfm_api_key = "my-key"

[rate_limits]
google = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();

        // Specified fields are set
        assert_eq!(config.credentials.lastfm_api_key, Some("my-key".to_string()));
        assert_eq!(config.rate_limits.get("google"), Some(&5));

        // Other fields use defaults
        assert_eq!(config.credentials.google_api_key, None);
        assert_eq!(
            config.storage.city_mapping,
            PathBuf::from("city_state_mapping.json")
        );
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.http.timeout_secs, 10);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let retry = RetryConfig {
            max_attempts: 0,
            base_delay_ms: 100,
            rate_limit_delay_ms: 1_000,
            max_delay_ms: 2_000,
        };
        let policy = retry.policy();
        // Zero attempts would mean never calling the provider
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(RetryConfig::default().policy(), RetryPolicy::default());
    }

    #[test]
    fn test_http_settings() {
        let settings = HttpConfig::default().settings();
        assert_eq!(settings.user_agent, USER_AGENT);
        assert_eq!(settings.timeout, Duration::from_secs(10));

        let custom = HttpConfig {
            timeout_secs: 3,
            user_agent: Some("MyScript/1.0 (me@example.com)".into()),
        };
        assert_eq!(custom.settings().user_agent, "MyScript/1.0 (me@example.com)");
    }

    #[test]
    fn test_rate_limit_override() {
        let mut config = Config::default();
        config.rate_limits.insert("nominatim".into(), 0);

        let nominatim = Provider::new(ProviderConfig::Nominatim(NominatimConfig::default()));
        assert_eq!(config.tune(nominatim).max_requests_per_second, None);
    }

    #[test]
    fn test_mapping_path_by_domain() {
        let config = Config::default();
        assert_eq!(
            config.mapping_path(Domain::CityState),
            Path::new("city_state_mapping.json")
        );
        assert_eq!(
            config.mapping_path(Domain::ArtistGenre),
            Path::new("artist_genre_mapping.json")
        );
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.credentials.mapbox_access_token = Some("pk.token".into());

        save_to(&config, &path).unwrap();

        assert_eq!(load_from(&path), config);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        assert_eq!(load_from(&path), Config::default());
    }
}
