use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::graph::SearchLimits;
use crate::provider::tmdb::TmdbSettings;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub graph_cache: GraphCacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Metadata provider (TMDB) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Cast lookups in flight while expanding one person
    #[serde(default = "default_cast_concurrency")]
    pub cast_concurrency: usize,
}

/// Search limits
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Maximum hops; 0 = unbounded
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum people expanded per query; 0 = unbounded
    #[serde(default = "default_max_expanded")]
    pub max_expanded: usize,
    /// Frontier nodes expanded concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_expanded: default_max_expanded(),
            parallelism: default_parallelism(),
        }
    }
}

/// Cross-query graph cache
#[derive(Debug, Clone, Deserialize)]
pub struct GraphCacheConfig {
    /// Reuse one graph across queries instead of starting empty each time
    #[serde(default)]
    pub shared: bool,
    /// The shared graph is dropped and restarted once it holds more people
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Capacity of the person-name LRU cache
    #[serde(default = "default_name_capacity")]
    pub name_capacity: usize,
}

impl Default for GraphCacheConfig {
    fn default() -> Self {
        Self {
            shared: false,
            max_nodes: default_max_nodes(),
            name_capacity: default_name_capacity(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_language() -> String {
    "pt-BR".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> usize {
    3
}

fn default_cast_concurrency() -> usize {
    4
}

fn default_max_depth() -> usize {
    6
}

fn default_max_expanded() -> usize {
    2000
}

fn default_parallelism() -> usize {
    4
}

fn default_max_nodes() -> usize {
    200_000
}

fn default_name_capacity() -> usize {
    10_000
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in SIXDEGREES_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("SIXDEGREES_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.provider.base_url)
            .with_context(|| format!("provider.base_url is not a valid URL: {}", self.provider.base_url))?;

        self.api_key()?;

        if self.provider.timeout_secs == 0 {
            anyhow::bail!("provider.timeout_secs must be greater than 0");
        }

        if self.provider.cast_concurrency == 0 {
            anyhow::bail!("provider.cast_concurrency must be greater than 0");
        }

        if self.search.parallelism == 0 {
            anyhow::bail!("search.parallelism must be greater than 0");
        }

        if self.graph_cache.shared && self.graph_cache.max_nodes == 0 {
            anyhow::bail!("graph_cache.max_nodes must be greater than 0 when the cache is shared");
        }

        Ok(())
    }

    /// Read the provider API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.provider.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your TMDB API key.",
                self.provider.api_key_env
            )
        })
    }

    /// Per-call provider timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    /// TMDB client settings; the API key comes from the environment
    pub fn tmdb_settings(&self) -> Result<TmdbSettings> {
        Ok(TmdbSettings {
            base_url: self.provider.base_url.clone(),
            api_key: self.api_key()?,
            language: self.provider.language.clone(),
            timeout: self.provider_timeout(),
            max_retries: self.provider.max_retries,
            ..TmdbSettings::default()
        })
    }

    /// Search limits, with 0 meaning unbounded
    pub fn search_limits(&self) -> SearchLimits {
        let bound = |v: usize| if v == 0 { None } else { Some(v) };
        SearchLimits::new(
            bound(self.search.max_depth),
            bound(self.search.max_expanded),
            self.search.parallelism,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const TEST_CONFIG: &str = r#"
[general]
log_level = "debug"

[provider]
base_url = "https://api.themoviedb.org/3"
api_key_env = "SIXDEGREES_TEST_TMDB_KEY"
language = "en-US"
timeout_secs = 5

[search]
max_depth = 4
max_expanded = 0
parallelism = 8

[graph_cache]
shared = true
max_nodes = 5000
"#;

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(std::path::PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: &std::path::Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("SIXDEGREES_CONFIG").ok();
        std::env::set_var("SIXDEGREES_CONFIG", config_path.to_str().unwrap());
        match api_key {
            Some(k) => std::env::set_var("SIXDEGREES_TEST_TMDB_KEY", k),
            None => std::env::remove_var("SIXDEGREES_TEST_TMDB_KEY"),
        }
        f();
        std::env::remove_var("SIXDEGREES_CONFIG");
        std::env::remove_var("SIXDEGREES_TEST_TMDB_KEY");
        if let Some(val) = original_config {
            std::env::set_var("SIXDEGREES_CONFIG", val);
        }
    }

    fn write_config(temp_dir: &TempDir, content: &str) -> std::path::PathBuf {
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, content).unwrap();
        config_path.canonicalize().unwrap()
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, TEST_CONFIG);
        with_config_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.general.log_level, "debug");
            assert_eq!(config.provider.timeout_secs, 5);
            assert_eq!(config.provider.max_retries, 3); // default
            assert!(config.graph_cache.shared);
            assert_eq!(config.tmdb_settings().unwrap().api_key, "test-key");
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, TEST_CONFIG);
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir);
        // No .env in the temp dir, so dotenv cannot supply the key
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing API key error");
            assert!(config.unwrap_err().to_string().contains("SIXDEGREES_TEST_TMDB_KEY"));
        });
    }

    #[test]
    fn test_config_loads_key_from_env_file() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, TEST_CONFIG);
        fs::write(
            temp_dir.path().join(".env"),
            "SIXDEGREES_TEST_TMDB_KEY=key-from-env-file\n",
        )
        .unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir);
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config should load with API key from .env file");
            assert_eq!(config.unwrap().api_key().unwrap(), "key-from-env-file");
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("SIXDEGREES_CONFIG").ok();
        std::env::set_var("SIXDEGREES_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("SIXDEGREES_CONFIG");
        if let Some(v) = original {
            std::env::set_var("SIXDEGREES_CONFIG", v);
        }
    }

    #[test]
    fn test_defaults_and_limits() {
        let config = Config::from_toml(
            r#"
[provider]
api_key_env = "TMDB_API_KEY"
"#,
        )
        .unwrap();
        assert_eq!(config.provider.language, "pt-BR");
        assert_eq!(config.provider.base_url, "https://api.themoviedb.org/3");
        assert!(!config.graph_cache.shared);
        assert_eq!(config.search_limits(), SearchLimits::new(Some(6), Some(2000), 4));

        let custom = Config::from_toml(TEST_CONFIG).unwrap();
        assert_eq!(custom.search_limits(), SearchLimits::new(Some(4), None, 8));
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let mut config = Config::from_toml(TEST_CONFIG).unwrap();
        config.search.parallelism = 0;
        std::env::set_var("SIXDEGREES_TEST_TMDB_KEY", "k");
        let err = config.validate().unwrap_err();
        std::env::remove_var("SIXDEGREES_TEST_TMDB_KEY");
        assert!(err.to_string().contains("parallelism"));
    }
}
