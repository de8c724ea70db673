use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::catalog::http::Credentials;

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Catalog API settings.
    pub catalog: CatalogConfig,
    /// Delays between catalog calls.
    pub pacing: PacingConfig,
    /// Modeling stage settings.
    pub model: ModelConfig,
}

/// Catalog API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_base: String,
    pub token_url: String,
    /// Market code sent with track listings.
    pub market: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Transport-level retries for 429/5xx/connection failures.
    pub retries: u32,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            market: "US".to_string(),
            timeout_secs: 30,
            retries: 5,
            client_id: None,
            client_secret: None,
        }
    }
}

impl CatalogConfig {
    /// Resolve credentials: environment > config file.
    pub fn credentials(&self) -> Option<Credentials> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .ok()
            .or_else(|| self.client_id.clone())
            .filter(|s| !s.is_empty())?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .ok()
            .or_else(|| self.client_secret.clone())
            .filter(|s| !s.is_empty())?;
        Some(Credentials { client_id, client_secret })
    }
}

/// Rate-limit delays in milliseconds. These keep us under the upstream
/// rate limit; throttling that slips through is handled as an ordinary failure.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacingConfig {
    pub playlist_page_ms: u64,
    pub search_page_ms: u64,
    pub release_page_ms: u64,
    /// Between releases (and their per-track fetches).
    pub release_ms: u64,
    pub feature_batch_ms: u64,
    pub feature_sub_batch_ms: u64,
    pub feature_single_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            playlist_page_ms: 50,
            search_page_ms: 100,
            release_page_ms: 100,
            release_ms: 50,
            feature_batch_ms: 50,
            feature_sub_batch_ms: 50,
            feature_single_ms: 20,
        }
    }
}

impl PacingConfig {
    /// No delays at all (tests, replayed sources).
    pub fn none() -> Self {
        Self {
            playlist_page_ms: 0,
            search_page_ms: 0,
            release_page_ms: 0,
            release_ms: 0,
            feature_batch_ms: 0,
            feature_sub_batch_ms: 0,
            feature_single_ms: 0,
        }
    }

    pub fn pause(ms: u64) {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}

/// Modeling stage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Popularity at or above this counts as a hit.
    pub hit_threshold: u32,
    /// Fraction of rows held out for evaluation.
    pub test_fraction: f64,
    pub seed: u64,
    pub ridge_alpha: f64,
    pub importance_repeats: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hit_threshold: 75,
            test_fraction: 0.2,
            seed: 42,
            ridge_alpha: 1.0,
            importance_repeats: 10,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/hitscope/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match Self::parse(&contents) {
                        Ok(config) => {
                            log::info!("Loaded config from {}", path.display());
                            config
                        }
                        Err(e) => {
                            log::warn!(
                                "Failed to parse {}: {}. Using defaults.",
                                path.display(),
                                e
                            );
                            Self::default()
                        }
                    },
                    Err(e) => {
                        log::warn!(
                            "Failed to read {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                }
            }
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<AppConfig>(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("hitscope.db")
    } else {
        // Fallback: current directory
        PathBuf::from("hitscope.db")
    }
}
