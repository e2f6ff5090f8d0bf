//! Configuration management for Freshet.
//!
//! Configuration is read from `~/.config/freshet/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub connectivity: ConnectivityConfig,
    pub storage: StorageConfig,
}

/// Where the Directus instance lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Directus base URL (default: `http://localhost:8055`)
    pub base_url: String,

    /// Static access token; omit when the collections are public
    pub token: Option<String>,

    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8055".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Articles per page (default: 10)
    pub page_size: u32,

    /// Keep current items on screen while a filter change reloads
    /// (default: false)
    pub keep_items_while_reloading: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            keep_items_while_reloading: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Seconds between background reachability probes (default: 30)
    pub poll_interval_secs: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the local database; defaults to the platform data
    /// directory when unset
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            // Create default config with comments
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/freshet/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("freshet").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let default_config = Self::default_config_content();

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(default_config.as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Freshet Configuration
#
# The [api] section points at your Directus instance. A static token
# is only needed when the article and topic collections are not public.

[api]
# Directus base URL
base_url = "http://localhost:8055"

# Static access token (optional)
# token = "your-token-here"

# Request timeout in seconds
timeout_secs = 10

[feed]
# Articles per page
page_size = 10

# Keep the current items on screen while a filter change reloads,
# instead of blanking the list
keep_items_while_reloading = false

[connectivity]
# Seconds between background reachability probes
poll_interval_secs = 30

[storage]
# Path to the local database. Defaults to the platform data directory.
# db_path = "/home/user/.local/share/freshet/freshet.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
