//! Shade Configuration
//!
//! Shared configuration crate for all Shade components.
//!
//! Handles loading configuration from:
//! 1. SHADE_CONFIG env var (explicit path)
//! 2. ./shade.toml (current directory)
//! 3. ~/.shade/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ShadeConfig> = OnceLock::new();

const LOCAL_CONFIG_FILE_NAME: &str = "shade.toml";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".shade";

// ============================================================================
// Default Constants
// ============================================================================

/// Depth of every tree in the forest: one triad level plus 14 binary levels.
pub const DEFAULT_TREE_DEPTH: u32 = 15;
const DEFAULT_SNAPSHOT_PATH: &str = "./shade-forest.json.gz";
const DEFAULT_SNAPSHOT_COMPRESS: bool = true;
const DEFAULT_LOG_FILTER: &str = "info";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadeConfig {
    #[serde(default)]
    pub forest: ForestConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Merkle forest parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Tree depth D; each tree holds `3 * 2^(D-1)` leaves
    #[serde(default = "default_tree_depth")]
    pub depth: u32,
    /// Empty-leaf value as a `0x`-prefixed big-endian hex field element.
    /// `None` means zero.
    #[serde(default)]
    pub zero_value: Option<String>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            zero_value: None,
        }
    }
}

fn default_tree_depth() -> u32 {
    DEFAULT_TREE_DEPTH
}

/// Snapshot persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_path")]
    pub path: String,
    /// Gzip the serialized forest before writing it
    #[serde(default = "default_snapshot_compress")]
    pub compress: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SNAPSHOT_PATH.into(),
            compress: DEFAULT_SNAPSHOT_COMPRESS,
        }
    }
}

fn default_snapshot_path() -> String {
    DEFAULT_SNAPSHOT_PATH.into()
}

fn default_snapshot_compress() -> bool {
    DEFAULT_SNAPSHOT_COMPRESS
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.into()
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        } else {
            log::warn!("Ignoring unparseable value for {key}: {v}");
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadeConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML document without touching the filesystem or environment
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config")
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHADE_CONFIG env var
        if let Ok(path) = env::var("SHADE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./shade.toml (current directory)
        let local_path = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shade/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Forest
        env_parse("SHADE_TREE_DEPTH", &mut self.forest.depth);
        env_option_string("SHADE_ZERO_VALUE", &mut self.forest.zero_value);

        // Snapshot
        env_string("SHADE_SNAPSHOT_PATH", &mut self.snapshot.path);
        if let Some(v) = env_bool("SHADE_SNAPSHOT_COMPRESS") {
            self.snapshot.compress = v;
        }

        // Logging
        env_string("SHADE_LOG", &mut self.logging.filter);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShadeConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ShadeConfig) -> Result<(), ShadeConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ShadeConfig::global()`.
#[inline]
pub fn global_config() -> &'static ShadeConfig {
    ShadeConfig::global()
}

// ============================================================================
// Logging
// ============================================================================

/// Install a `tracing` fmt subscriber.
///
/// RUST_LOG wins over the configured filter. `log` records from this crate
/// are bridged into the subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.filter))
        .with_context(|| format!("Invalid log filter: {}", config.filter))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
