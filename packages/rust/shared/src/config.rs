//! Application configuration for factlearn.
//!
//! User config lives at `~/.factlearn/factlearn.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LearnError, Result};
use crate::types::{DEFAULT_EDGE, DEFAULT_FACT_SCORE};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "factlearn.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".factlearn";

// ---------------------------------------------------------------------------
// Config structs (matching factlearn.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Parser registration table.
    #[serde(default)]
    pub parsers: ParsersConfig,

    /// Learning pipeline tunables.
    #[serde(default)]
    pub learning: LearningConfig,
}

/// `[parsers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsersConfig {
    /// Built-in parsers to register, in invocation order.
    #[serde(default = "default_enabled_parsers")]
    pub enabled: Vec<String>,

    /// Regex-driven parsers appended after the built-ins.
    #[serde(default)]
    pub custom: Vec<PatternParserConfig>,
}

impl Default for ParsersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_parsers(),
            custom: Vec::new(),
        }
    }
}

fn default_enabled_parsers() -> Vec<String> {
    vec!["ip".into(), "path".into()]
}

/// `[[parsers.custom]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternParserConfig {
    /// Parser name used in logs; must be unique across the registry.
    pub name: String,
    /// Trait stamped on every fact this parser yields.
    #[serde(rename = "trait")]
    pub trait_name: String,
    /// Regex; the first capture group (or the whole match) is the value.
    pub pattern: String,
}

/// `[learning]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Edge label for inferred relationships.
    #[serde(default = "default_edge")]
    pub edge: String,

    /// Score given to facts yielded by parsers.
    #[serde(default = "default_initial_score")]
    pub initial_score: i64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            edge: default_edge(),
            initial_score: default_initial_score(),
        }
    }
}

fn default_edge() -> String {
    DEFAULT_EDGE.into()
}
fn default_initial_score() -> i64 {
    DEFAULT_FACT_SCORE
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.factlearn/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LearnError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.factlearn/factlearn.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LearnError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LearnError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LearnError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LearnError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LearnError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Checks that do not need the parser registry. Parser names and patterns
/// are validated when the registry is built.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.learning.edge.trim().is_empty() {
        return Err(LearnError::config("learning.edge must not be empty"));
    }
    Ok(())
}
