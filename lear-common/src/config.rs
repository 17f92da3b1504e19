//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a small TOML file. Anything not present falls
//! back to a built-in default, so an absent file is not an error.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit SQLite database path; defaults to `<root_folder>/lear.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Per-branch timeout applied while acquiring a book
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub gutenberg: GutenbergConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Remote text archive settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GutenbergConfig {
    #[serde(default = "default_gutenberg_base_url")]
    pub base_url: String,
}

/// Upstream chat completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_api_url")]
    pub api_url: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Bearer token; environment variables take priority over this value
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_gutenberg_base_url() -> String {
    "https://www.gutenberg.org".to_string()
}

fn default_chat_api_url() -> String {
    "https://api.sambanova.ai/v1/chat/completions".to_string()
}

fn default_chat_model() -> String {
    "Meta-Llama-3.1-70B-Instruct".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            root_folder: None,
            database_path: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            logging: LoggingConfig::default(),
            gutenberg: GutenbergConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GutenbergConfig {
    fn default() -> Self {
        Self {
            base_url: default_gutenberg_base_url(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: default_chat_api_url(),
            model: default_chat_model(),
            api_token: None,
        }
    }
}

/// Load TOML configuration
///
/// An explicit path must exist. Without one, the platform config file is used
/// when present and built-in defaults otherwise.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_file() {
            Some(path) if path.exists() => path,
            _ => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Parse TOML text into a configuration, filling defaults
pub fn parse_toml_config(content: &str) -> std::result::Result<TomlConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Resolve the root folder (CLI → ENV → TOML → OS default)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Database path: explicit setting, else `lear.db` inside the root folder
pub fn database_path(root_folder: &Path, toml_config: &TomlConfig) -> PathBuf {
    toml_config
        .database_path
        .clone()
        .unwrap_or_else(|| root_folder.join("lear.db"))
}

/// Platform configuration file (`~/.config/lear/lear.toml` on Linux)
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lear").join("lear.toml"))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lear"))
        .unwrap_or_else(|| PathBuf::from("./lear_data"))
}
