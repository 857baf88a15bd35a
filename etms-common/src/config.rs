//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ETMS_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file never stops startup; it is logged
//! and the compiled defaults are used instead.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "ETMS_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "etms.db";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub session_ttl_hours: Option<i64>,
    pub log_level: Option<String>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind: String,
    pub port: u16,
    pub session_ttl_hours: i64,
    pub log_level: String,
}

impl ServiceConfig {
    /// Resolve configuration from CLI overrides, environment, config file and defaults
    pub fn resolve(cli: &CliOverrides) -> Self {
        let toml_config = match find_config_file() {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            None => TomlConfig::default(),
        };

        Self::from_sources(cli, &toml_config)
    }

    /// Merge explicit sources; environment is still consulted for the root folder
    pub fn from_sources(cli: &CliOverrides, toml_config: &TomlConfig) -> Self {
        let root_folder =
            resolve_root_folder(cli.root_folder.as_deref(), ROOT_FOLDER_ENV, Some(toml_config));

        let session_ttl_hours = match toml_config.session_ttl_hours {
            Some(hours) if hours > 0 => hours,
            Some(hours) => {
                warn!(
                    "session_ttl_hours must be positive (got {}), using {}",
                    hours, DEFAULT_SESSION_TTL_HOURS
                );
                DEFAULT_SESSION_TTL_HOURS
            }
            None => DEFAULT_SESSION_TTL_HOURS,
        };

        Self {
            root_folder,
            bind: cli
                .bind
                .clone()
                .or_else(|| toml_config.bind.clone())
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: cli.port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
            session_ttl_hours,
            log_level: toml_config
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// `host:port` string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Resolve the root folder following the priority order in the module docs
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: Option<&TomlConfig>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = toml_config.and_then(|c| c.root_folder.clone()) {
        return root;
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Locate the config file for the platform, if one exists
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("etms").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/etms/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/etms (or /var/lib/etms for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("etms"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/etms"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("etms"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/etms"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("etms"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\etms"))
    } else {
        PathBuf::from("./etms_data")
    }
}
