//! Configuration loading and root folder resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error. A TOML file that exists but cannot
//! be parsed is.

use crate::{Error, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "condo-ledger";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "condo.db";

pub const ENV_ROOT_FOLDER: &str = "CONDO_ROOT_FOLDER";
pub const ENV_DATABASE: &str = "CONDO_DATABASE";
pub const ENV_BIND: &str = "CONDO_BIND";
pub const ENV_PORT: &str = "CONDO_PORT";
pub const ENV_ADMIN_USERNAME: &str = "CONDO_ADMIN_USERNAME";
pub const ENV_ADMIN_PASSWORD: &str = "CONDO_ADMIN_PASSWORD";

/// Compiled defaults, used when nothing else provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub session_ttl_hours: u32,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            bind_address: IpAddr::from([127, 0, 0, 1]),
            port: 5780,
            log_level: "info".to_string(),
            session_ttl_hours: 12,
        }
    }
}

/// Bootstrap configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Database file; relative paths resolve against the root folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Apply a permissive CORS layer to the HTTP server
    #[serde(default)]
    pub cors_permissive: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub session_ttl_hours: Option<u32>,

    #[serde(default)]
    pub admin_username: Option<String>,

    #[serde(default)]
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_ttl_hours: None,
            admin_username: None,
            admin_password: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub root_folder: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub bind_address: Option<IpAddr>,
    pub port: Option<u16>,
    pub disable_auth: bool,
}

/// Bootstrap administrator credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Resolved authentication settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub enabled: bool,
    pub session_ttl_hours: u32,
    pub bootstrap_admin: Option<AdminCredentials>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub bind_address: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub cors_permissive: bool,
    pub auth: AuthSettings,
}

impl Settings {
    /// Resolve settings from CLI overrides, environment, TOML and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let toml_config = match &overrides.config_file {
            Some(path) if path.exists() => load_toml_config(path)?,
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                TomlConfig::default()
            }
            None => match default_config_file() {
                Some(path) => load_toml_config(&path)?,
                None => {
                    info!("No config file found, using defaults");
                    TomlConfig::default()
                }
            },
        };

        Self::resolve_with(overrides, toml_config, CompiledDefaults::for_current_platform())
    }

    /// Resolve against an already loaded TOML config and explicit defaults
    pub fn resolve_with(
        overrides: &ConfigOverrides,
        toml_config: TomlConfig,
        defaults: CompiledDefaults,
    ) -> Result<Self> {
        let root_folder = overrides
            .root_folder
            .clone()
            .or_else(|| env_path(ENV_ROOT_FOLDER))
            .or(toml_config.root_folder)
            .unwrap_or(defaults.root_folder);

        let database_path = overrides
            .database
            .clone()
            .or_else(|| env_path(ENV_DATABASE))
            .or(toml_config.database_path)
            .map(|p| if p.is_relative() { root_folder.join(p) } else { p })
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME));

        let bind_address = match overrides.bind_address {
            Some(addr) => addr,
            None => match env_string(ENV_BIND).or(toml_config.bind_address) {
                Some(raw) => raw.parse().map_err(|_| {
                    Error::Config(format!("Invalid bind address: {}", raw))
                })?,
                None => defaults.bind_address,
            },
        };

        let port = match overrides.port {
            Some(port) => port,
            None => match env_string(ENV_PORT) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid {}: {}", ENV_PORT, raw)))?,
                None => toml_config.port.unwrap_or(defaults.port),
            },
        };

        let log_level = toml_config.logging.level.unwrap_or(defaults.log_level);

        let username = env_string(ENV_ADMIN_USERNAME).or(toml_config.auth.admin_username);
        let password = env_string(ENV_ADMIN_PASSWORD).or(toml_config.auth.admin_password);
        let bootstrap_admin = match (username, password) {
            (Some(username), Some(password)) => Some(AdminCredentials { username, password }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Bootstrap admin needs both a username and a password; ignoring");
                None
            }
            (None, None) => None,
        };

        let session_ttl_hours = toml_config
            .auth
            .session_ttl_hours
            .unwrap_or(defaults.session_ttl_hours);
        if session_ttl_hours == 0 {
            return Err(Error::Config("auth.session_ttl_hours must be at least 1".to_string()));
        }

        Ok(Self {
            root_folder,
            database_path,
            bind_address,
            port,
            log_level,
            cors_permissive: toml_config.cors_permissive,
            auth: AuthSettings {
                enabled: toml_config.auth.enabled && !overrides.disable_auth,
                session_ttl_hours,
                bootstrap_admin,
            },
        })
    }

    /// Socket address the server listens on
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Create the root folder if it does not exist
    pub fn ensure_root_folder(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// First existing config file in the platform search path
pub fn default_config_file() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR_NAME).join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml"));
    }
    candidates.into_iter().find(|p| p.exists())
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./condo_data"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}
