//! Portal Configuration
//!
//! Built once at startup and shared read-only (`Arc<PortalConfig>`).
//! Precedence: defaults, then the optional TOML file, then environment
//! variables.
//!
//! | variable                  | field              |
//! |---------------------------|--------------------|
//! | `ARCADE_BIND`             | `bind_addr`        |
//! | `ARCADE_MAX_CONNECTIONS`  | `max_connections`  |
//! | `ARCADE_REQUIRE_AUTH`     | `require_auth`     |
//! | `ARCADE_PROFILE_PATH`     | `profile_path`     |
//! | `ARCADE_LOG`              | `log_filter`       |
//! | `AUTH_*`                  | `auth` (see `AuthConfig`) |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::network::auth::AuthConfig;
use crate::network::server::ServerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    InvalidVar { var: &'static str, value: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Game host listen address.
    pub bind_addr: SocketAddr,
    pub max_connections: usize,
    /// Reject `open` before a successful `auth`.
    pub require_auth: bool,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Where the profile context is cached.
    pub profile_path: PathBuf,
    pub auth: AuthConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            require_auth: false,
            log_filter: "info".to_string(),
            profile_path: PathBuf::from("arcade-profile.json"),
            auth: AuthConfig::default(),
        }
    }
}

impl PortalConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults or `path`, with the process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_vars(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay variables read through `var`.
    pub fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = var("ARCADE_BIND") {
            self.bind_addr = parse_var("ARCADE_BIND", v)?;
        }
        if let Some(v) = var("ARCADE_MAX_CONNECTIONS") {
            self.max_connections = parse_var("ARCADE_MAX_CONNECTIONS", v)?;
        }
        if let Some(v) = var("ARCADE_REQUIRE_AUTH") {
            self.require_auth = parse_flag("ARCADE_REQUIRE_AUTH", v)?;
        }
        if let Some(v) = var("ARCADE_PROFILE_PATH") {
            self.profile_path = PathBuf::from(v);
        }
        if let Some(v) = var("ARCADE_LOG") {
            self.log_filter = v;
        }
        self.auth.apply_vars(&var);
        Ok(())
    }

    /// Settings for the game host.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr,
            max_connections: self.max_connections,
            require_auth: self.require_auth,
            auth: self.auth.clone(),
            ..ServerConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVar { var, value })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidVar { var, value }),
    }
}
