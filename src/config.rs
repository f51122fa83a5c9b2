/// Server configuration
///
/// Settings come from the environment (`HOST`, `PORT`, `LIVEFRAME_BACKEND`)
/// or from a TOML document with the same keys in lowercase. Anything not
/// given falls back to the defaults below.

use crate::backend::BackendKind;
use crate::error::{FrameError, Result};
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Backend for frames created without an explicit selector
    pub default_backend: BackendKind,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_backend: BackendKind::default(),
        }
    }
}

impl ServerConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .map_err(|_| FrameError::Config(format!("PORT must be a number, got '{}'", port)))?;
        }
        if let Some(backend) = lookup("LIVEFRAME_BACKEND") {
            config.default_backend = backend.parse()?;
        }
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FrameError::Config(e.to_string()))
    }

    /// The backend selector string for frame construction.
    pub fn backend_selector(&self) -> &'static str {
        self.default_backend.as_str()
    }
}
