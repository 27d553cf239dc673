//! Session settings for the coordination layer.
//!
//! Settings are an explicit value handed to whoever constructs a session;
//! nothing here is process-wide state. [`SessionSettings::load`] layers an
//! optional TOML file under `PERCH_`-prefixed environment overrides, with
//! hardcoded defaults below both.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::Result;

const ENV_PREFIX: &str = "PERCH";

fn default_servers() -> String {
    "127.0.0.1:2181".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_session_timeout_ms() -> u64 {
    30_000
}

/// Connection parameters for one logical session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Comma-separated service addresses.
    #[serde(default = "default_servers")]
    pub servers: String,

    /// Bounded wait for the transport to report connected.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Liveness window the service applies to this session; ephemeral nodes
    /// outlive the connection by at most this long.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            connect_timeout_ms: default_connect_timeout_ms(),
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

impl SessionSettings {
    /// Load settings from an optional TOML file, then apply environment
    /// overrides (`PERCH_SERVERS`, `PERCH_CONNECT_TIMEOUT_MS`, ...).
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}
