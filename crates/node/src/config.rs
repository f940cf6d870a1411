//! Node configuration.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use proxybid_engine::EngineConfig;
use serde::Deserialize;

/// Default RPC listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9944";

/// Configuration loaded from `--config`.
///
/// ```toml
/// listen = "127.0.0.1:9944"
/// start_time = "2026-01-01T00:00:00Z"
///
/// [engine]
/// autobid_enabled = true
/// proxy_ordering = "earliest_first"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub listen: Option<SocketAddr>,
    /// Initial reading of the simulated clock. Defaults to the wall clock.
    pub start_time: Option<DateTime<Utc>>,
    pub engine: EngineConfig,
}

impl NodeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse node config")?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        match self.listen {
            Some(addr) => Ok(addr),
            None => Ok(DEFAULT_LISTEN.parse()?),
        }
    }
}
