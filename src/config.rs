//! Env-driven configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const ENDPOINT_URL_VAR: &str = "OCTOMERGE_ENDPOINT_URL";
pub const TOKEN_VAR: &str = "OCTOAI_TOKEN";
const BIND_ADDR_VAR: &str = "OCTOMERGE_BIND_ADDR";
const PRESETS_VAR: &str = "OCTOMERGE_PRESETS";
const ASSETS_DIR_VAR: &str = "OCTOMERGE_ASSETS_DIR";
const POLL_INTERVAL_VAR: &str = "OCTOMERGE_POLL_INTERVAL_MS";
const SESSION_IDLE_VAR: &str = "OCTOMERGE_SESSION_IDLE_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PRESETS: &str = "presets.json";
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set (environment or .env file)")]
    Missing(&'static str),

    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OctoMerge inference endpoint.
    pub endpoint_url: String,
    /// Bearer token passed through to the inference service.
    pub token: String,
    pub bind_addr: SocketAddr,
    pub presets_path: PathBuf,
    pub assets_dir: PathBuf,
    pub poll_interval: Duration,
    /// Sessions untouched for this long are dropped and their merges cancelled.
    pub session_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let endpoint_url = required(ENDPOINT_URL_VAR)?;
        let token = required(TOKEN_VAR)?;

        let bind_raw = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: BIND_ADDR_VAR,
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let poll_interval = positive(&lookup, POLL_INTERVAL_VAR, DEFAULT_POLL_INTERVAL_MS)?;
        let session_idle = positive(&lookup, SESSION_IDLE_VAR, DEFAULT_SESSION_IDLE_SECS)?;

        Ok(Self {
            endpoint_url,
            token,
            bind_addr,
            presets_path: lookup(PRESETS_VAR).unwrap_or_else(|| DEFAULT_PRESETS.to_string()).into(),
            assets_dir: lookup(ASSETS_DIR_VAR).unwrap_or_else(|| DEFAULT_ASSETS_DIR.to_string()).into(),
            poll_interval: Duration::from_millis(poll_interval),
            session_idle: Duration::from_secs(session_idle),
        })
    }

    /// How often idle sessions are looked for: a tenth of the idle limit, at least once a second.
    pub fn sweep_interval(&self) -> Duration {
        (self.session_idle / 10).max(Duration::from_secs(1))
    }

    /// Full URL of the SDXL merge route on the configured endpoint.
    pub fn generate_url(&self) -> String {
        format!("{}/generate/sdxl", self.endpoint_url.trim_end_matches('/'))
    }
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    let value: u64 = raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
