use crate::error::{CyclerError, Result};
use crate::models::ProxySpec;
use crate::proxy::ProxyPool;
use std::env;

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Pool configuration
    pub pool: PoolConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Proxies to seed the pool with
    pub proxies: Vec<ProxySpec>,
    /// Maximum number of targets remembered per proxy (unbounded if unset)
    pub max_tracked_targets: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let format = get_env_or("LOG_FORMAT", "pretty").to_lowercase();
        if format != "json" && format != "pretty" {
            return Err(CyclerError::InvalidConfig(
                "LOG_FORMAT must be json or pretty".into(),
            ));
        }

        Ok(Config {
            pool: PoolConfig {
                proxies: parse_proxy_list(&get_env_or("CYCLER_PROXIES", ""))?,
                max_tracked_targets: parse_max_tracked_targets()?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format,
            },
        })
    }

    /// Build a proxy pool from the configured proxies
    pub fn build_pool(&self) -> Result<ProxyPool> {
        let pool = ProxyPool::with_proxies(self.pool.proxies.iter().cloned())?;
        Ok(match self.pool.max_tracked_targets {
            Some(max) => pool.with_max_tracked_targets(max),
            None => pool,
        })
    }
}

/// Parse a proxy list: a JSON array of proxy objects, or comma-separated proxy URLs
pub fn parse_proxy_list(raw: &str) -> Result<Vec<ProxySpec>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    if raw.starts_with('[') {
        return serde_json::from_str(raw).map_err(|e| {
            CyclerError::InvalidConfig(format!("CYCLER_PROXIES must be a valid JSON array: {}", e))
        });
    }

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ProxySpec::from_url(s).map_err(|e| {
                CyclerError::InvalidConfig(format!("CYCLER_PROXIES entry {:?}: {}", s, e))
            })
        })
        .collect()
}

fn parse_max_tracked_targets() -> Result<Option<usize>> {
    let raw = get_env_or("CYCLER_MAX_TRACKED_TARGETS", "");
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(CyclerError::InvalidConfig(
            "CYCLER_MAX_TRACKED_TARGETS must be a positive integer".into(),
        )),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
