//! Server configuration from environment variables.

use std::collections::HashSet;
use std::time::Duration;

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// SQLite connection string for the graph store.
    pub database_url: String,

    /// Origins allowed by CORS; empty or `*` means permissive.
    pub allowed_origins: Vec<String>,

    /// Client addresses that bypass the investigation quota.
    pub whitelisted_ips: HashSet<String>,

    /// Investigations allowed per client per window.
    pub rate_limit_max: u32,

    /// Quota window length.
    pub rate_limit_window: Duration,

    /// Hard cap on any single stream connection.
    pub stream_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "sqlite:lenslink.db".to_string(),
            allowed_origins: Vec::new(),
            whitelisted_ips: HashSet::new(),
            rate_limit_max: 50,
            rate_limit_window: Duration::from_secs(86_400),
            stream_timeout: Duration::from_secs(600),
        }
    }
}

impl ServerConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            allowed_origins: csv_env("ALLOWED_ORIGINS"),
            whitelisted_ips: csv_env("WHITELISTED_IPS").into_iter().collect(),
            rate_limit_max: std::env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rate_limit_max),
            rate_limit_window: Duration::from_secs(
                std::env::var("RATE_LIMIT_WINDOW_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(86_400),
            ),
            stream_timeout: defaults.stream_timeout,
        }
    }

    /// Bind address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn csv_env(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.rate_limit_max, 50);
        assert_eq!(config.rate_limit_window, Duration::from_secs(86_400));
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }
}
