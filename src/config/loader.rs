// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        // Substitute environment variables
        let content = Self::substitute_env_vars(&content)?;

        // Parse YAML
        let config: ServiceConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${PG_URL} -> postgres://db:5432/counts
    /// - ${REDIS_ADDR:-localhost:6379} -> localhost:6379 (if REDIS_ADDR not set)
    pub(crate) fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}")
            .context("Invalid substitution pattern")?;

        let substituted = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        });

        Ok(substituted.into_owned())
    }

    /// Validate configuration
    ///
    /// The storage mode is deliberately not checked here: an unknown mode
    /// falls back to the in-memory store when the backend is built.
    pub(crate) fn validate(config: &ServiceConfig) -> Result<()> {
        if config.server.request_timeout_ms == 0 {
            bail!("server.request_timeout_ms must be > 0");
        }

        if config.storage.redis.timeout_ms == 0 {
            bail!("storage.redis.timeout_ms must be > 0");
        }

        if config.storage.database.max_connections == 0 {
            bail!("storage.database.max_connections must be > 0");
        }

        match config.dns.network.as_str() {
            "udp" | "tcp" => {}
            other => bail!("dns.network must be 'udp' or 'tcp', got '{}'", other),
        }

        if config.dns.timeout_ms == 0 {
            bail!("dns.timeout_ms must be > 0");
        }

        Ok(())
    }
}
