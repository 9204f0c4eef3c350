// Configuration module for counting-service
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Environment variable overrides (PORT, STORAGE_MODE, PG_URL, ...)
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<ServiceConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Build configuration from defaults and the process environment only
pub fn config_from_env() -> Result<ServiceConfig> {
    let mut config = ServiceConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Apply environment overrides through `lookup`
///
/// Blank values count as unset. Millisecond settings that are not a
/// positive integer log a warning and reset to their default.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(port) = var("PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid PORT={:?}", port))?;
    }

    if let Some(raw) = var("DB_REQUEST_TIMEOUT_MS") {
        config.server.request_timeout_ms =
            parse_millis("DB_REQUEST_TIMEOUT_MS", &raw, default_request_timeout_ms());
    }

    if let Some(mode) = var("STORAGE_MODE") {
        config.storage.mode = mode;
    }

    if let Some(url) = var("PG_URL") {
        config.storage.database.url = Some(url);
    }

    let redis = &mut config.storage.redis;
    if let Some(topology) = var("REDIS_MODE") {
        redis.topology = topology
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Invalid REDIS_MODE: {}", e))?;
    }
    if let Some(address) = var("REDIS_ADDR") {
        redis.address = address;
    }
    if let Some(addresses) = var("REDIS_ADDRS") {
        redis.addresses = split_addresses(&addresses);
    }
    if let Some(master) = var("REDIS_MASTER_NAME") {
        redis.master_name = Some(master);
    }
    if let Some(password) = var("REDIS_PASSWORD") {
        redis.password = Some(password);
    }
    if let Some(db) = var("REDIS_DB") {
        redis.db = db
            .parse()
            .with_context(|| format!("Invalid REDIS_DB={:?}", db))?;
    }

    if let Some(server) = var("DNS_SERVER").or_else(|| var("CONSUL_DNS_ADDR")) {
        config.dns.server = Some(server);
    }
    if let Some(network) = var("DNS_NETWORK") {
        config.dns.network = network.to_lowercase();
    }
    if let Some(raw) = var("DNS_TIMEOUT_MS") {
        config.dns.timeout_ms = parse_millis("DNS_TIMEOUT_MS", &raw, default_dns_timeout_ms());
    }

    if let Some(level) = var("LOG_LEVEL") {
        config.logging.level = level;
    }

    Ok(())
}

fn parse_millis(name: &str, raw: &str, default_ms: u64) -> u64 {
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => ms,
        _ => {
            warn!("Invalid {}={:?}. Using default {}ms.", name, raw, default_ms);
            default_ms
        }
    }
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> Result<ServiceConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, |name| env.get(name).cloned())?;
        Ok(config)
    }

    #[test]
    fn test_no_env_keeps_defaults() {
        let config = overrides(&[]).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.storage.mode, "memory");
    }

    #[test]
    fn test_storage_overrides() {
        let config = overrides(&[
            ("PORT", "8080"),
            ("STORAGE_MODE", "cockroach"),
            ("PG_URL", "postgres://root@crdb:26257/defaultdb"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.mode, "cockroach");
        assert_eq!(
            config.storage.database.url.as_deref(),
            Some("postgres://root@crdb:26257/defaultdb")
        );
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = overrides(&[("STORAGE_MODE", "   "), ("PG_URL", "")]).unwrap();
        assert_eq!(config.storage.mode, "memory");
        assert!(config.storage.database.url.is_none());
    }

    #[test]
    fn test_redis_overrides() {
        let config = overrides(&[
            ("REDIS_MODE", "sentinel"),
            ("REDIS_ADDRS", "s1:26379, s2:26379,,s3:26379"),
            ("REDIS_MASTER_NAME", "mymaster"),
            ("REDIS_DB", "2"),
        ])
        .unwrap();
        let redis = &config.storage.redis;
        assert_eq!(redis.topology, RedisTopology::Sentinel);
        assert_eq!(redis.addresses, vec!["s1:26379", "s2:26379", "s3:26379"]);
        assert_eq!(redis.master_name.as_deref(), Some("mymaster"));
        assert_eq!(redis.db, 2);
    }

    #[test]
    fn test_invalid_redis_mode_is_an_error() {
        assert!(overrides(&[("REDIS_MODE", "ring")]).is_err());
    }

    #[test]
    fn test_invalid_timeouts_fall_back_to_defaults() {
        let config = overrides(&[
            ("DB_REQUEST_TIMEOUT_MS", "-5"),
            ("DNS_TIMEOUT_MS", "soon"),
        ])
        .unwrap();
        assert_eq!(config.server.request_timeout_ms, 1000);
        assert_eq!(config.dns.timeout_ms, 1500);

        let config = overrides(&[("DB_REQUEST_TIMEOUT_MS", "0")]).unwrap();
        assert_eq!(config.server.request_timeout_ms, 1000);

        let config = overrides(&[("DB_REQUEST_TIMEOUT_MS", "250")]).unwrap();
        assert_eq!(config.server.request_timeout_ms, 250);
    }

    #[test]
    fn test_dns_server_prefers_dns_server_over_consul() {
        let config = overrides(&[
            ("DNS_SERVER", "10.0.0.2"),
            ("CONSUL_DNS_ADDR", "127.0.0.1:8600"),
        ])
        .unwrap();
        assert_eq!(config.dns.server.as_deref(), Some("10.0.0.2"));

        let config = overrides(&[("CONSUL_DNS_ADDR", "127.0.0.1:8600"), ("DNS_NETWORK", "TCP")])
            .unwrap();
        assert_eq!(config.dns.server.as_deref(), Some("127.0.0.1:8600"));
        assert_eq!(config.dns.network, "tcp");
    }
}
