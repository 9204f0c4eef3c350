// Configuration system integration tests

use counting_service::config::{load_config, RedisTopology};
use std::fs;
use std::path::PathBuf;

#[test]
fn test_load_default_config() {
    let config_path = PathBuf::from("config/default.yaml");

    if config_path.exists() {
        let result = load_config(&config_path);
        assert!(result.is_ok(), "Failed to load default config: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.server.request_timeout_ms, 1000);
        assert_eq!(config.storage.redis.topology, RedisTopology::Single);
        assert_eq!(config.dns.network, "udp");
        assert_eq!(config.logging.level, "info");
    }
}

#[test]
fn test_load_full_config() {
    let temp_config = r#"
server:
  port: 9100
  request_timeout_ms: 750

storage:
  mode: redis
  redis:
    topology: cluster
    addresses:
      - redis-0:6379
      - redis-1:6379
    password: hunter2
    timeout_ms: 500
  database:
    url: postgres://counter@db:5432/counts
    max_connections: 8

dns:
  server: 127.0.0.1:8600
  network: tcp
  timeout_ms: 900

logging:
  level: debug
"#;

    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("service.yaml");
    fs::write(&config_path, temp_config).unwrap();

    let config = load_config(&config_path).unwrap();

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.request_timeout_ms, 750);
    assert_eq!(config.storage.mode, "redis");
    assert_eq!(config.storage.redis.topology, RedisTopology::Cluster);
    assert_eq!(config.storage.redis.addresses.len(), 2);
    assert_eq!(config.storage.redis.password.as_deref(), Some("hunter2"));
    assert_eq!(config.storage.database.max_connections, 8);
    assert_eq!(config.dns.server.as_deref(), Some("127.0.0.1:8600"));
    assert_eq!(config.dns.network, "tcp");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_with_env_defaults() {
    std::env::remove_var("COUNTING_IT_PG_URL");
    std::env::remove_var("COUNTING_IT_MODE");

    let temp_config = r#"
storage:
  mode: ${COUNTING_IT_MODE:-cockroach}
  database:
    url: ${COUNTING_IT_PG_URL:-postgres://root@crdb:26257/defaultdb}
"#;

    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("service.yaml");
    fs::write(&config_path, temp_config).unwrap();

    let config = load_config(&config_path).unwrap();

    assert_eq!(config.storage.mode, "cockroach");
    assert_eq!(
        config.storage.database.url.as_deref(),
        Some("postgres://root@crdb:26257/defaultdb")
    );
    assert_eq!(config.server.port, 9001);
}

#[test]
fn test_empty_file_uses_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("empty.yaml");
    fs::write(&config_path, "{}\n").unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.storage.mode, "memory");
    assert_eq!(config.server.request_timeout_ms, 1000);
}

#[test]
fn test_invalid_values_are_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.yaml");
    fs::write(&config_path, "server:\n  request_timeout_ms: 0\n").unwrap();

    let result = load_config(&config_path);
    assert!(result.is_err());
    assert!(format!("{:#}", result.unwrap_err()).contains("request_timeout_ms"));
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(load_config("/nonexistent/counting-service.yaml").is_err());
}
