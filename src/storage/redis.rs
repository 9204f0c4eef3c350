// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Redis backend implementation (single node, sentinel, cluster)

use super::backend::CounterStore;
use super::error::{StoreError, StoreResult};
use crate::config::{RedisConfig, RedisTopology};
use crate::dns::DnsOverride;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::sentinel::{Sentinel, SentinelNodeConnectionInfo};
use redis::{
    ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo, RedisResult, Value,
};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const BACKEND: &str = "redis";

/// Key holding the counter
pub const COUNTER_KEY: &str = "count";

enum RedisClient {
    Single(redis::Client),
    Sentinel {
        sentinel: Mutex<Sentinel>,
        master_name: String,
        node_info: SentinelNodeConnectionInfo,
    },
    Cluster(ClusterClient),
}

impl RedisClient {
    async fn connect(&self) -> RedisResult<RedisConnection> {
        match self {
            RedisClient::Single(client) => client
                .get_multiplexed_async_connection()
                .await
                .map(RedisConnection::Multiplexed),
            RedisClient::Sentinel {
                sentinel,
                master_name,
                node_info,
            } => {
                // Master is looked up again on every reconnect to follow failovers
                let client = sentinel
                    .lock()
                    .await
                    .async_master_for(master_name, Some(node_info))
                    .await?;
                client
                    .get_multiplexed_async_connection()
                    .await
                    .map(RedisConnection::Multiplexed)
            }
            RedisClient::Cluster(client) => client
                .get_async_connection()
                .await
                .map(RedisConnection::Cluster),
        }
    }
}

#[derive(Clone)]
enum RedisConnection {
    Multiplexed(MultiplexedConnection),
    Cluster(ClusterConnection),
}

impl RedisConnection {
    async fn query<T: FromRedisValue>(&mut self, cmd: &redis::Cmd) -> RedisResult<T> {
        match self {
            RedisConnection::Multiplexed(conn) => cmd.query_async(conn).await,
            RedisConnection::Cluster(conn) => cmd.query_async(conn).await,
        }
    }
}

/// Counter stored under [`COUNTER_KEY`], incremented with `INCR`
///
/// One multiplexed connection is shared by all requests and dropped after
/// any error, so the next request dials again. Dialing and every command
/// are bounded by the configured timeout.
pub struct RedisStore {
    client: RedisClient,
    connection: Mutex<Option<RedisConnection>>,
    topology: RedisTopology,
    timeout: Duration,
}

impl RedisStore {
    pub async fn new(config: &RedisConfig, dns: &DnsOverride) -> StoreResult<Self> {
        let client = match config.topology {
            RedisTopology::Single => {
                let address = dns.rewrite_address(config.address.trim()).await;
                if address.is_empty() {
                    return Err(StoreError::config("REDIS_ADDR must be set for single mode"));
                }
                info!("Connecting to Redis at {}", address);
                let info = single_node_info(&address, config.password.clone(), config.db)?;
                RedisClient::Single(redis::Client::open(info).map_err(config_error)?)
            }
            RedisTopology::Sentinel => {
                let master_name = config
                    .master_name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| {
                        StoreError::config("REDIS_MASTER_NAME must be set for sentinel mode")
                    })?;
                let addresses = resolve_all(dns, &config.addresses, "sentinel").await?;
                info!(
                    "Connecting to Redis master '{}' via sentinels {:?}",
                    master_name, addresses
                );
                let sentinels: Vec<String> =
                    addresses.iter().map(|a| node_url(a)).collect();
                let sentinel = Sentinel::build(sentinels).map_err(config_error)?;
                let node_info = SentinelNodeConnectionInfo {
                    tls_mode: None,
                    redis_connection_info: Some(RedisConnectionInfo {
                        db: config.db,
                        password: config.password.clone(),
                        ..Default::default()
                    }),
                };
                RedisClient::Sentinel {
                    sentinel: Mutex::new(sentinel),
                    master_name,
                    node_info,
                }
            }
            RedisTopology::Cluster => {
                let addresses = resolve_all(dns, &config.addresses, "cluster").await?;
                info!("Connecting to Redis cluster via {:?}", addresses);
                let nodes: Vec<String> = addresses.iter().map(|a| node_url(a)).collect();
                let mut builder = ClusterClient::builder(nodes);
                if let Some(password) = &config.password {
                    builder = builder.password(password.clone());
                }
                RedisClient::Cluster(builder.build().map_err(config_error)?)
            }
        };

        Ok(Self {
            client,
            connection: Mutex::new(None),
            topology: config.topology,
            timeout: config.timeout(),
        })
    }

    pub fn topology(&self) -> RedisTopology {
        self.topology
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StoreError::unavailable(BACKEND, e)),
            Err(_) => Err(StoreError::unavailable(
                BACKEND,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    async fn connection(&self) -> StoreResult<RedisConnection> {
        let mut cached = self.connection.lock().await;
        if let Some(conn) = cached.as_ref() {
            return Ok(conn.clone());
        }

        debug!("Dialing Redis ({})", self.topology);
        let conn = self.bounded(self.client.connect()).await?;
        *cached = Some(conn.clone());
        Ok(conn)
    }

    async fn run<T: FromRedisValue>(&self, cmd: redis::Cmd) -> StoreResult<T> {
        let mut conn = self.connection().await?;
        let result = self.bounded(conn.query::<T>(&cmd)).await;

        if let Err(e) = &result {
            warn!("Redis command failed: {}. Dropping connection.", e);
            self.connection.lock().await.take();
        }
        result
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn incr(&self) -> StoreResult<i64> {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(COUNTER_KEY);
        self.run(cmd).await
    }

    async fn info(&self) -> StoreResult<String> {
        let mut cmd = redis::cmd("INFO");
        cmd.arg("server");
        let value: Value = self.run(cmd).await.map_err(StoreError::info)?;

        info_payload(&value)
            .as_deref()
            .and_then(parse_run_id)
            .ok_or_else(|| StoreError::info("run_id missing from INFO server"))
    }

    fn backend_type(&self) -> &str {
        BACKEND
    }
}

fn config_error(e: redis::RedisError) -> StoreError {
    StoreError::config(format!("invalid redis settings: {}", e))
}

async fn resolve_all(
    dns: &DnsOverride,
    addresses: &[String],
    topology: &str,
) -> StoreResult<Vec<String>> {
    if addresses.is_empty() {
        return Err(StoreError::config(format!(
            "REDIS_ADDRS must list at least one address for {} mode",
            topology
        )));
    }

    let mut resolved = Vec::with_capacity(addresses.len());
    for address in addresses {
        resolved.push(dns.rewrite_address(address).await);
    }
    Ok(resolved)
}

/// `redis://host:port`, for sentinel and cluster seeds
fn node_url(address: &str) -> String {
    format!("redis://{}", address)
}

/// Connection settings for a single node
///
/// The password is passed as-is rather than through a URL, so characters
/// such as `#`, `@` or `%` need no escaping.
fn single_node_info(
    address: &str,
    password: Option<String>,
    db: i64,
) -> StoreResult<ConnectionInfo> {
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        StoreError::config(format!("REDIS_ADDR must be host:port, got '{}'", address))
    })?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(StoreError::config(format!("REDIS_ADDR has no host: '{}'", address)));
    }
    let port = port.parse::<u16>().map_err(|_| {
        StoreError::config(format!("REDIS_ADDR has an invalid port: '{}'", address))
    })?;

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.to_string(), port),
        redis: RedisConnectionInfo {
            db,
            password,
            ..Default::default()
        },
    })
}

/// First textual payload of an `INFO` reply
///
/// Cluster connections may answer with one entry per node.
fn info_payload(value: &Value) -> Option<String> {
    match value {
        Value::Map(entries) => entries.iter().find_map(|(_, v)| info_payload(v)),
        Value::Array(items) => items.iter().find_map(info_payload),
        other => redis::from_redis_value::<String>(other).ok(),
    }
}

/// Extract `run_id` from an `INFO server` payload
pub fn parse_run_id(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("run_id:"))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}
