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

// Backend factory for creating counter stores from configuration

use super::backend::CounterStore;
use super::cockroach::CockroachStore;
use super::error::StoreResult;
use super::memory::MemoryStore;
use super::postgres::PostgresStore;
use super::redis::RedisStore;
use crate::config::ServiceConfig;
use crate::dns::DnsOverride;
use std::sync::Arc;
use tracing::warn;

pub struct StoreFactory;

impl StoreFactory {
    /// Create the counter store selected by `storage.mode`
    ///
    /// Unknown modes fall back to the in-memory store. Missing connection
    /// settings for a known mode are a configuration error.
    pub async fn create(
        config: &ServiceConfig,
        dns: &DnsOverride,
    ) -> StoreResult<Arc<dyn CounterStore>> {
        let storage = &config.storage;
        let acquire_timeout = config.server.request_timeout();

        match storage.mode.trim().to_lowercase().as_str() {
            "" | "memory" => Ok(Arc::new(MemoryStore::new())),

            "redis" => {
                let store = RedisStore::new(&storage.redis, dns).await?;
                Ok(Arc::new(store))
            }

            "postgres" => {
                let store = PostgresStore::new(&storage.database, dns, acquire_timeout).await?;
                Ok(Arc::new(store))
            }

            "cockroach" => {
                let store = CockroachStore::new(&storage.database, dns, acquire_timeout).await?;
                Ok(Arc::new(store))
            }

            unknown => {
                warn!(
                    "STORAGE_MODE={} is not supported. Defaulting to 'memory'. Supported: memory, redis, postgres, cockroach",
                    unknown
                );
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    fn config_with_mode(mode: &str) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.storage.mode = mode.to_string();
        config
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        for mode in ["", "memory", "MEMORY"] {
            let store = StoreFactory::create(&config_with_mode(mode), &DnsOverride::disabled())
                .await
                .unwrap();
            assert_eq!(store.backend_type(), "memory");
        }
    }

    #[tokio::test]
    async fn test_unknown_mode_falls_back_to_memory() {
        let store = StoreFactory::create(&config_with_mode("etcd"), &DnsOverride::disabled())
            .await
            .unwrap();
        assert_eq!(store.backend_type(), "memory");
        assert_eq!(store.incr().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sql_modes_require_url() {
        for mode in ["postgres", "cockroach"] {
            let result = StoreFactory::create(&config_with_mode(mode), &DnsOverride::disabled()).await;
            match result {
                Err(StoreError::Configuration(msg)) => assert!(msg.contains("PG_URL")),
                Err(other) => panic!("unexpected error for {}: {}", mode, other),
                Ok(_) => panic!("{} without PG_URL should fail", mode),
            }
        }
    }

    #[tokio::test]
    async fn test_create_sql_and_redis_stores() {
        let mut config = config_with_mode("postgres");
        config.storage.database.url = Some("postgres://counter@127.0.0.1:1/counts".to_string());
        let store = StoreFactory::create(&config, &DnsOverride::disabled()).await.unwrap();
        assert_eq!(store.backend_type(), "postgres");

        config.storage.mode = "cockroach".to_string();
        let store = StoreFactory::create(&config, &DnsOverride::disabled()).await.unwrap();
        assert_eq!(store.backend_type(), "cockroach");

        config.storage.mode = "redis".to_string();
        let store = StoreFactory::create(&config, &DnsOverride::disabled()).await.unwrap();
        assert_eq!(store.backend_type(), "redis");
    }
}
