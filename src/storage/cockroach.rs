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

// CockroachDB backend with reconnect-and-retry-once
//
// The pool handle lives behind an RwLock together with a generation
// number. Readers hold the lock only long enough to clone the handle.
// Reconnects are serialized by a separate mutex, so a reconnect in flight
// never blocks requests still using the old handle. The old pool is closed
// only after the new one has been swapped in.

use super::backend::CounterStore;
use super::error::{StoreError, StoreResult};
use super::sql::{lazy_pool, redact_url, required_url, SqlCounter, COCKROACH_SQL};
use crate::config::DatabaseConfig;
use crate::dns::DnsOverride;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const BACKEND: &str = "cockroach";

struct PoolSlot {
    pool: PgPool,
    generation: u64,
}

pub struct CockroachStore {
    url: String,
    config: DatabaseConfig,
    dns: DnsOverride,
    acquire_timeout: Duration,
    slot: RwLock<PoolSlot>,
    reconnect_lock: Mutex<()>,
    counter: SqlCounter,
}

impl CockroachStore {
    pub async fn new(
        config: &DatabaseConfig,
        dns: &DnsOverride,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let url = required_url(config, BACKEND)?.to_string();
        let pool = Self::open_pool(&url, config, dns, acquire_timeout).await?;

        Ok(Self {
            url,
            config: config.clone(),
            dns: dns.clone(),
            acquire_timeout,
            slot: RwLock::new(PoolSlot {
                pool,
                generation: 0,
            }),
            reconnect_lock: Mutex::new(()),
            counter: SqlCounter::new(&COCKROACH_SQL),
        })
    }

    async fn open_pool(
        url: &str,
        config: &DatabaseConfig,
        dns: &DnsOverride,
        acquire_timeout: Duration,
    ) -> StoreResult<PgPool> {
        // Re-resolved on every reconnect so a moved node is picked up
        let url = dns.rewrite_url(url).await;
        info!("Connecting to CockroachDB at {}", redact_url(&url));
        lazy_pool(&url, config, acquire_timeout)
    }

    async fn current(&self) -> (PgPool, u64) {
        let slot = self.slot.read().await;
        (slot.pool.clone(), slot.generation)
    }

    /// Current pool generation, bumped by every reconnect
    pub async fn generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    /// Replace the pool unless someone already did since `seen_generation`
    ///
    /// Concurrent failures queue on the reconnect lock; the first one
    /// swaps, the rest find a newer generation and reuse its pool.
    async fn reconnect(&self, seen_generation: u64) -> StoreResult<PgPool> {
        let _guard = self.reconnect_lock.lock().await;

        let (pool, generation) = self.current().await;
        if generation != seen_generation {
            debug!(
                "Pool already replaced (generation {} -> {}), reusing it",
                seen_generation, generation
            );
            return Ok(pool);
        }

        let fresh = Self::open_pool(&self.url, &self.config, &self.dns, self.acquire_timeout).await?;

        let old = {
            let mut slot = self.slot.write().await;
            slot.generation += 1;
            std::mem::replace(&mut slot.pool, fresh.clone())
        };

        // Waits for in-flight users of the old handle to return their connections
        tokio::spawn(async move {
            old.close().await;
        });

        Ok(fresh)
    }
}

#[async_trait]
impl CounterStore for CockroachStore {
    async fn incr(&self) -> StoreResult<i64> {
        let (pool, generation) = self.current().await;

        let first = match self.counter.incr(&pool).await {
            Ok(count) => return Ok(count),
            Err(e) => e,
        };

        warn!("CockroachDB increment failed: {}. Reconnecting and retrying once.", first);
        let pool = self.reconnect(generation).await?;

        self.counter
            .incr(&pool)
            .await
            .map_err(|e| StoreError::unavailable(BACKEND, e))
    }

    async fn info(&self) -> StoreResult<String> {
        let (pool, _) = self.current().await;
        let node_id = sqlx::query_scalar::<_, Option<i64>>("SELECT crdb_internal.node_id()")
            .fetch_one(&pool)
            .await
            .map_err(StoreError::info)?;

        node_id
            .map(|id| format!("Node {}", id))
            .ok_or_else(|| StoreError::info("node id is NULL"))
    }

    fn backend_type(&self) -> &str {
        BACKEND
    }
}
