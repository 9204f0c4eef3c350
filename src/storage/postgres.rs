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

// Postgres backend implementation

use super::backend::CounterStore;
use super::error::{StoreError, StoreResult};
use super::sql::{lazy_pool, redact_url, required_url, SqlCounter, POSTGRES_SQL};
use crate::config::DatabaseConfig;
use crate::dns::DnsOverride;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use std::time::Duration;
use tracing::info;

const BACKEND: &str = "postgres";

/// Counter stored in a Postgres row, incremented with `UPDATE ... RETURNING`
pub struct PostgresStore {
    pool: PgPool,
    counter: SqlCounter,
}

impl PostgresStore {
    pub async fn new(
        config: &DatabaseConfig,
        dns: &DnsOverride,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let url = required_url(config, BACKEND)?;
        let url = dns.rewrite_url(url).await;

        info!("Connecting to Postgres at {}", redact_url(&url));
        let pool = lazy_pool(&url, config, acquire_timeout)?;

        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self {
            pool,
            counter: SqlCounter::new(&POSTGRES_SQL),
        }
    }
}

#[async_trait]
impl CounterStore for PostgresStore {
    async fn incr(&self) -> StoreResult<i64> {
        self.counter
            .incr(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable(BACKEND, e))
    }

    async fn info(&self) -> StoreResult<String> {
        sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::info)
    }

    fn backend_type(&self) -> &str {
        BACKEND
    }
}
