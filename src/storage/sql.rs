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

// Shared pieces of the Postgres and Cockroach backends

use super::error::{StoreError, StoreResult};
use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Statements for one counter table layout
#[derive(Debug)]
pub struct CounterSql {
    pub create_table: &'static str,
    pub seed_row: &'static str,
    pub increment: &'static str,
}

pub const POSTGRES_SQL: CounterSql = CounterSql {
    create_table: "CREATE TABLE IF NOT EXISTS counters (
        id TEXT PRIMARY KEY,
        count BIGINT NOT NULL
    )",
    seed_row: "INSERT INTO counters (id, count) VALUES ('default', 0)
        ON CONFLICT (id) DO NOTHING",
    increment: "UPDATE counters SET count = count + 1 WHERE id = 'default' RETURNING count",
};

pub const COCKROACH_SQL: CounterSql = CounterSql {
    create_table: "CREATE TABLE IF NOT EXISTS counts (
        id INT PRIMARY KEY,
        count BIGINT NOT NULL
    )",
    seed_row: "INSERT INTO counts (id, count) VALUES (1, 0)
        ON CONFLICT (id) DO NOTHING",
    increment: "UPDATE counts SET count = count + 1 WHERE id = 1 RETURNING count",
};

/// Counter row access with lazy schema creation
///
/// The table and seed row are created before the first increment and
/// again after every failed attempt until one succeeds.
#[derive(Debug)]
pub struct SqlCounter {
    sql: &'static CounterSql,
    schema_ready: AtomicBool,
}

impl SqlCounter {
    pub fn new(sql: &'static CounterSql) -> Self {
        Self {
            sql,
            schema_ready: AtomicBool::new(false),
        }
    }

    async fn ensure_schema(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        debug!("Ensuring counter table exists");
        sqlx::query(self.sql.create_table).execute(pool).await?;
        sqlx::query(self.sql.seed_row).execute(pool).await?;
        Ok(())
    }

    pub async fn incr(&self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        let result: Result<i64, sqlx::Error> = async {
            self.ensure_schema(pool).await?;
            sqlx::query_scalar::<_, i64>(self.sql.increment)
                .fetch_one(pool)
                .await
        }
        .await;

        self.schema_ready.store(result.is_ok(), Ordering::Release);
        result
    }
}

/// Build a pool that connects on first use
///
/// Startup never waits on the database, so an unreachable server shows up
/// as a failed request instead of a failed boot.
pub fn lazy_pool(url: &str, config: &DatabaseConfig, acquire_timeout: Duration) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(url)
        .map_err(|e| StoreError::config(format!("invalid database url: {}", e)))
}

/// Database url from config, or a configuration error naming `mode`
pub fn required_url<'a>(config: &'a DatabaseConfig, mode: &str) -> StoreResult<&'a str> {
    config
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| StoreError::config(format!("PG_URL must be set when STORAGE_MODE={}", mode)))
}

/// Connection url with any password masked, for logs
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
