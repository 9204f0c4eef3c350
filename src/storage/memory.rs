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

// In-memory backend implementation

use super::backend::CounterStore;
use super::error::StoreResult;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

/// Descriptor reported in place of a database node
pub const MEMORY_NODE_LABEL: &str = "in-memory";

/// Process-local counter, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    count: Mutex<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        info!("Starting in standalone mode (in-memory counter)");
        Self::default()
    }

    /// Current value without incrementing
    pub async fn current(&self) -> i64 {
        *self.count.lock().await
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr(&self) -> StoreResult<i64> {
        let mut count = self.count.lock().await;
        *count += 1;
        Ok(*count)
    }

    async fn info(&self) -> StoreResult<String> {
        Ok(MEMORY_NODE_LABEL.to_string())
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_incr_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.current().await, 0);
        assert_eq!(store.incr().await.unwrap(), 1);
        assert_eq!(store.incr().await.unwrap(), 2);
        assert_eq!(store.current().await, 2);
    }

    #[tokio::test]
    async fn test_info_is_static() {
        let store = MemoryStore::new();
        assert_eq!(store.info().await.unwrap(), MEMORY_NODE_LABEL);
        store.incr().await.unwrap();
        assert_eq!(store.info().await.unwrap(), MEMORY_NODE_LABEL);
        assert_eq!(store.backend_type(), "memory");
    }
}
