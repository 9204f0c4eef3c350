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

// Counter store trait shared by every storage backend

use super::error::StoreResult;
use async_trait::async_trait;

/// Generic counter storage trait
///
/// A store owns exactly one 64-bit counter. Implementations must make
/// `incr` atomic with respect to concurrent callers, either with a local
/// lock (in-memory) or with a single atomic operation on the backend
/// (`INCR`, `UPDATE ... RETURNING`).
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter and return its new value
    ///
    /// The counter is created on first use, so the first successful call
    /// against a fresh backend returns 1.
    async fn incr(&self) -> StoreResult<i64>;

    /// Identify the backend node that served the request
    ///
    /// Redis `run_id`, the SQL server version or node id, or a static
    /// label for the in-memory store. Callers treat failure as non-fatal.
    async fn info(&self) -> StoreResult<String>;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;
}
