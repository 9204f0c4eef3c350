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

// Counting service
//
// An HTTP service that increments one shared counter per request and
// reports it as JSON:
// - Swappable storage: in-memory, Redis (single, sentinel, cluster),
//   Postgres, CockroachDB with reconnect-and-retry
// - Graceful degradation: backend failures answer 200 with count = -1
// - Optional custom DNS server for backend discovery

pub mod config;
pub mod dns;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export main types
pub use config::{config_from_env, load_config, load_config_with_env, ServiceConfig};
pub use dns::DnsOverride;
pub use protocol::{CountResponse, UNAVAILABLE_COUNT};
pub use server::{create_router, AppState};
pub use storage::{CounterStore, StoreError, StoreFactory, StoreResult};
