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

// Storage backend module
//
// Provides a trait-based abstraction over where the counter lives,
// allowing the service to swap between in-memory, Redis (single,
// sentinel, cluster), Postgres and CockroachDB at startup.

pub mod backend;
pub mod cockroach;
pub mod error;
pub mod factory;
pub mod memory;
pub mod postgres;
pub mod redis;
mod sql;

pub use backend::CounterStore;
pub use cockroach::CockroachStore;
pub use error::{StoreError, StoreResult};
pub use factory::StoreFactory;
pub use memory::{MemoryStore, MEMORY_NODE_LABEL};
pub use postgres::PostgresStore;
pub use self::redis::{parse_run_id, RedisStore, COUNTER_KEY};
