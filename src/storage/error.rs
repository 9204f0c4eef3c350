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

// Error taxonomy for counter stores

use std::fmt::Display;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a [`CounterStore`](super::CounterStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection or query failure. Per-request, degraded at the HTTP layer.
    #[error("{backend}: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    /// Missing or malformed connection settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend descriptor lookup failed. Never fatal.
    #[error("backend info unavailable: {0}")]
    InfoUnavailable(String),
}

impl StoreError {
    pub fn unavailable(backend: &'static str, reason: impl Display) -> Self {
        StoreError::Unavailable {
            backend,
            reason: reason.to_string(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        StoreError::Configuration(reason.into())
    }

    pub fn info(reason: impl Display) -> Self {
        StoreError::InfoUnavailable(reason.to_string())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}
