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

use serde::{Deserialize, Serialize};

/// Count reported when the store could not be reached
pub const UNAVAILABLE_COUNT: i64 = -1;

/// JSON body of `GET /`
///
/// `db_node` and `message` are omitted when empty. A degraded response
/// always carries `count = -1` and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CountResponse {
    pub fn counted(count: i64, hostname: impl Into<String>, db_node: Option<String>) -> Self {
        Self {
            count,
            hostname: hostname.into(),
            db_node: db_node.filter(|node| !node.is_empty()),
            message: None,
        }
    }

    pub fn degraded(hostname: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            count: UNAVAILABLE_COUNT,
            hostname: hostname.into(),
            db_node: None,
            message: Some(format!("DB Error: {}", error)),
        }
    }

    /// Whether the dashboard should show a disconnected state
    pub fn is_degraded(&self) -> bool {
        self.count < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counted_omits_optional_fields() {
        let json = serde_json::to_value(CountResponse::counted(3, "web-1", None)).unwrap();
        assert_eq!(json, serde_json::json!({"count": 3, "hostname": "web-1"}));
    }

    #[test]
    fn test_empty_db_node_is_dropped() {
        let response = CountResponse::counted(1, "web-1", Some(String::new()));
        assert!(response.db_node.is_none());
    }

    #[test]
    fn test_degraded_envelope() {
        let response = CountResponse::degraded("web-1", "connection refused");
        assert!(response.is_degraded());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["count"], -1);
        assert_eq!(json["hostname"], "web-1");
        assert_eq!(json["message"], "DB Error: connection refused");
        assert!(json.get("db_node").is_none());
    }
}
