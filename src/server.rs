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

// HTTP facade: GET / increments and reports, GET /health answers 200
//
// Store failures never become HTTP errors. The caller always receives a
// 200 with a parseable envelope; degradation is signalled in the body.

use crate::protocol::CountResponse;
use crate::storage::CounterStore;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{timeout_at, Instant};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared by every request handler
pub struct AppState {
    store: Arc<dyn CounterStore>,
    hostname: String,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn CounterStore>, hostname: String, request_timeout: Duration) -> Self {
        Self {
            store,
            hostname,
            request_timeout,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }
}

/// Name of this machine, or `unknown`
pub fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Could not read hostname: {}", e);
            "unknown".to_string()
        }
    }
}

/// Create the service router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(count_handler))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Handle GET / - increment the counter and report it
///
/// The increment and the best-effort node lookup share one deadline.
pub async fn count_handler(State(state): State<Arc<AppState>>) -> Json<CountResponse> {
    let deadline = Instant::now() + state.request_timeout;

    let count = match timeout_at(deadline, state.store.incr()).await {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            warn!("Increment on {} failed: {}", state.store.backend_type(), e);
            return Json(CountResponse::degraded(&state.hostname, e));
        }
        Err(_) => {
            warn!(
                "Increment on {} timed out after {:?}",
                state.store.backend_type(),
                state.request_timeout
            );
            return Json(CountResponse::degraded(
                &state.hostname,
                format!("request timed out after {:?}", state.request_timeout),
            ));
        }
    };

    let db_node = match timeout_at(deadline, state.store.info()).await {
        Ok(Ok(node)) => Some(node),
        Ok(Err(e)) => {
            debug!("Skipping db_node: {}", e);
            None
        }
        Err(_) => {
            debug!("Skipping db_node: deadline reached");
            None
        }
    };

    Json(CountResponse::counted(count, state.hostname.as_str(), db_node))
}

/// Handle GET /health
pub async fn health_check(uri: Uri) -> (StatusCode, String) {
    (StatusCode::OK, format!("Hello, you've hit {}\n", uri.path()))
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Serving at http://{}", addr);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn make_test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(MemoryStore::new()),
            "test-host".to_string(),
            Duration::from_secs(1),
        ))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/plain"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Hello, you've hit /health\n");
    }

    #[tokio::test]
    async fn test_count_endpoint() {
        let app = create_router(make_test_state());

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["count"], 1);
        assert_eq!(json["hostname"], "test-host");
        assert_eq!(json["db_node"], "in-memory");
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_router(make_test_state());

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
