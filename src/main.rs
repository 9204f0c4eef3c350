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

use anyhow::{Context, Result};
use clap::Parser;
use counting_service::config::{config_from_env, load_config_with_env};
use counting_service::server::{local_hostname, serve, AppState};
use counting_service::{DnsOverride, StoreFactory};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Counting Service - increment a shared counter over HTTP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (environment only when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config file and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let mut service_config = match &args.config {
        Some(path) => load_config_with_env(path)?,
        None => config_from_env()?,
    };

    // Apply CLI overrides
    if let Some(port) = args.port {
        service_config.server.port = port;
    }

    // Initialize tracing with configured level; RUST_LOG wins when set
    let log_level = match service_config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Counting Service");
    if let Some(path) = &args.config {
        info!("Loaded configuration from: {:?}", path);
    }
    info!("Storage mode: {}", service_config.storage.mode);

    let dns = DnsOverride::from_config(&service_config.dns).await?;

    let store = StoreFactory::create(&service_config, &dns)
        .await
        .context("Failed to initialize counter store")?;
    info!("Counter store initialized: {}", store.backend_type());

    let state = Arc::new(AppState::new(
        store,
        local_hostname(),
        service_config.server.request_timeout(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], service_config.server.port));
    serve(addr, state).await?;

    info!("Counting Service shut down successfully");
    Ok(())
}
