// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runs the coalescing cache server with configuration from the environment.

use std::process::ExitCode;

use coalesce_server::{ServerConfig, ServerError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_unset| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind,
        cache_ttl = ?config.coalesce.cache_ttl,
        latch_ttl = ?config.coalesce.latch_ttl,
        "starting"
    );
    coalesce_server::run(config).await
}
