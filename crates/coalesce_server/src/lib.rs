// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! HTTP front end for the request-coalescing cache.
//!
//! Wires a [`RedisStore`] into a [`Resolver`], a [`Scheduler`] and a [`HealthProber`],
//! and serves them over axum. See [`routes`] for the HTTP surface and
//! [`ServerConfig`] for the environment it reads.
//!
//! The scheduler keeps `fs:tape` and `fs:hotset` warm and is their only writer.
//! `quote:<SYMBOL>`, `quotes:<SYMBOL>,...` and `ohlc:<SYMBOL>:<interval>:<range>` keys
//! are resolved on demand through the coalescing resolver.

use std::time::Duration;

use coalesce::{HealthProber, HeartbeatProbe, Resolver, ScheduledJob, Scheduler, StoreProbe};
use coalesce_redis::{RedisConfig, RedisStore};
use coalesce_store::TtlStore;
use tokio::{net::TcpListener, sync::watch};

mod config;
mod error;
mod ohlc;
mod probes;
mod producers;
pub mod routes;
mod state;

pub use config::ServerConfig;
pub use error::ServerError;
pub use ohlc::{Bar, BarInterval, BarRange, MAX_BARS, OHLC_PREFIX, OhlcProducer, SeriesRequest};
pub use probes::TcpProbe;
pub use producers::{
    HOTSET_KEY, HotRow, HotsetProducer, MarketProducer, Print, QUOTE_PREFIX, QUOTES_PREFIX, Quote, QuoteProducer, Route, Side,
    TAPE_KEY, TapeProducer,
};
pub use routes::router;
pub use state::AppState;

/// Builds the scheduler that keeps the market snapshots warm.
#[must_use]
pub fn scheduler<S: TtlStore>(store: S, config: &ServerConfig) -> Scheduler<S> {
    Scheduler::new(store, &config.coalesce)
        .with_job(ScheduledJob::new(TAPE_KEY, config.tape_every, config.snapshot_ttl, TapeProducer))
        .with_job(ScheduledJob::new(HOTSET_KEY, config.hotset_every, config.snapshot_ttl, HotsetProducer))
}

/// Builds the prober behind `/healthz`: the store, the datastore and the scheduler heartbeat.
#[must_use]
pub fn prober<S: TtlStore + Clone + 'static>(store: S, config: &ServerConfig) -> HealthProber {
    HealthProber::new(config.health_timeout)
        .with_probe(StoreProbe::new("redis", store.clone()))
        .with_probe(TcpProbe::new("postgres", config.database_addr.clone()))
        .with_probe(HeartbeatProbe::new("worker", store))
}

/// Runs the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the store cannot be reached at startup, the coalescing
/// configuration is invalid, or the listener cannot be bound.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let redis = RedisConfig::new(config.redis_url.clone()).with_connect_timeout(Duration::from_secs(5));
    let store = RedisStore::connect(&redis).await?;

    let resolver = Resolver::new(store.clone(), &config.coalesce)?;
    let state = AppState::new(resolver, prober(store.clone(), &config));

    let (stop, shutdown) = watch::channel(false);
    let scheduler = scheduler(store.clone(), &config);
    let worker = tokio::spawn(async move { scheduler.run(shutdown).await });

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "listening");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %error, "cannot listen for ctrl-c");
            }
            tracing::info!("shutdown signal received");
        })
        .await;

    // Stop the scheduler even when serving failed.
    stop.send_replace(true);
    if let Err(error) = worker.await {
        tracing::warn!(error = %error, "scheduler task failed");
    }
    store.close();
    tracing::info!("stopped");

    served.map_err(ServerError::from)
}
