// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Health checks are isolated from each other.

use std::time::Duration;

use coalesce::{HealthProber, HealthStatus, HeartbeatProbe, Probe, ProbeState, StoreProbe};
use coalesce_store::{
    MemoryStore, TtlStore,
    testing::{MockStore, StoreOp},
};
use futures::{FutureExt, future::BoxFuture};

struct Failing;

impl Probe for Failing {
    fn name(&self) -> &str {
        "postgres"
    }

    fn check(&self) -> BoxFuture<'_, Result<(), String>> {
        async { Err("connection refused".to_owned()) }.boxed()
    }
}

#[tokio::test]
async fn all_up_is_ok() {
    let store = MemoryStore::new();
    store.set(coalesce::DEFAULT_HEARTBEAT_KEY, "1", Duration::from_secs(90)).await.unwrap();

    let report = HealthProber::new(Duration::from_secs(1))
        .with_probe(StoreProbe::new("redis", store.clone()))
        .with_probe(HeartbeatProbe::new("worker", store))
        .report()
        .await;

    assert!(report.is_ok());
    assert_eq!(report.checks.len(), 2);
    assert!(report.checks.values().all(|check| check.status == ProbeState::Up && check.error.is_none()));
}

#[tokio::test(start_paused = true)]
async fn failing_and_hanging_checks_do_not_hide_healthy_ones() {
    let hanging = MockStore::new();
    hanging.hang_when(|op| matches!(op, StoreOp::Ping));

    let (report, elapsed) = {
        let started = tokio::time::Instant::now();
        let report = HealthProber::new(Duration::from_secs(1))
            .with_probe(StoreProbe::new("redis", hanging))
            .with_probe(Failing)
            .with_probe(StoreProbe::new("replica", MemoryStore::new()))
            .report()
            .await;
        (report, started.elapsed())
    };

    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.checks["replica"].status, ProbeState::Up);

    let postgres = &report.checks["postgres"];
    assert_eq!(postgres.status, ProbeState::Down);
    assert_eq!(postgres.error.as_deref(), Some("connection refused"));

    let redis = &report.checks["redis"];
    assert_eq!(redis.status, ProbeState::Down);
    assert!(redis.error.as_deref().is_some_and(|error| error.contains("timed out")));
    assert!(redis.latency_ms >= 1000);

    // Checks run concurrently, so the slowest one bounds the report.
    assert!(elapsed < Duration::from_millis(1100), "{elapsed:?}");
}

#[tokio::test]
async fn missing_heartbeat_is_down() {
    let report = HealthProber::new(Duration::from_secs(1))
        .with_probe(HeartbeatProbe::new("worker", MemoryStore::new()))
        .report()
        .await;

    assert!(!report.is_ok());
    assert!(report.checks["worker"].error.is_some());
}

#[tokio::test]
async fn empty_prober_is_ok() {
    assert!(HealthProber::new(Duration::from_secs(1)).report().await.is_ok());
}
