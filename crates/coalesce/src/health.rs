// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dependency health checks.

use std::{collections::BTreeMap, time::Duration};

use coalesce_store::TtlStore;
use futures::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use serde::Serialize;
use tokio::time::Instant;

use crate::scheduler::DEFAULT_HEARTBEAT_KEY;

/// A single dependency check.
pub trait Probe: Send + Sync {
    /// The name under which the check is reported.
    fn name(&self) -> &str;

    /// Checks the dependency, describing the failure on error.
    fn check(&self) -> BoxFuture<'_, Result<(), String>>;
}

/// Checks that the store answers `PING`.
#[derive(Debug, Clone)]
pub struct StoreProbe<S> {
    name: String,
    store: S,
}

impl<S> StoreProbe<S> {
    /// Creates a probe reported as `name`.
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self { name: name.into(), store }
    }
}

impl<S: TtlStore> Probe for StoreProbe<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, Result<(), String>> {
        async move { self.store.ping().await.map_err(|error| error.to_string()) }.boxed()
    }
}

/// Checks that the scheduler heartbeat has not expired.
#[derive(Debug, Clone)]
pub struct HeartbeatProbe<S> {
    name: String,
    store: S,
    key: String,
}

impl<S> HeartbeatProbe<S> {
    /// Creates a probe reported as `name` watching the default heartbeat key.
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self {
            name: name.into(),
            store,
            key: DEFAULT_HEARTBEAT_KEY.to_owned(),
        }
    }

    /// Watches `key` instead of the default heartbeat key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl<S: TtlStore> Probe for HeartbeatProbe<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> BoxFuture<'_, Result<(), String>> {
        async move {
            match self.store.exists(&self.key).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(format!("no heartbeat at {}", self.key)),
                Err(error) => Err(error.to_string()),
            }
        }
        .boxed()
    }
}

/// Whether a single check passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeState {
    /// The check passed.
    Up,
    /// The check failed or timed out.
    Down,
}

/// The result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckStatus {
    /// Whether the check passed.
    pub status: ProbeState,
    /// How long the check took.
    pub latency_ms: u64,
    /// The failure, when the check is down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall status of a [`HealthReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every check is up.
    Ok,
    /// At least one check is down.
    Degraded,
}

/// Every check, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `ok` when every check is up.
    pub status: HealthStatus,
    /// Per-dependency results.
    pub checks: BTreeMap<String, CheckStatus>,
}

impl HealthReport {
    /// Returns `true` when every check is up.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Runs isolated, concurrent dependency checks.
///
/// A check that fails, or does not finish within the per-check timeout, is reported
/// as down; it never prevents the other checks from being reported.
///
/// # Examples
///
/// ```
/// use coalesce::{HealthProber, StoreProbe};
/// use coalesce_store::MemoryStore;
/// use std::time::Duration;
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
///
/// let prober = HealthProber::new(Duration::from_secs(1)).with_probe(StoreProbe::new("redis", MemoryStore::new()));
/// let report = prober.report().await;
/// assert!(report.is_ok());
/// # });
/// ```
pub struct HealthProber {
    timeout: Duration,
    probes: Vec<Box<dyn Probe>>,
}

impl std::fmt::Debug for HealthProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.probes.iter().map(|probe| probe.name()).collect();
        f.debug_struct("HealthProber")
            .field("timeout", &self.timeout)
            .field("probes", &names)
            .finish()
    }
}

impl HealthProber {
    /// Creates a prober bounding every check by `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            probes: Vec::new(),
        }
    }

    /// Adds a check.
    #[must_use]
    pub fn with_probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    /// Runs every check and aggregates the results.
    pub async fn report(&self) -> HealthReport {
        let results = join_all(self.probes.iter().map(|probe| self.run_probe(probe.as_ref()))).await;

        let checks: BTreeMap<String, CheckStatus> = results.into_iter().collect();
        let status = if checks.values().all(|check| check.status == ProbeState::Up) {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };
        HealthReport { status, checks }
    }

    async fn run_probe(&self, probe: &dyn Probe) -> (String, CheckStatus) {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, probe.check()).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(format!("timed out after {:?}", self.timeout)),
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let check = match outcome {
            Ok(()) => CheckStatus {
                status: ProbeState::Up,
                latency_ms,
                error: None,
            },
            Err(error) => {
                tracing::warn!(health.check = probe.name(), %error, "health check failed");
                CheckStatus {
                    status: ProbeState::Down,
                    latency_ms,
                    error: Some(error),
                }
            }
        };
        (probe.name().to_owned(), check)
    }
}
