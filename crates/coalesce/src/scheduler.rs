// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Periodic population of well-known keys.

use std::{sync::Arc, time::Duration};

use coalesce_store::TtlStore;
use futures::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};

use crate::{CacheAccessor, CoalesceConfig, Producer, ProducerError};

/// The key written by the scheduler after every cycle.
pub const DEFAULT_HEARTBEAT_KEY: &str = "coalesce:scheduler:heartbeat";

const HEARTBEAT_CADENCES: u32 = 3;

type ProduceFn = dyn Fn() -> BoxFuture<'static, Result<String, ProducerError>> + Send + Sync;

/// A key refreshed on a fixed cadence.
///
/// # Examples
///
/// ```
/// use coalesce::{ProducerError, ScheduledJob, producer_fn};
/// use std::time::Duration;
///
/// let tape = ScheduledJob::new(
///     "fs:tape",
///     Duration::from_secs(30),
///     Duration::from_secs(180),
///     producer_fn(|_key: String| async { Ok::<_, ProducerError>(Vec::<String>::new()) }),
/// );
/// assert_eq!(tape.key(), "fs:tape");
/// ```
#[derive(Clone)]
pub struct ScheduledJob {
    key: String,
    cadence: Duration,
    ttl: Duration,
    produce: Arc<ProduceFn>,
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("key", &self.key)
            .field("cadence", &self.cadence)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ScheduledJob {
    /// Creates a job writing the output of `producer` to `key` every `cadence`, with `ttl`.
    pub fn new<P>(key: impl Into<String>, cadence: Duration, ttl: Duration, producer: P) -> Self
    where
        P: Producer + 'static,
    {
        let key = key.into();
        let producer = Arc::new(producer);
        let job_key = key.clone();
        let produce = move || {
            let producer = Arc::clone(&producer);
            let key = job_key.clone();
            async move {
                let value = producer.produce(&key).await?;
                Ok::<_, ProducerError>(serde_json::to_string(&value)?)
            }
            .boxed()
        };

        Self {
            key,
            cadence,
            ttl,
            produce: Arc::new(produce),
        }
    }

    /// Returns the key this job writes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns how often the job runs.
    #[must_use]
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Returns the TTL of each written entry.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// The result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh payload was written.
    Wrote {
        /// The refreshed key.
        key: String,
        /// Size of the written payload.
        bytes: usize,
    },
    /// The cycle was skipped; the previous entry, if unexpired, keeps serving.
    Skipped {
        /// The key that was not refreshed.
        key: String,
        /// Why the cycle was skipped.
        reason: String,
    },
}

impl RefreshOutcome {
    /// Returns `true` if a payload was written.
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Wrote { .. })
    }
}

/// Refreshes well-known keys on independent cadences.
///
/// The scheduler is the sole writer of its keys and bypasses the latch. Several
/// scheduler instances writing the same key is harmless: each write is a complete,
/// current snapshot and the last one wins.
///
/// After every cycle, successful or not, the scheduler writes a heartbeat key holding
/// the current UNIX time so that health probes can tell whether it is alive.
#[derive(Debug)]
pub struct Scheduler<S> {
    accessor: CacheAccessor<S>,
    jobs: Vec<ScheduledJob>,
    heartbeat_key: String,
}

impl<S: TtlStore> Scheduler<S> {
    /// Creates a scheduler with no jobs.
    pub fn new(store: S, config: &CoalesceConfig) -> Self {
        Self {
            accessor: CacheAccessor::new(store, config),
            jobs: Vec::new(),
            heartbeat_key: DEFAULT_HEARTBEAT_KEY.to_owned(),
        }
    }

    /// Adds a job.
    #[must_use]
    pub fn with_job(mut self, job: ScheduledJob) -> Self {
        self.jobs.push(job);
        self
    }

    /// Overrides the heartbeat key.
    #[must_use]
    pub fn with_heartbeat_key(mut self, heartbeat_key: impl Into<String>) -> Self {
        self.heartbeat_key = heartbeat_key.into();
        self
    }

    /// Returns the registered jobs.
    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Returns the heartbeat key.
    pub fn heartbeat_key(&self) -> &str {
        &self.heartbeat_key
    }

    /// Returns the heartbeat lifetime: three times the shortest nonzero cadence.
    pub fn heartbeat_ttl(&self) -> Option<Duration> {
        self.jobs
            .iter()
            .map(ScheduledJob::cadence)
            .filter(|cadence| !cadence.is_zero())
            .min()
            .map(|cadence| cadence * HEARTBEAT_CADENCES)
    }

    /// Runs one cycle of `job`.
    pub async fn refresh(&self, job: &ScheduledJob) -> RefreshOutcome {
        let payload = match (job.produce)().await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(scheduler.key = %job.key, %error, "producer failed; refresh skipped");
                return RefreshOutcome::Skipped {
                    key: job.key.clone(),
                    reason: error.to_string(),
                };
            }
        };

        match self.accessor.set_raw(&job.key, &payload, job.ttl).await {
            Ok(()) => {
                tracing::info!(scheduler.key = %job.key, scheduler.bytes = payload.len(), "refreshed");
                RefreshOutcome::Wrote {
                    key: job.key.clone(),
                    bytes: payload.len(),
                }
            }
            Err(error) => {
                tracing::warn!(scheduler.key = %job.key, %error, "store write failed; refresh skipped");
                RefreshOutcome::Skipped {
                    key: job.key.clone(),
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Writes the heartbeat key.
    pub async fn beat(&self) {
        let Some(ttl) = self.heartbeat_ttl() else {
            return;
        };
        let now = jiff::Timestamp::now().as_second().to_string();
        if let Err(error) = self.accessor.set_raw(&self.heartbeat_key, &now, ttl).await {
            tracing::warn!(scheduler.key = %self.heartbeat_key, %error, "heartbeat write failed");
        }
    }

    /// Drives every job on its own cadence until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Each job runs immediately and then once per cadence. A cycle that overruns its
    /// cadence skips the missed ticks. A cycle in progress when shutdown is signalled
    /// completes first.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tracing::info!(scheduler.jobs = self.jobs.len(), "scheduler started");
        join_all(self.jobs.iter().map(|job| self.drive(job, shutdown.clone()))).await;
        tracing::info!("scheduler stopped");
    }

    async fn drive(&self, job: &ScheduledJob, mut shutdown: watch::Receiver<bool>) {
        if job.cadence.is_zero() {
            tracing::error!(scheduler.key = %job.key, "job has a zero cadence and will not run");
            return;
        }

        let mut ticks = interval(job.cadence);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow_and_update() {
                return;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = ticks.tick() => {
                    if !self.refresh(job).await.is_written() {
                        tracing::debug!(scheduler.key = %job.key, "previous entry left in place");
                    }
                    self.beat().await;
                }
            }
        }
    }
}
