// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Request-coalescing cache over a shared TTL store.
//!
//! Expensive, short-lived snapshots (quotes, ranked lists, a live tape) are produced
//! at most once per key per leadership window, no matter how many callers ask for
//! them at the same time or how many processes share the store.
//!
//! # Components
//!
//! - [`CacheAccessor`] reads and writes JSON entries, bounding every store round trip.
//! - [`LatchManager`] grants time-boxed leadership through the store's atomic
//!   create-if-absent. Latches are never released; they expire.
//! - [`Resolver`] runs the check-cache, lead-or-follow, recheck state machine and
//!   returns a tagged [`Resolution`] instead of an error.
//! - [`Scheduler`] keeps well-known keys warm on fixed cadences and writes a heartbeat.
//! - [`HealthProber`] aggregates isolated dependency checks into a [`HealthReport`].
//!
//! All of them share one store handle, typically a `coalesce_redis::RedisStore`
//! clone, or a [`coalesce_store::MemoryStore`] in a single process.
//!
//! # Stampede Protection
//!
//! ```
//! use coalesce::{CoalesceConfig, ProducerError, Resolver, Source, producer_fn};
//! use coalesce_store::MemoryStore;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//!
//! static CALLS: AtomicUsize = AtomicUsize::new(0);
//!
//! let resolver = Resolver::new(MemoryStore::new(), &CoalesceConfig::default())?;
//! let hotset = producer_fn(|_key: String| async {
//!     CALLS.fetch_add(1, Ordering::SeqCst);
//!     Ok::<_, ProducerError>(vec!["NVDA".to_owned(), "TSLA".to_owned()])
//! });
//!
//! let results = futures::future::join_all((0..10).map(|_| resolver.resolve("fs:hotset", &hotset))).await;
//!
//! assert_eq!(CALLS.load(Ordering::SeqCst), 1);
//! assert_eq!(results.iter().filter(|r| r.source == Source::Upstream).count(), 1);
//! assert!(results.iter().all(|r| r.value.is_some()));
//! # Ok::<(), coalesce::ConfigError>(())
//! # }).unwrap();
//! ```
//!
//! # Logging
//!
//! Resolve steps are emitted as `tracing` events named `resolve.event` with the
//! fields `resolve.key`, `resolve.activity` and `resolve.duration_ns`. Hits and
//! misses are `DEBUG`, leadership and coalescing `INFO`, producer failures and wait
//! timeouts `WARN`, and an unreachable store `ERROR`.

mod accessor;
mod config;
mod health;
mod latch;
mod producer;
mod resolver;
mod scheduler;
mod telemetry;

#[doc(inline)]
pub use accessor::{AccessError, CacheAccessor};
#[doc(inline)]
pub use config::{CoalesceConfig, ConfigError, ConfigWarning};
#[doc(inline)]
pub use health::{CheckStatus, HealthProber, HealthReport, HealthStatus, HeartbeatProbe, Probe, ProbeState, StoreProbe};
#[doc(inline)]
pub use latch::LatchManager;
#[doc(inline)]
pub use producer::{FnProducer, Producer, ProducerError, producer_fn};
#[doc(inline)]
pub use resolver::{Resolution, Resolver, Source};
#[doc(inline)]
pub use scheduler::{DEFAULT_HEARTBEAT_KEY, RefreshOutcome, ScheduledJob, Scheduler};
