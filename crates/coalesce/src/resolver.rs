// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, time::Duration};

use coalesce_store::{StoreError, Ttl, TtlStore};
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::Instant;

use crate::{
    AccessError, CacheAccessor, CoalesceConfig, ConfigError, LatchManager, Producer,
    telemetry::{ResolveActivity, emit},
};

/// Where the value of a [`Resolution`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// This call led the computation and ran the producer.
    Upstream,
    /// The value was already cached.
    Cache,
    /// Another caller led the computation; this call waited for it.
    Coalesced,
    /// The store could not be reached.
    Unavailable,
}

impl Source {
    /// Returns the lowercase name used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Cache => "cache",
            Self::Coalesced => "coalesced",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tagged outcome of [`Resolver::resolve`].
///
/// `value` is `None` when the producer failed, when a follower gave up before a
/// value was published, or when the store was unavailable. `failed` is set only
/// when this call led the computation and the producer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution<V> {
    /// Where the value came from.
    pub source: Source,
    /// The resource key that was resolved.
    pub key: String,
    /// The resolved value, if any.
    pub value: Option<V>,
    /// Remaining lifetime of the cached entry, when one was read or written.
    pub ttl: Option<Ttl>,
    /// `true` if this call ran the producer and it failed.
    pub failed: bool,
}

impl<V> Resolution<V> {
    fn found(source: Source, key: &str, value: V, ttl: Ttl) -> Self {
        Self {
            source,
            key: key.to_owned(),
            value: Some(value),
            ttl: Some(ttl),
            failed: false,
        }
    }

    fn empty(source: Source, key: &str) -> Self {
        Self {
            source,
            key: key.to_owned(),
            value: None,
            ttl: None,
            failed: false,
        }
    }

    fn producer_failed(key: &str) -> Self {
        Self {
            failed: true,
            ..Self::empty(Source::Upstream, key)
        }
    }

    /// Returns `true` if a value was resolved.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// Single-flight resolution of resource keys through a shared store.
///
/// For each call the resolver:
///
/// 1. returns the cached entry if there is one;
/// 2. otherwise tries to acquire the key's latch, and if it wins, runs the producer
///    and publishes the value with the cache TTL;
/// 3. otherwise polls, every `poll_interval`, for a published value or for the latch
///    to lapse, giving up after `wait_timeout`;
/// 4. and finally rereads the cache once.
///
/// At most one producer runs per key per latch window, across every process sharing
/// the store. The resolver never returns an error: store failures surface as
/// [`Source::Unavailable`], producer failures as `failed`.
///
/// Latches are never released early. A follower therefore stops waiting as soon as
/// it sees the published value rather than when the latch disappears.
///
/// # Examples
///
/// ```
/// use coalesce::{CoalesceConfig, ProducerError, Resolver, Source, producer_fn};
/// use coalesce_store::MemoryStore;
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
///
/// let resolver = Resolver::new(MemoryStore::new(), &CoalesceConfig::default())?;
/// let quotes = producer_fn(|key: String| async move { Ok::<_, ProducerError>(format!("{key}=187.20")) });
///
/// let first = resolver.resolve("quote:AAPL", &quotes).await;
/// assert_eq!(first.source, Source::Upstream);
///
/// let second = resolver.resolve("quote:AAPL", &quotes).await;
/// assert_eq!(second.source, Source::Cache);
/// assert_eq!(second.value.as_deref(), Some("quote:AAPL=187.20"));
/// # Ok::<(), coalesce::ConfigError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<S> {
    accessor: CacheAccessor<S>,
    latches: LatchManager<S>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl<S: TtlStore + Clone> Resolver<S> {
    /// Creates a resolver over `store`.
    ///
    /// Configuration warnings are logged.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] if `config` is invalid.
    pub fn new(store: S, config: &CoalesceConfig) -> Result<Self, ConfigError> {
        for warning in config.validate()? {
            tracing::warn!(%warning, "coalescing configuration warning");
        }

        Ok(Self {
            accessor: CacheAccessor::new(store.clone(), config),
            latches: LatchManager::new(store, config),
            poll_interval: config.poll_interval,
            wait_timeout: config.wait_timeout,
        })
    }
}

impl<S: TtlStore> Resolver<S> {
    /// Returns the cache accessor used by this resolver.
    pub fn accessor(&self) -> &CacheAccessor<S> {
        &self.accessor
    }

    /// Returns the latch manager used by this resolver.
    pub fn latches(&self) -> &LatchManager<S> {
        &self.latches
    }

    /// Resolves `key`, running `producer` only if this call wins leadership.
    pub async fn resolve<P: Producer>(&self, key: &str, producer: &P) -> Resolution<P::Value> {
        self.resolve_timed(key, producer).await.0
    }

    /// Like [`resolve`](Self::resolve), also returning how long the call took.
    pub async fn resolve_timed<P: Producer>(&self, key: &str, producer: &P) -> (Resolution<P::Value>, Duration) {
        let started = Instant::now();
        let resolution = self.run(key, producer, started).await;
        (resolution, started.elapsed())
    }

    /// Reads `key` from the cache without taking its latch or producing a value.
    ///
    /// For keys another writer owns, such as scheduler-populated snapshots. A miss is
    /// a [`Source::Cache`] resolution without a value.
    pub async fn lookup<V: DeserializeOwned>(&self, key: &str) -> Resolution<V> {
        let started = Instant::now();
        match self.read_entry(key, started).await {
            Ok(Some((value, ttl))) => {
                emit(key, ResolveActivity::Hit, started.elapsed());
                Resolution::found(Source::Cache, key, value, ttl)
            }
            Ok(None) => {
                emit(key, ResolveActivity::Miss, started.elapsed());
                Resolution::empty(Source::Cache, key)
            }
            Err(error) => unavailable(key, &error, started),
        }
    }

    async fn run<P: Producer>(&self, key: &str, producer: &P, started: Instant) -> Resolution<P::Value> {
        match self.read_entry(key, started).await {
            Ok(Some((value, ttl))) => {
                emit(key, ResolveActivity::Hit, started.elapsed());
                return Resolution::found(Source::Cache, key, value, ttl);
            }
            Ok(None) => emit(key, ResolveActivity::Miss, started.elapsed()),
            Err(error) => return unavailable(key, &error, started),
        }

        match self.latches.acquire(key).await {
            Ok(true) => self.lead(key, producer, started).await,
            Ok(false) => self.follow(key, started).await,
            Err(error) => unavailable(key, &error, started),
        }
    }

    async fn lead<P: Producer>(&self, key: &str, producer: &P, started: Instant) -> Resolution<P::Value> {
        emit(key, ResolveActivity::Leader, started.elapsed());

        let value = match producer.produce(key).await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(resolve.key = key, %error, "producer failed; cache left untouched");
                emit(key, ResolveActivity::ProducerFailed, started.elapsed());
                return Resolution::producer_failed(key);
            }
        };

        let cache_ttl = self.accessor.default_ttl();
        match self.accessor.set(key, &value, cache_ttl).await {
            Ok(()) => {
                emit(key, ResolveActivity::Produced, started.elapsed());
                Resolution::found(Source::Upstream, key, value, Ttl::Remaining(cache_ttl))
            }
            Err(AccessError::Store(error)) => unavailable(key, &error, started),
            Err(AccessError::Codec(error)) => {
                tracing::warn!(resolve.key = key, %error, "produced value could not be encoded");
                emit(key, ResolveActivity::ProducerFailed, started.elapsed());
                Resolution::producer_failed(key)
            }
        }
    }

    async fn follow<V: DeserializeOwned>(&self, key: &str, started: Instant) -> Resolution<V> {
        emit(key, ResolveActivity::Follower, started.elapsed());

        let deadline = started + self.wait_timeout;
        match tokio::time::timeout_at(deadline, self.await_leader::<V>(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return unavailable(key, &error, started),
            Err(_elapsed) => emit(key, ResolveActivity::WaitTimedOut, started.elapsed()),
        }

        // Past the deadline the recheck gets one poll interval.
        let recheck_by = deadline.max(Instant::now() + self.poll_interval);
        let resolution = match tokio::time::timeout_at(recheck_by, self.read_entry(key, started)).await {
            Ok(Ok(Some((value, ttl)))) => Resolution::found(Source::Coalesced, key, value, ttl),
            Ok(Ok(None)) | Err(_) => Resolution::empty(Source::Coalesced, key),
            Ok(Err(error)) => return unavailable(key, &error, started),
        };
        emit(key, ResolveActivity::Coalesced, started.elapsed());
        resolution
    }

    /// Polls until a decodable value is published or the latch lapses.
    ///
    /// An entry that does not decode is not a published value; the leader will overwrite it.
    async fn await_leader<V: DeserializeOwned>(&self, key: &str) -> Result<(), StoreError> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            match self.accessor.get::<V>(key).await {
                Ok(Some(_)) => return Ok(()),
                Ok(None) | Err(AccessError::Codec(_)) => {}
                Err(AccessError::Store(error)) => return Err(error),
            }
            if !self.latches.is_held(key).await? {
                return Ok(());
            }
        }
    }

    /// Reads and decodes the entry of `key` with its remaining TTL.
    ///
    /// A payload that cannot be decoded is reported and treated as absent.
    async fn read_entry<V: DeserializeOwned>(&self, key: &str, started: Instant) -> Result<Option<(V, Ttl)>, StoreError> {
        let value = match self.accessor.get::<V>(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(None),
            Err(AccessError::Store(error)) => return Err(error),
            Err(AccessError::Codec(error)) => {
                tracing::warn!(resolve.key = key, %error, "cached payload could not be decoded");
                emit(key, ResolveActivity::DecodeFailed, started.elapsed());
                return Ok(None);
            }
        };

        // The entry may lapse between the two round trips.
        let ttl = match self.accessor.ttl(key).await? {
            ttl if ttl.is_missing() => Ttl::Remaining(Duration::ZERO),
            ttl => ttl,
        };
        Ok(Some((value, ttl)))
    }
}

fn unavailable<V>(key: &str, error: &StoreError, started: Instant) -> Resolution<V> {
    tracing::warn!(resolve.key = key, %error, "store unavailable");
    emit(key, ResolveActivity::Unavailable, started.elapsed());
    Resolution::empty(Source::Unavailable, key)
}
