// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed, time-bounded access to cache entries.

use std::{future::Future, time::Duration};

use coalesce_store::{StoreError, Ttl, TtlStore};
use serde::{Serialize, de::DeserializeOwned};

use crate::CoalesceConfig;

/// An error returned by the [`CacheAccessor`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AccessError {
    /// The store failed or did not answer in time.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value could not be encoded, or a stored payload could not be decoded.
    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl AccessError {
    /// Returns `true` if the store could not be reached.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_unavailable())
    }
}

/// Reads and writes cache entries as JSON payloads.
///
/// Every call is a single store round trip bounded by the configured store timeout;
/// a round trip that takes longer fails with [`StoreError::Timeout`]. The bound is a
/// Tokio timer, so calls must run inside a Tokio runtime with time enabled.
///
/// # Examples
///
/// ```
/// use coalesce::{CacheAccessor, CoalesceConfig};
/// use coalesce_store::MemoryStore;
/// use std::time::Duration;
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
///
/// let cache = CacheAccessor::new(MemoryStore::new(), &CoalesceConfig::default());
/// cache.set("hot", &vec!["AAPL", "MSFT"], Duration::from_secs(60)).await?;
///
/// let hot: Option<Vec<String>> = cache.get("hot").await?;
/// assert_eq!(hot.unwrap(), ["AAPL", "MSFT"]);
/// # Ok::<(), coalesce::AccessError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct CacheAccessor<S> {
    store: S,
    default_ttl: Duration,
    store_timeout: Duration,
}

impl<S: TtlStore> CacheAccessor<S> {
    /// Creates an accessor using the cache TTL and store timeout of `config`.
    pub fn new(store: S, config: &CoalesceConfig) -> Self {
        Self {
            store,
            default_ttl: config.cache_ttl,
            store_timeout: config.store_timeout,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the TTL used by [`set_default`](Self::set_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Encodes `value` and overwrites `key` with a fresh `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Codec`] if `value` cannot be encoded and
    /// [`AccessError::Store`] if the write fails.
    pub async fn set<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<(), AccessError>
    where
        V: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        self.set_raw(key, &payload, ttl).await?;
        Ok(())
    }

    /// Encodes `value` and overwrites `key` with the default TTL.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn set_default<V>(&self, key: &str, value: &V) -> Result<(), AccessError>
    where
        V: Serialize + ?Sized,
    {
        self.set(key, value, self.default_ttl).await
    }

    /// Reads and decodes `key`.
    ///
    /// An absent key is `Ok(None)`, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Store`] if the read fails and [`AccessError::Codec`] if
    /// the stored payload is not a valid `V`.
    pub async fn get<V>(&self, key: &str) -> Result<Option<V>, AccessError>
    where
        V: DeserializeOwned,
    {
        match self.get_raw(key).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Reads the stored payload of `key` without decoding it.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        bounded(self.store_timeout, "get", self.store.get(key)).await
    }

    /// Overwrites `key` with an already encoded payload.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn set_raw(&self, key: &str, payload: &str, ttl: Duration) -> Result<(), StoreError> {
        bounded(self.store_timeout, "set", self.store.set(key, payload, ttl)).await
    }

    /// Returns the remaining lifetime of `key`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the query fails.
    pub async fn ttl(&self, key: &str) -> Result<Ttl, StoreError> {
        bounded(self.store_timeout, "ttl", self.store.ttl(key)).await
    }
}

/// Runs one store round trip, failing with [`StoreError::Timeout`] after `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &'static str, round_trip: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, round_trip)
        .await
        .map_err(|_elapsed| StoreError::timeout(operation, limit))?
}
