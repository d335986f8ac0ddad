// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use coalesce_store::{StoreError, TtlStore};

use crate::{CoalesceConfig, accessor::bounded};

const LATCH_SENTINEL: &str = "1";

/// Grants time-boxed leadership over a resource key.
///
/// A latch is a store key derived from the resource key whose existence means a
/// computation is in flight. It is created with one atomic create-if-absent round
/// trip and ends only when its TTL lapses; there is no release operation, so a
/// leader that crashes can never leave a key locked forever.
///
/// Round trips are bounded by a Tokio timer and must run inside a Tokio runtime.
///
/// # Examples
///
/// ```
/// use coalesce::{CoalesceConfig, LatchManager};
/// use coalesce_store::MemoryStore;
/// # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
///
/// let latches = LatchManager::new(MemoryStore::new(), &CoalesceConfig::default());
///
/// assert_eq!(latches.latch_key("quote:AAPL"), "latch:quote:AAPL");
/// assert!(latches.acquire("quote:AAPL").await?);
/// assert!(!latches.acquire("quote:AAPL").await?);
/// # Ok::<(), coalesce_store::StoreError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct LatchManager<S> {
    store: S,
    prefix: String,
    latch_ttl: Duration,
    store_timeout: Duration,
}

impl<S: TtlStore> LatchManager<S> {
    /// Creates a latch manager using the latch TTL, prefix and store timeout of `config`.
    pub fn new(store: S, config: &CoalesceConfig) -> Self {
        Self {
            store,
            prefix: config.latch_prefix.clone(),
            latch_ttl: config.latch_ttl,
            store_timeout: config.store_timeout,
        }
    }

    /// Returns the store key of the latch guarding `resource_key`.
    pub fn latch_key(&self, resource_key: &str) -> String {
        format!("{}{resource_key}", self.prefix)
    }

    /// Returns the leadership window.
    pub fn latch_ttl(&self) -> Duration {
        self.latch_ttl
    }

    /// Tries to become the leader for `resource_key`.
    ///
    /// Returns `true` if this call created the latch.
    ///
    /// # Errors
    ///
    /// Returns the store error if the round trip fails. Callers must treat an error as
    /// "not the leader".
    pub async fn acquire(&self, resource_key: &str) -> Result<bool, StoreError> {
        let latch_key = self.latch_key(resource_key);
        bounded(
            self.store_timeout,
            "set_if_absent",
            self.store.set_if_absent(&latch_key, LATCH_SENTINEL, self.latch_ttl),
        )
        .await
    }

    /// Returns `true` if some caller currently holds the latch for `resource_key`.
    ///
    /// # Errors
    ///
    /// Returns the store error if the round trip fails.
    pub async fn is_held(&self, resource_key: &str) -> Result<bool, StoreError> {
        let latch_key = self.latch_key(resource_key);
        bounded(self.store_timeout, "exists", self.store.exists(&latch_key)).await
    }
}
