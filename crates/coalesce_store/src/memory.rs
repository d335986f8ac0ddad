// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-local store implementation.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{StoreError, Ttl, TtlStore};

/// Every this many writes, expired entries are swept from the whole map.
const SWEEP_EVERY: u32 = 64;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Default)]
struct Entries {
    slots: HashMap<String, Slot>,
    writes: u32,
}

impl Entries {
    fn insert(&mut self, key: &str, slot: Slot, now: Instant) {
        self.slots.insert(key.to_owned(), slot);
        self.writes += 1;
        if self.writes >= SWEEP_EVERY {
            self.writes = 0;
            self.sweep(now);
        }
    }

    fn sweep(&mut self, now: Instant) {
        self.slots.retain(|_, slot| slot.is_live(now));
    }

    fn live(&mut self, key: &str, now: Instant) -> Option<Slot> {
        match self.slots.get(key) {
            Some(slot) if slot.is_live(now) => Some(slot.clone()),
            Some(_) => {
                self.slots.remove(key);
                None
            }
            None => None,
        }
    }
}

/// An in-memory [`TtlStore`].
///
/// Cloning a `MemoryStore` yields another handle to the same entries, so a single
/// store can be shared by a resolver, a scheduler and a health prober inside one
/// process. Expiry is tracked with [`tokio::time::Instant`], which lets tests drive
/// expiry with a paused Tokio clock. Expired entries are dropped the next time their
/// key is touched, and the whole map is swept every few dozen writes.
///
/// # Examples
///
/// ```
/// use coalesce_store::{MemoryStore, TtlStore};
/// use std::time::Duration;
/// # futures::executor::block_on(async {
///
/// let store = MemoryStore::new();
/// store.set("fs:tape", "[]", Duration::from_secs(180)).await?;
/// assert_eq!(store.get("fs:tape").await?.as_deref(), Some("[]"));
/// # Ok::<(), coalesce_store::StoreError>(())
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<Entries>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` at `key` without an expiry.
    ///
    /// The coalescing cache never writes such keys itself; this exists so that keys
    /// written by other tools can be represented.
    pub fn set_persistent(&self, key: &str, value: &str) {
        self.entries.lock().insert(
            key,
            Slot {
                value: value.to_owned(),
                expires_at: None,
            },
            Instant::now(),
        );
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.sweep(Instant::now());
        entries.slots.len()
    }

    /// Returns `true` if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_ttl(ttl: Duration) -> Result<(), StoreError> {
    if ttl.is_zero() {
        return Err(StoreError::backend("invalid expire time"));
    }
    Ok(())
}

impl TtlStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(entries.live(key, now).map(|slot| slot.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        check_ttl(ttl)?;
        let now = Instant::now();
        self.entries.lock().insert(
            key,
            Slot {
                value: value.to_owned(),
                expires_at: Some(now + ttl),
            },
            now,
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        check_ttl(ttl)?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.live(key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key,
            Slot {
                value: value.to_owned(),
                expires_at: Some(now + ttl),
            },
            now,
        );
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(entries.live(key, now).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(match entries.live(key, now) {
            None => Ttl::Missing,
            Some(Slot { expires_at: None, .. }) => Ttl::NoExpiry,
            Some(Slot {
                expires_at: Some(at), ..
            }) => Ttl::Remaining(at.saturating_duration_since(now)),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
