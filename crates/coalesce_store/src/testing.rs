// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides [`MockStore`], a [`MemoryStore`]-backed store that records
//! every operation and supports failure injection, hanging operations and
//! artificial latency for exercising the unavailable paths of the coalescing cache.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{MemoryStore, StoreError, Ttl, TtlStore};

/// A recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `get(key)`.
    Get(String),
    /// `set(key, value, ttl)`.
    Set {
        /// The key that was written.
        key: String,
        /// The value that was written.
        value: String,
        /// The requested expiry.
        ttl: Duration,
    },
    /// `set_if_absent(key, value, ttl)`.
    SetIfAbsent {
        /// The key that was conditionally written.
        key: String,
        /// The value that was offered.
        value: String,
        /// The requested expiry.
        ttl: Duration,
    },
    /// `exists(key)`.
    Exists(String),
    /// `ttl(key)`.
    Ttl(String),
    /// `ping()`.
    Ping,
}

impl StoreOp {
    /// Returns the key this operation touched, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Get(key) | Self::Exists(key) | Self::Ttl(key) => Some(key),
            Self::Set { key, .. } | Self::SetIfAbsent { key, .. } => Some(key),
            Self::Ping => None,
        }
    }
}

type OpPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// Values are kept in an inner [`MemoryStore`]; every operation is recorded before
/// it is executed. Operations matching the `fail_when` predicate return
/// [`StoreError::Unreachable`], operations matching the `hang_when` predicate never
/// complete.
///
/// # Examples
///
/// ```
/// use coalesce_store::{TtlStore, testing::{MockStore, StoreOp}};
/// use std::time::Duration;
/// # futures::executor::block_on(async {
///
/// let store = MockStore::new();
/// store.set("k", "v", Duration::from_secs(1)).await.unwrap();
/// store.fail_when(|op| matches!(op, StoreOp::Get(_)));
///
/// assert!(store.get("k").await.is_err());
/// assert_eq!(store.operations().len(), 2);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    inner: MemoryStore,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<OpPredicate>>>,
    hang_when: Arc<Mutex<Option<OpPredicate>>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("inner", &self.inner)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .field("hang_when", &self.hang_when.lock().is_some())
            .field("latency", &self.latency)
            .finish()
    }
}

impl MockStore {
    /// Creates an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memory store holding the mock's data.
    #[must_use]
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Makes every operation matching `predicate` fail with [`StoreError::Unreachable`].
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Makes every operation matching `predicate` wait forever.
    pub fn hang_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.hang_when.lock() = Some(Box::new(predicate));
    }

    /// Delays every operation by `latency` before it reaches the inner store.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Removes failure injection, hanging predicates and latency.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
        *self.hang_when.lock() = None;
        *self.latency.lock() = None;
    }

    /// Returns a copy of every recorded operation, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Returns how many recorded operations match `predicate`.
    #[must_use]
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&StoreOp) -> bool,
    {
        self.operations.lock().iter().filter(|op| predicate(op)).count()
    }

    /// Forgets every recorded operation.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    async fn intercept(&self, op: StoreOp) -> Result<(), StoreError> {
        let fails = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let hangs = self.hang_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let latency = *self.latency.lock();
        self.operations.lock().push(op);

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if hangs {
            std::future::pending::<()>().await;
        }
        if fails {
            return Err(StoreError::unreachable("injected store failure"));
        }
        Ok(())
    }
}

impl TtlStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.intercept(StoreOp::Get(key.to_owned())).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.intercept(StoreOp::Set {
            key: key.to_owned(),
            value: value.to_owned(),
            ttl,
        })
        .await?;
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.intercept(StoreOp::SetIfAbsent {
            key: key.to_owned(),
            value: value.to_owned(),
            ttl,
        })
        .await?;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.intercept(StoreOp::Exists(key.to_owned())).await?;
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, StoreError> {
        self.intercept(StoreOp::Ttl(key.to_owned())).await?;
        self.inner.ttl(key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.intercept(StoreOp::Ping).await?;
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn records_operations_in_order() {
        let store = MockStore::new();
        store.set("a", "1", SECOND).await.unwrap();
        let _ = store.get("a").await.unwrap();
        let _ = store.exists("b").await.unwrap();
        store.ping().await.unwrap();

        assert_eq!(
            store.operations(),
            vec![
                StoreOp::Set {
                    key: "a".to_owned(),
                    value: "1".to_owned(),
                    ttl: SECOND,
                },
                StoreOp::Get("a".to_owned()),
                StoreOp::Exists("b".to_owned()),
                StoreOp::Ping,
            ]
        );
    }

    #[tokio::test]
    async fn fail_when_only_affects_matching_operations() {
        let store = MockStore::new();
        store.fail_when(|op| op.key() == Some("forbidden"));

        let error = store.get("forbidden").await.unwrap_err();
        assert!(error.is_unavailable());
        assert!(store.get("allowed").await.is_ok());
    }

    #[tokio::test]
    async fn failed_writes_do_not_reach_inner_store() {
        let store = MockStore::new();
        store.fail_when(|op| matches!(op, StoreOp::Set { .. }));

        assert!(store.set("k", "v", SECOND).await.is_err());
        assert!(store.inner().get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_failures_restores_service() {
        let store = MockStore::new();
        store.fail_when(|_| true);
        assert!(store.ping().await.is_err());

        store.clear_failures();
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn hang_when_never_completes() {
        let store = MockStore::new();
        store.hang_when(|op| matches!(op, StoreOp::Ping));

        let outcome = tokio::time::timeout(Duration::from_secs(30), store.ping()).await;
        assert!(outcome.is_err(), "hanging ping should not complete");
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_each_operation() {
        let store = MockStore::new();
        store.set_latency(Duration::from_millis(40));

        let started = tokio::time::Instant::now();
        let _ = store.get("k").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn count_filters_operations() {
        let store = MockStore::new();
        let _ = store.set_if_absent("latch:x", "1", SECOND).await.unwrap();
        let _ = store.set_if_absent("latch:x", "1", SECOND).await.unwrap();
        let _ = store.get("x").await.unwrap();

        assert_eq!(store.count(|op| matches!(op, StoreOp::SetIfAbsent { .. })), 2);
        store.clear_operations();
        assert!(store.operations().is_empty());
    }
}
