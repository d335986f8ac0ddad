// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for shared TTL stores.

use std::{sync::Arc, time::Duration};

use crate::{StoreError, Ttl};

/// A key-value store with per-key expiry.
///
/// Every method is one round trip against the backend and every mutation is a
/// single atomic operation; the coalescing cache never composes multi-step
/// transactions out of these calls.
///
/// Values are opaque strings. Typed access lives one layer up, in the cache
/// accessor of the `coalesce` crate.
pub trait TtlStore: Send + Sync {
    /// Returns the value stored at `key`, or `None` if the key is absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Unconditionally stores `value` at `key` and resets its expiry to `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stores `value` at `key` with expiry `ttl` only if the key is absent.
    ///
    /// Returns `true` if and only if this call created the key. Implementations must
    /// perform the existence check, the write and the expiry in one atomic operation.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns `true` if `key` exists and has not expired.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns the remaining time-to-live of `key`.
    fn ttl(&self, key: &str) -> impl Future<Output = Result<Ttl, StoreError>> + Send;

    /// Checks that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T> TtlStore for Arc<T>
where
    T: TtlStore,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send {
        self.as_ref().get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.as_ref().set(key, value, ttl)
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> impl Future<Output = Result<bool, StoreError>> + Send {
        self.as_ref().set_if_absent(key, value, ttl)
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send {
        self.as_ref().exists(key)
    }

    fn ttl(&self, key: &str) -> impl Future<Output = Result<Ttl, StoreError>> + Send {
        self.as_ref().ttl(key)
    }

    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.as_ref().ping()
    }
}
