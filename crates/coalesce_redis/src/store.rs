// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use coalesce_store::{StoreError, Ttl, TtlStore};
use redis::{Client, RedisError, aio::ConnectionManager};

use crate::RedisConfig;

/// A [`TtlStore`] backed by Redis.
///
/// Cloning is cheap: clones share one auto-reconnecting connection manager.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects to Redis and verifies the connection with `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] for a malformed URL, [`StoreError::Timeout`] if
    /// the connection is not established within `connect_timeout`, and
    /// [`StoreError::Unreachable`] if the server refuses or drops the connection.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str()).map_err(StoreError::backend)?;

        let manager = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_elapsed| StoreError::timeout("connect", config.connect_timeout))?
            .map_err(map_error)?;

        let store = Self { manager };
        tokio::time::timeout(config.connect_timeout, store.ping())
            .await
            .map_err(|_elapsed| StoreError::timeout("ping", config.connect_timeout))??;

        tracing::info!(store.url = %config.redacted_url(), "redis store connected");
        Ok(store)
    }

    /// Ends the client lifecycle.
    ///
    /// The connection closes once every clone of this store has been closed or dropped.
    pub fn close(self) {
        tracing::debug!("redis store handle closed");
        drop(self.manager);
    }
}

impl TtlStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(map_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let millis = expiry_millis(ttl)?;
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let millis = expiry_millis(ttl)?;
        let mut conn = self.manager.clone();
        // `OK` when the key was created, nil when it already existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(map_error)?;
        Ok(reply.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await.map_err(map_error)?;
        Ok(count > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Ttl, StoreError> {
        let mut conn = self.manager.clone();
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await.map_err(map_error)?;
        Ok(ttl_from_pttl(millis))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(map_error)?;
        Ok(())
    }
}

fn map_error(error: RedisError) -> StoreError {
    if error.is_io_error() || error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
        StoreError::unreachable(error)
    } else {
        StoreError::backend(error)
    }
}

/// Converts a `PTTL` reply into a [`Ttl`].
pub(crate) fn ttl_from_pttl(millis: i64) -> Ttl {
    match millis {
        -1 => Ttl::NoExpiry,
        millis => u64::try_from(millis).map_or(Ttl::Missing, |millis| Ttl::Remaining(Duration::from_millis(millis))),
    }
}

/// Converts an expiry into the millisecond argument of `PX`.
///
/// Redis rejects `PX 0`, and sub-millisecond expiries round up.
pub(crate) fn expiry_millis(ttl: Duration) -> Result<u64, StoreError> {
    if ttl.is_zero() {
        return Err(StoreError::backend("invalid expire time"));
    }
    let millis = ttl.as_millis() + u128::from(ttl.subsec_nanos() % 1_000_000 != 0);
    Ok(u64::try_from(millis).unwrap_or(u64::MAX))
}
