// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis-backed shared TTL store.
//!
//! [`RedisStore`] implements [`coalesce_store::TtlStore`] on top of a
//! [`redis::aio::ConnectionManager`], which reconnects transparently after a dropped
//! connection. The store is an explicitly constructed client with a
//! [`connect`](RedisStore::connect) / [`close`](RedisStore::close) lifecycle; clones
//! share the same underlying connection and are cheap to hand to a resolver, a
//! scheduler and a health prober.
//!
//! # Command Mapping
//!
//! | Store operation | Redis command |
//! |---|---|
//! | `get` | `GET key` |
//! | `set` | `SET key value PX ms` |
//! | `set_if_absent` | `SET key value NX PX ms` |
//! | `exists` | `EXISTS key` |
//! | `ttl` | `PTTL key` |
//! | `ping` | `PING` |
//!
//! # Examples
//!
//! ```no_run
//! use coalesce_redis::{RedisConfig, RedisStore};
//! use coalesce_store::TtlStore;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), coalesce_store::StoreError> {
//! let store = RedisStore::connect(&RedisConfig::new("redis://localhost:6379/0")).await?;
//! store.set("fs:tape", "[]", Duration::from_secs(180)).await?;
//! store.close();
//! # Ok(())
//! # }
//! ```

mod config;
mod store;

#[doc(inline)]
pub use config::RedisConfig;
#[doc(inline)]
pub use store::RedisStore;
