// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! The shared TTL key-value store contract.
//!
//! This crate defines the [`TtlStore`] trait that every backing store must satisfy,
//! the [`Ttl`] result of a time-to-live query, and the [`StoreError`] returned when a
//! round trip fails. The store is the single source of cross-process truth for the
//! coalescing cache: cache entries and leadership latches both live in it, and the
//! only coordination primitive is [`TtlStore::set_if_absent`].
//!
//! # Implementing a Store
//!
//! Every operation must be a single round trip against the backend. In particular
//! `set_if_absent` must create the key and its expiry atomically; a `exists` followed
//! by a `set` would race between processes.
//!
//! ```
//! use std::time::Duration;
//!
//! use coalesce_store::{MemoryStore, TtlStore, Ttl};
//! # futures::executor::block_on(async {
//!
//! let store = MemoryStore::new();
//!
//! assert!(store.set_if_absent("latch:quote:AAPL", "1", Duration::from_secs(5)).await?);
//! assert!(!store.set_if_absent("latch:quote:AAPL", "1", Duration::from_secs(5)).await?);
//! assert_eq!(store.ttl("missing").await?, Ttl::Missing);
//! # Ok::<(), coalesce_store::StoreError>(())
//! # });
//! ```
//!
//! # Backends
//!
//! [`MemoryStore`] keeps entries in process memory and is suitable for a single
//! process and for tests. The `coalesce_redis` crate provides the Redis backend used
//! when several processes share one store.

pub mod error;
mod memory;
mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
mod ttl;

#[doc(inline)]
pub use error::{BoxError, StoreError};
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use store::TtlStore;
#[doc(inline)]
pub use ttl::Ttl;
