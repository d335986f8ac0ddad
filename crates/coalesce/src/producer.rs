// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

/// The error type returned by a failing [`Producer`].
pub type ProducerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Computes the value of a resource key.
///
/// Producers are the expensive upstream computations the cache protects. They may
/// fail; a failure is reported to the caller that led the computation and never
/// reaches the cache. A producer is expected to finish within the latch TTL in the
/// common case.
///
/// # Examples
///
/// ```
/// use coalesce::{Producer, ProducerError};
///
/// struct Echo;
///
/// impl Producer for Echo {
///     type Value = String;
///
///     async fn produce(&self, key: &str) -> Result<String, ProducerError> {
///         Ok(key.to_uppercase())
///     }
/// }
/// ```
pub trait Producer: Send + Sync {
    /// The produced value. It is cached as JSON.
    type Value: Serialize + DeserializeOwned + Send + Sync;

    /// Computes the current value of `key`.
    fn produce(&self, key: &str) -> impl Future<Output = Result<Self::Value, ProducerError>> + Send;
}

/// Adapts an async closure into a [`Producer`].
///
/// # Examples
///
/// ```
/// use coalesce::{ProducerError, producer_fn};
///
/// let quotes = producer_fn(|key: String| async move { Ok::<_, ProducerError>(key.len()) });
/// # let _ = quotes;
/// ```
pub fn producer_fn<F>(f: F) -> FnProducer<F> {
    FnProducer { f }
}

/// A [`Producer`] built by [`producer_fn`].
#[derive(Clone)]
pub struct FnProducer<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnProducer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProducer").finish_non_exhaustive()
    }
}

impl<F, Fut, V> Producer for FnProducer<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, ProducerError>> + Send,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    type Value = V;

    fn produce(&self, key: &str) -> impl Future<Output = Result<V, ProducerError>> + Send {
        (self.f)(key.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_receives_key() {
        let producer = producer_fn(|key: String| async move { Ok::<_, ProducerError>(format!("value of {key}")) });
        assert_eq!(producer.produce("X").await.unwrap(), "value of X");
    }

    #[tokio::test]
    async fn closure_errors_pass_through() {
        let producer = producer_fn(|_key: String| async move { Err::<u32, ProducerError>("upstream down".into()) });
        let error = producer.produce("X").await.unwrap_err();
        assert_eq!(error.to_string(), "upstream down");
    }
}
