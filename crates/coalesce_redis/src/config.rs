// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for a [`RedisStore`](crate::RedisStore).
///
/// # Examples
///
/// ```
/// use coalesce_redis::RedisConfig;
/// use std::time::Duration;
///
/// let config = RedisConfig::new("redis://localhost:6379/0").with_connect_timeout(Duration::from_secs(1));
/// assert_eq!(config.connect_timeout, Duration::from_secs(1));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// The Redis connection URL, for example `redis://localhost:6379/0`.
    pub url: String,
    /// How long to wait for the initial connection and `PING`.
    pub connect_timeout: Duration,
}

impl RedisConfig {
    /// Creates a configuration for `url` with the default connect timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the URL with any password replaced, for logging.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        match rest.rsplit_once('@') {
            Some((userinfo, host)) => {
                let user = userinfo.split_once(':').map_or(userinfo, |(user, _)| user);
                format!("{scheme}://{user}:***@{host}")
            }
            None => self.url.clone(),
        }
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.redacted_url())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
