// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tunables for the coalescing cache.

use std::time::Duration;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_LATCH_TTL: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(6);
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_WAIT_MARGIN: Duration = Duration::from_millis(500);
const DEFAULT_LATCH_PREFIX: &str = "latch:";

/// Configuration shared by the resolver, accessor, latch manager and scheduler.
///
/// # Examples
///
/// ```
/// use coalesce::CoalesceConfig;
/// use std::time::Duration;
///
/// let config = CoalesceConfig::default()
///     .with_latch_ttl(Duration::from_secs(2))
///     .with_wait_timeout(Duration::from_secs(3));
///
/// assert!(config.validate().unwrap().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalesceConfig {
    /// Time-to-live of entries published by a leader.
    pub cache_ttl: Duration,
    /// How long a leader holds exclusive rights to produce a key.
    pub latch_ttl: Duration,
    /// How often a follower checks for a published value.
    pub poll_interval: Duration,
    /// The longest a follower waits before rechecking the cache one last time.
    pub wait_timeout: Duration,
    /// The longest any single store round trip may take.
    pub store_timeout: Duration,
    /// The minimum amount by which `wait_timeout` should exceed `latch_ttl`.
    pub wait_margin: Duration,
    /// Prefix of the latch key derived from a resource key.
    pub latch_prefix: String,
}

impl Default for CoalesceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            latch_ttl: DEFAULT_LATCH_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            wait_margin: DEFAULT_WAIT_MARGIN,
            latch_prefix: DEFAULT_LATCH_PREFIX.to_owned(),
        }
    }
}

impl CoalesceConfig {
    /// Sets the TTL of published entries.
    #[must_use]
    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    /// Sets the leadership window.
    #[must_use]
    pub fn with_latch_ttl(mut self, latch_ttl: Duration) -> Self {
        self.latch_ttl = latch_ttl;
        self
    }

    /// Sets the follower poll cadence.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the follower wait ceiling.
    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Sets the per-round-trip store ceiling.
    #[must_use]
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Sets the expected margin of `wait_timeout` over `latch_ttl`.
    #[must_use]
    pub fn with_wait_margin(mut self, wait_margin: Duration) -> Self {
        self.wait_margin = wait_margin;
        self
    }

    /// Sets the latch key prefix.
    #[must_use]
    pub fn with_latch_prefix(mut self, latch_prefix: impl Into<String>) -> Self {
        self.latch_prefix = latch_prefix.into();
        self
    }

    /// Checks the configuration.
    ///
    /// Returns the list of non-fatal findings on success.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a duration is zero, when the latch would outlive
    /// the entry it protects, when a follower could never poll before timing out, or
    /// when the latch prefix is empty.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let durations = [
            ("cache_ttl", self.cache_ttl),
            ("latch_ttl", self.latch_ttl),
            ("poll_interval", self.poll_interval),
            ("wait_timeout", self.wait_timeout),
            ("store_timeout", self.store_timeout),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::ZeroDuration { field: *field });
        }

        if self.latch_ttl > self.cache_ttl {
            return Err(ConfigError::LatchOutlivesCache {
                latch_ttl: self.latch_ttl,
                cache_ttl: self.cache_ttl,
            });
        }

        if self.poll_interval > self.wait_timeout {
            return Err(ConfigError::PollExceedsWait {
                poll_interval: self.poll_interval,
                wait_timeout: self.wait_timeout,
            });
        }

        if self.latch_prefix.is_empty() {
            return Err(ConfigError::EmptyLatchPrefix);
        }

        let mut warnings = Vec::new();
        if self.latch_ttl == self.cache_ttl {
            warnings.push(ConfigWarning::LatchEqualsCache { ttl: self.cache_ttl });
        }
        if self.wait_timeout < self.latch_ttl + self.wait_margin {
            warnings.push(ConfigWarning::NarrowWaitMargin {
                wait_timeout: self.wait_timeout,
                latch_ttl: self.latch_ttl,
                wait_margin: self.wait_margin,
            });
        }
        Ok(warnings)
    }
}

/// A configuration that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A duration that must be positive is zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// The offending field.
        field: &'static str,
    },

    /// The latch would outlive the entry it protects.
    #[error("latch_ttl ({latch_ttl:?}) must not exceed cache_ttl ({cache_ttl:?})")]
    LatchOutlivesCache {
        /// The configured latch TTL.
        latch_ttl: Duration,
        /// The configured cache TTL.
        cache_ttl: Duration,
    },

    /// A follower would time out before its first poll.
    #[error("poll_interval ({poll_interval:?}) must not exceed wait_timeout ({wait_timeout:?})")]
    PollExceedsWait {
        /// The configured poll interval.
        poll_interval: Duration,
        /// The configured wait timeout.
        wait_timeout: Duration,
    },

    /// The latch prefix is empty, so latch keys would collide with resource keys.
    #[error("latch_prefix must not be empty")]
    EmptyLatchPrefix,
}

/// A usable configuration with a known weakness.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigWarning {
    /// The latch lives exactly as long as the entry.
    #[error("latch_ttl equals cache_ttl ({ttl:?}); a slow leader can hold the latch until its entry expires")]
    LatchEqualsCache {
        /// The shared TTL.
        ttl: Duration,
    },

    /// Followers can give up shortly before a slow leader publishes.
    #[error(
        "wait_timeout ({wait_timeout:?}) is less than latch_ttl ({latch_ttl:?}) plus wait_margin ({wait_margin:?}); \
         followers may return an empty coalesced result while the leader is still publishing"
    )]
    NarrowWaitMargin {
        /// The configured wait timeout.
        wait_timeout: Duration,
        /// The configured latch TTL.
        latch_ttl: Duration,
        /// The configured margin.
        wait_margin: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = CoalesceConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.latch_ttl, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.wait_timeout, Duration::from_secs(6));
        assert_eq!(config.latch_prefix, "latch:");
    }

    #[test]
    fn defaults_validate_cleanly() {
        assert_eq!(CoalesceConfig::default().validate(), Ok(Vec::new()));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let config = CoalesceConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration { field: "poll_interval" }));
    }

    #[test]
    fn latch_longer_than_cache_is_rejected() {
        let config = CoalesceConfig::default().with_latch_ttl(Duration::from_secs(31));
        assert!(matches!(config.validate(), Err(ConfigError::LatchOutlivesCache { .. })));
    }

    #[test]
    fn latch_equal_to_cache_warns() {
        let config = CoalesceConfig::default()
            .with_cache_ttl(Duration::from_secs(5))
            .with_latch_ttl(Duration::from_secs(5));
        let warnings = config.validate().unwrap();
        assert_eq!(
            warnings,
            vec![ConfigWarning::LatchEqualsCache {
                ttl: Duration::from_secs(5)
            }]
        );
    }

    #[test]
    fn poll_longer_than_wait_is_rejected() {
        let config = CoalesceConfig::default()
            .with_poll_interval(Duration::from_secs(10))
            .with_wait_timeout(Duration::from_secs(6));
        assert!(matches!(config.validate(), Err(ConfigError::PollExceedsWait { .. })));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let config = CoalesceConfig::default().with_latch_prefix("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyLatchPrefix));
    }

    #[test]
    fn narrow_wait_margin_warns() {
        let config = CoalesceConfig::default().with_wait_timeout(Duration::from_millis(5200));
        let warnings = config.validate().unwrap();
        assert!(matches!(warnings.as_slice(), [ConfigWarning::NarrowWaitMargin { .. }]));
        assert!(warnings[0].to_string().contains("wait_margin"));
    }

    #[test]
    fn wait_exactly_at_margin_is_fine() {
        let config = CoalesceConfig::default().with_wait_timeout(Duration::from_millis(5500));
        assert!(config.validate().unwrap().is_empty());
    }
}
