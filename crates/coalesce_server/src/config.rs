// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use coalesce::CoalesceConfig;

use crate::ServerError;

/// Process configuration read from the environment.
///
/// | Variable | Default |
/// |---|---|
/// | `REDIS_URL` | `redis://localhost:6379/0` |
/// | `DATABASE_ADDR` | `localhost:5432` |
/// | `COALESCE_BIND` | `0.0.0.0:8000` |
/// | `COALESCE_CACHE_TTL_SECS` | `30` |
/// | `COALESCE_LATCH_TTL_SECS` | `5` |
/// | `COALESCE_POLL_INTERVAL_MS` | `50` |
/// | `COALESCE_WAIT_TIMEOUT_MS` | `6000` |
/// | `COALESCE_STORE_TIMEOUT_MS` | `2000` |
/// | `COALESCE_TAPE_EVERY_SECS` | `30` |
/// | `COALESCE_HOTSET_EVERY_SECS` | `60` |
/// | `COALESCE_SNAPSHOT_TTL_SECS` | `180` |
/// | `COALESCE_HEALTH_TIMEOUT_MS` | `1000` |
///
/// Log filtering is controlled separately by `RUST_LOG`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// `host:port` of the durable datastore, probed by TCP connect.
    pub database_addr: String,
    /// HTTP listen address.
    pub bind: SocketAddr,
    /// Resolver, accessor and latch settings.
    pub coalesce: CoalesceConfig,
    /// Cadence of the `fs:tape` refresh.
    pub tape_every: Duration,
    /// Cadence of the `fs:hotset` refresh.
    pub hotset_every: Duration,
    /// TTL of scheduler-written snapshots.
    pub snapshot_ttl: Duration,
    /// Per-check timeout of `/healthz`.
    pub health_timeout: Duration,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidEnv`] for a malformed value.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidEnv`] for a malformed value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let env = Env(&lookup);
        let defaults = CoalesceConfig::default();

        let coalesce = defaults
            .with_cache_ttl(env.secs("COALESCE_CACHE_TTL_SECS", 30)?)
            .with_latch_ttl(env.secs("COALESCE_LATCH_TTL_SECS", 5)?)
            .with_poll_interval(env.millis("COALESCE_POLL_INTERVAL_MS", 50)?)
            .with_wait_timeout(env.millis("COALESCE_WAIT_TIMEOUT_MS", 6000)?)
            .with_store_timeout(env.millis("COALESCE_STORE_TIMEOUT_MS", 2000)?);

        Ok(Self {
            redis_url: env.string("REDIS_URL", "redis://localhost:6379/0"),
            database_addr: env.string("DATABASE_ADDR", "localhost:5432"),
            bind: env.parse("COALESCE_BIND", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
            coalesce,
            tape_every: env.positive_secs("COALESCE_TAPE_EVERY_SECS", 30)?,
            hotset_every: env.positive_secs("COALESCE_HOTSET_EVERY_SECS", 60)?,
            snapshot_ttl: env.positive_secs("COALESCE_SNAPSHOT_TTL_SECS", 180)?,
            health_timeout: env.positive_millis("COALESCE_HEALTH_TIMEOUT_MS", 1000)?,
        })
    }
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn string(&self, var: &str, default: &str) -> String {
        (self.0)(var).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T: FromStr>(&self, var: &'static str, default: T) -> Result<T, ServerError> {
        match (self.0)(var) {
            Some(value) => value.trim().parse().map_err(|_parse| ServerError::InvalidEnv { var, value }),
            None => Ok(default),
        }
    }

    fn secs(&self, var: &'static str, default: u64) -> Result<Duration, ServerError> {
        self.parse(var, default).map(Duration::from_secs)
    }

    fn millis(&self, var: &'static str, default: u64) -> Result<Duration, ServerError> {
        self.parse(var, default).map(Duration::from_millis)
    }

    fn positive_secs(&self, var: &'static str, default: u64) -> Result<Duration, ServerError> {
        Self::positive(var, self.secs(var, default)?)
    }

    fn positive_millis(&self, var: &'static str, default: u64) -> Result<Duration, ServerError> {
        Self::positive(var, self.millis(var, default)?)
    }

    fn positive(var: &'static str, value: Duration) -> Result<Duration, ServerError> {
        if value.is_zero() {
            return Err(ServerError::InvalidEnv {
                var,
                value: "0".to_owned(),
            });
        }
        Ok(value)
    }
}
