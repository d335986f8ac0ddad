// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use serde::{Serialize, Serializer};

/// The result of a time-to-live query.
///
/// `Missing` and `NoExpiry` are distinct answers: the former means the key never
/// existed or has already expired, the latter that the key exists but will never
/// expire on its own.
///
/// `Ttl` serializes as the integer a Redis `TTL` command would return, see
/// [`Ttl::as_secs_i64`].
///
/// # Examples
///
/// ```
/// use coalesce_store::Ttl;
/// use std::time::Duration;
///
/// assert_eq!(Ttl::Remaining(Duration::from_millis(29_600)).as_secs_i64(), 30);
/// assert_eq!(Ttl::NoExpiry.as_secs_i64(), -1);
/// assert_eq!(Ttl::Missing.as_secs_i64(), -2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// The key exists and expires after this much time.
    Remaining(Duration),
    /// The key does not exist.
    Missing,
    /// The key exists without an expiry.
    NoExpiry,
}

impl Ttl {
    /// Returns the remaining time, if the key exists and expires.
    #[must_use]
    pub fn remaining(self) -> Option<Duration> {
        match self {
            Self::Remaining(remaining) => Some(remaining),
            Self::Missing | Self::NoExpiry => None,
        }
    }

    /// Returns `true` if the key does not exist.
    #[must_use]
    pub fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns the TTL using the Redis integer convention.
    ///
    /// `-2` for a missing key, `-1` for a key without expiry, otherwise the remaining
    /// time rounded to the nearest whole second.
    #[must_use]
    pub fn as_secs_i64(self) -> i64 {
        match self {
            Self::Missing => -2,
            Self::NoExpiry => -1,
            Self::Remaining(remaining) => i64::try_from(remaining.as_millis().saturating_add(500) / 1000).unwrap_or(i64::MAX),
        }
    }
}

impl Serialize for Ttl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_secs_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_rounds_to_nearest_second() {
        assert_eq!(Ttl::Remaining(Duration::from_millis(499)).as_secs_i64(), 0);
        assert_eq!(Ttl::Remaining(Duration::from_millis(500)).as_secs_i64(), 1);
        assert_eq!(Ttl::Remaining(Duration::from_secs(180)).as_secs_i64(), 180);
    }

    #[test]
    fn remaining_only_for_expiring_keys() {
        assert_eq!(Ttl::Remaining(Duration::from_secs(3)).remaining(), Some(Duration::from_secs(3)));
        assert_eq!(Ttl::Missing.remaining(), None);
        assert_eq!(Ttl::NoExpiry.remaining(), None);
    }

    #[test]
    fn serializes_as_redis_integer() {
        let json = serde_json::to_string(&[Ttl::Remaining(Duration::from_secs(30)), Ttl::NoExpiry, Ttl::Missing]).unwrap();
        assert_eq!(json, "[30,-1,-2]");
    }

    #[test]
    fn missing_classification() {
        assert!(Ttl::Missing.is_missing());
        assert!(!Ttl::NoExpiry.is_missing());
        assert!(!Ttl::Remaining(Duration::ZERO).is_missing());
    }
}
