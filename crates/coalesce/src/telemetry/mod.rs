// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured resolve events.
//!
//! Every state transition of a resolve call is emitted as a `tracing` event with the
//! fields `resolve.key`, `resolve.activity` and `resolve.duration_ns`, at a level
//! chosen by the activity.

use std::time::Duration;

use tracing::Level;

#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveActivity {
    Hit,
    Miss,
    Leader,
    Produced,
    ProducerFailed,
    Follower,
    Coalesced,
    WaitTimedOut,
    Unavailable,
    DecodeFailed,
}

impl ResolveActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "resolve.hit",
            Self::Miss => "resolve.miss",
            Self::Leader => "resolve.leader",
            Self::Produced => "resolve.produced",
            Self::ProducerFailed => "resolve.producer_failed",
            Self::Follower => "resolve.follower",
            Self::Coalesced => "resolve.coalesced",
            Self::WaitTimedOut => "resolve.wait_timed_out",
            Self::Unavailable => "resolve.unavailable",
            Self::DecodeFailed => "resolve.decode_failed",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Follower => Level::DEBUG,
            Self::Leader | Self::Produced | Self::Coalesced => Level::INFO,
            Self::ProducerFailed | Self::WaitTimedOut | Self::DecodeFailed => Level::WARN,
            Self::Unavailable => Level::ERROR,
        }
    }
}

pub(crate) fn emit(key: &str, activity: ResolveActivity, duration: Duration) {
    let ev = activity.as_str();
    let duration_ns = duration.as_nanos();

    // Tracing levels must be constant at the call site.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                resolve.key = key,
                resolve.activity = ev,
                resolve.duration_ns = duration_ns,
                "resolve.event"
            )
        };
    }

    let level = activity.level();
    if level == Level::ERROR {
        emit_event!(error);
    } else if level == Level::WARN {
        emit_event!(warn);
    } else if level == Level::INFO {
        emit_event!(info);
    } else {
        emit_event!(debug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::LogCapture;

    #[test]
    fn activity_as_str() {
        assert_eq!(ResolveActivity::Hit.as_str(), "resolve.hit");
        assert_eq!(ResolveActivity::Miss.as_str(), "resolve.miss");
        assert_eq!(ResolveActivity::Leader.as_str(), "resolve.leader");
        assert_eq!(ResolveActivity::Produced.as_str(), "resolve.produced");
        assert_eq!(ResolveActivity::ProducerFailed.as_str(), "resolve.producer_failed");
        assert_eq!(ResolveActivity::Follower.as_str(), "resolve.follower");
        assert_eq!(ResolveActivity::Coalesced.as_str(), "resolve.coalesced");
        assert_eq!(ResolveActivity::WaitTimedOut.as_str(), "resolve.wait_timed_out");
        assert_eq!(ResolveActivity::Unavailable.as_str(), "resolve.unavailable");
        assert_eq!(ResolveActivity::DecodeFailed.as_str(), "resolve.decode_failed");
    }

    #[test]
    fn activity_levels() {
        assert_eq!(ResolveActivity::Hit.level(), Level::DEBUG);
        assert_eq!(ResolveActivity::Produced.level(), Level::INFO);
        assert_eq!(ResolveActivity::WaitTimedOut.level(), Level::WARN);
        assert_eq!(ResolveActivity::Unavailable.level(), Level::ERROR);
    }

    #[test]
    fn field_names_match_emitted_fields() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        emit("quote:AAPL", ResolveActivity::Unavailable, Duration::from_millis(3));

        capture.assert_contains("resolve.key=\"quote:AAPL\"");
        capture.assert_contains("resolve.activity=\"resolve.unavailable\"");
        capture.assert_contains("resolve.duration_ns=3000000");
        capture.assert_contains("ERROR");
    }

    #[test]
    fn hits_are_debug_events() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        emit("k", ResolveActivity::Hit, Duration::ZERO);

        capture.assert_contains("DEBUG");
        capture.assert_contains("resolve.activity=\"resolve.hit\"");
    }
}
