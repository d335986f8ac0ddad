// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock OHLC bar series for `ohlc:<SYMBOL>:<interval>:<range>` keys.

use std::{f64::consts::TAU, fmt, str::FromStr};

use coalesce::{Producer, ProducerError};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::producers::{fnv1a, normalize_symbol, round2};

/// Prefix of OHLC keys.
pub const OHLC_PREFIX: &str = "ohlc:";

/// Upper bound on the bars of one series.
pub const MAX_BARS: usize = 1200;

const MINUTES_PER_DAY: u32 = 1440;

/// Width of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarInterval {
    /// `1m`
    OneMinute,
    /// `5m`
    FiveMinutes,
    /// `15m`
    FifteenMinutes,
    /// `1h`
    OneHour,
    /// `1d`
    OneDay,
}

impl BarInterval {
    /// Length of a bar in minutes.
    #[must_use]
    pub fn minutes(self) -> u32 {
        match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::OneHour => 60,
            Self::OneDay => MINUTES_PER_DAY,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }
}

impl FromStr for BarInterval {
    type Err = ProducerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            _ => Err(format!("unknown bar interval {s:?}").into()),
        }
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far back a series reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarRange {
    /// `1d`
    OneDay,
    /// `5d`
    FiveDays,
    /// `1m`
    OneMonth,
    /// `3m`
    ThreeMonths,
    /// `6m`
    SixMonths,
    /// `1y`
    OneYear,
    /// `2y`
    TwoYears,
    /// `5y`
    FiveYears,
    /// `max`, served as one year.
    Max,
}

impl BarRange {
    /// Length of the range in days.
    #[must_use]
    pub fn days(self) -> u32 {
        match self {
            Self::OneDay => 1,
            Self::FiveDays => 5,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear | Self::Max => 365,
            Self::TwoYears => 730,
            Self::FiveYears => 1825,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
            Self::SixMonths => "6m",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::Max => "max",
        }
    }
}

impl FromStr for BarRange {
    type Err = ProducerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Self::OneDay),
            "5d" => Ok(Self::FiveDays),
            "1m" => Ok(Self::OneMonth),
            "3m" => Ok(Self::ThreeMonths),
            "6m" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            "5y" => Ok(Self::FiveYears),
            "max" => Ok(Self::Max),
            _ => Err(format!("unknown bar range {s:?}").into()),
        }
    }
}

impl fmt::Display for BarRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLC bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar start.
    pub t: Timestamp,
    /// Open.
    pub o: f64,
    /// High.
    pub h: f64,
    /// Low.
    pub l: f64,
    /// Close.
    pub c: f64,
    /// Volume, when known.
    pub v: Option<u64>,
}

/// A parsed OHLC request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesRequest {
    /// Normalized symbol.
    pub symbol: String,
    /// Bar width.
    pub interval: BarInterval,
    /// Lookback.
    pub range: BarRange,
}

impl SeriesRequest {
    /// Parses an `ohlc:<SYMBOL>:<interval>:<range>` key.
    ///
    /// # Errors
    ///
    /// Returns an error for a key of another shape, an invalid symbol, or an unknown
    /// interval or range.
    pub fn parse(key: &str) -> Result<Self, ProducerError> {
        let rest = key.strip_prefix(OHLC_PREFIX).ok_or_else(|| format!("not an ohlc key: {key}"))?;
        let mut parts = rest.split(':');
        let (Some(symbol), Some(interval), Some(range), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected ohlc:<SYMBOL>:<interval>:<range>, got {key}").into());
        };

        Ok(Self {
            symbol: normalize_symbol(symbol).ok_or_else(|| format!("invalid symbol {symbol:?}"))?,
            interval: interval.parse()?,
            range: range.parse()?,
        })
    }

    /// Number of bars in the series, capped at [`MAX_BARS`].
    #[must_use]
    pub fn bar_count(&self) -> usize {
        let bars = self.range.days() * MINUTES_PER_DAY / self.interval.minutes();
        usize::try_from(bars).map_or(MAX_BARS, |bars| bars.min(MAX_BARS))
    }
}

/// Produces deterministic OHLC series, oldest bar first.
///
/// Closes follow one sine period over the series with a little noise around a base
/// price derived from the symbol. The last bar ends at the current minute.
#[derive(Debug, Clone, Copy, Default)]
pub struct OhlcProducer;

impl OhlcProducer {
    /// Builds the series of `request` ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a bar timestamp falls outside the supported time range.
    pub fn series(request: &SeriesRequest, now: Timestamp) -> Result<Vec<Bar>, ProducerError> {
        let count = request.bar_count();
        let step = i64::from(request.interval.minutes()) * 60;
        let minute = now.as_second() - now.as_second().rem_euclid(60);
        let start = minute - step * i64::try_from(count)?;

        let mut rng = fastrand::Rng::with_seed(fnv1a(format!("{OHLC_PREFIX}{}", request.symbol).as_bytes()));
        let base = f64::from(u16::try_from(fnv1a(request.symbol.as_bytes()) % 400).unwrap_or_default()).mul_add(0.5, 50.0);
        let period = f64::from(u32::try_from(count.max(10)).unwrap_or(u32::MAX));

        let mut previous = base;
        let mut bars = Vec::with_capacity(count);
        for (i, offset) in (0..count).zip((0_i64..).map(|i| i * step)) {
            let angle = f64::from(u32::try_from(i).unwrap_or(u32::MAX)) / period * TAU;
            let drift = angle.sin() * 0.015 * base;
            let noise = (rng.f64() - 0.5) * 0.004 * base;
            let close = (base + drift + noise).max(1.0);
            let high = close * rng.f64().mul_add(0.002, 1.0);
            let low = close * rng.f64().mul_add(-0.002, 1.0);
            let open = (close + previous) / 2.0;
            previous = close;

            bars.push(Bar {
                t: Timestamp::from_second(start + offset)?,
                o: round2(open),
                h: round2(high),
                l: round2(low),
                c: round2(close),
                v: Some(1_000 + rng.u64(..9_000)),
            });
        }
        Ok(bars)
    }
}

impl Producer for OhlcProducer {
    type Value = Vec<Bar>;

    async fn produce(&self, key: &str) -> Result<Vec<Bar>, ProducerError> {
        Self::series(&SeriesRequest::parse(key)?, Timestamp::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> SeriesRequest {
        SeriesRequest::parse(key).unwrap()
    }

    #[test]
    fn parses_keys() {
        assert_eq!(
            request("ohlc:aapl:5m:1d"),
            SeriesRequest {
                symbol: "AAPL".to_owned(),
                interval: BarInterval::FiveMinutes,
                range: BarRange::OneDay,
            }
        );
        assert_eq!(request("ohlc:SPY:1d:max").range, BarRange::Max);
    }

    #[test]
    fn unknown_interval_or_range_is_an_error() {
        assert!(SeriesRequest::parse("ohlc:AAPL:2m:1d").unwrap_err().to_string().contains("interval"));
        assert!(SeriesRequest::parse("ohlc:AAPL:1m:10y").unwrap_err().to_string().contains("range"));
        assert!(SeriesRequest::parse("ohlc:AAPL:1m").is_err());
        assert!(SeriesRequest::parse("ohlc:AAPL:1m:1d:extra").is_err());
        assert!(SeriesRequest::parse("ohlc::1m:1d").is_err());
        assert!(SeriesRequest::parse("quote:AAPL").is_err());
    }

    #[test]
    fn bar_count_follows_range_and_is_capped() {
        assert_eq!(request("ohlc:A:5m:1d").bar_count(), 288);
        assert_eq!(request("ohlc:A:1h:5d").bar_count(), 120);
        assert_eq!(request("ohlc:A:1d:1y").bar_count(), 365);
        assert_eq!(request("ohlc:A:1m:1d").bar_count(), MAX_BARS);
        assert_eq!(request("ohlc:A:1d:5y").bar_count(), MAX_BARS);
    }

    #[test]
    fn bars_are_contiguous_and_well_formed() {
        let now: Timestamp = "2025-10-01T12:34:56Z".parse().unwrap();
        let bars = OhlcProducer::series(&request("ohlc:MSFT:15m:1d"), now).unwrap();

        assert_eq!(bars.len(), 96);
        assert_eq!(bars.last().unwrap().t, "2025-10-01T12:19:00Z".parse::<Timestamp>().unwrap());
        for pair in bars.windows(2) {
            assert_eq!(pair[1].t.as_second() - pair[0].t.as_second(), 15 * 60);
        }
        for bar in &bars {
            assert!(bar.l <= bar.c && bar.c <= bar.h, "{bar:?}");
            assert!(bar.c >= 1.0);
            assert!((1_000..10_000).contains(&bar.v.unwrap()));
        }
    }

    #[test]
    fn series_is_deterministic_per_symbol() {
        let now = Timestamp::UNIX_EPOCH;
        let first = OhlcProducer::series(&request("ohlc:TSLA:1h:5d"), now).unwrap();
        assert_eq!(first, OhlcProducer::series(&request("ohlc:TSLA:1h:5d"), now).unwrap());
        assert_ne!(first, OhlcProducer::series(&request("ohlc:NVDA:1h:5d"), now).unwrap());
    }

    #[test]
    fn bars_serialize_with_short_names() {
        let bars = OhlcProducer::series(&request("ohlc:AAPL:1d:5d"), Timestamp::UNIX_EPOCH).unwrap();
        let json = serde_json::to_value(&bars[0]).unwrap();
        for field in ["t", "o", "h", "l", "c", "v"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn producer_rejects_malformed_keys() {
        assert!(OhlcProducer.produce("ohlc:AAPL:1w:1y").await.is_err());
        assert_eq!(OhlcProducer.produce("ohlc:AAPL:1d:1m").await.unwrap().len(), 30);
    }
}
