// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock market-data producers.
//!
//! These stand in for the upstream market feeds: a live tape of option prints, a
//! ranked "hot" list, per-symbol quotes and OHLC series. Each is a [`Producer`]. The
//! tape and hot list are written only by the scheduler; quotes and series are
//! resolved on demand.

use std::collections::{BTreeMap, BTreeSet};

use coalesce::{Producer, ProducerError};
use jiff::{Timestamp, ToSpan, civil::Weekday, tz::TimeZone};
use serde::{Deserialize, Serialize};

use crate::ohlc::{OHLC_PREFIX, OhlcProducer, SeriesRequest};

/// Key of the live tape snapshot.
pub const TAPE_KEY: &str = "fs:tape";
/// Key of the hot-list snapshot.
pub const HOTSET_KEY: &str = "fs:hotset";
/// Prefix of per-symbol quote keys.
pub const QUOTE_PREFIX: &str = "quote:";
/// Prefix of batch quote keys, `quotes:AAPL,MSFT`.
pub const QUOTES_PREFIX: &str = "quotes:";

const MAX_BATCH: usize = 50;

const TAPE_SYMBOLS: [&str; 6] = ["AAPL", "MSFT", "TSLA", "NVDA", "AMZN", "META"];
const HOTSET_SYMBOLS: [&str; 8] = ["AAPL", "MSFT", "TSLA", "NVDA", "AMZN", "META", "SPY", "QQQ"];
const TAPE_LEN: usize = 6;
const EXPIRY_HORIZON_DAYS: i64 = 60;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Option side of a print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// A call.
    #[serde(rename = "C")]
    Call,
    /// A put.
    #[serde(rename = "P")]
    Put,
}

/// One option trade on the tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Print {
    /// When the print happened.
    pub t: Timestamp,
    /// Underlying symbol.
    pub symbol: String,
    /// Instrument type; always `opt`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Call or put.
    pub side: Side,
    /// Strike price.
    pub strike: f64,
    /// Expiration date, `YYYY-MM-DD`.
    pub expiry: String,
    /// Premium paid.
    pub prem: f64,
}

/// Produces a fresh batch of random option prints.
#[derive(Debug, Clone, Copy, Default)]
pub struct TapeProducer;

impl TapeProducer {
    fn expiry(now: Timestamp) -> Result<String, ProducerError> {
        let horizon = now.to_zoned(TimeZone::UTC).date().checked_add(EXPIRY_HORIZON_DAYS.days())?;
        Ok(horizon.nth_weekday(1, Weekday::Friday)?.to_string())
    }
}

impl Producer for TapeProducer {
    type Value = Vec<Print>;

    async fn produce(&self, _key: &str) -> Result<Vec<Print>, ProducerError> {
        let now = Timestamp::now();
        let expiry = Self::expiry(now)?;
        let prints = (0..TAPE_LEN)
            .map(|_| Print {
                t: now,
                symbol: TAPE_SYMBOLS[fastrand::usize(..TAPE_SYMBOLS.len())].to_owned(),
                kind: "opt".to_owned(),
                side: if fastrand::bool() { Side::Call } else { Side::Put },
                strike: round2(500.0f64.mul_add(fastrand::f64(), 50.0)),
                expiry: expiry.clone(),
                prem: round2(10_000.0 * fastrand::f64()),
            })
            .collect();
        Ok(prints)
    }
}

/// One row of the hot list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotRow {
    /// Symbol.
    pub symbol: String,
    /// Activity score between 50 and 100.
    pub score: f64,
    /// When the score was computed.
    pub updated: Timestamp,
}

/// Produces the scored hot list.
#[derive(Debug, Clone, Copy, Default)]
pub struct HotsetProducer;

impl Producer for HotsetProducer {
    type Value = Vec<HotRow>;

    async fn produce(&self, _key: &str) -> Result<Vec<HotRow>, ProducerError> {
        let updated = Timestamp::now();
        Ok(HOTSET_SYMBOLS
            .iter()
            .map(|symbol| HotRow {
                symbol: (*symbol).to_owned(),
                score: round2(50.0f64.mul_add(fastrand::f64(), 50.0)),
                updated,
            })
            .collect())
    }
}

/// A normalized quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Symbol.
    pub symbol: String,
    /// Last price.
    pub price: f64,
    /// Absolute change.
    pub change: f64,
    /// Percent change, `1.23` meaning +1.23 %.
    pub change_pct: f64,
    /// When the quote was taken.
    pub ts: Timestamp,
}

/// Produces deterministic mock quotes for `quote:<SYMBOL>` keys.
///
/// The base price depends only on the symbol, and the drift stays within one percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteProducer;

impl QuoteProducer {
    /// Extracts and normalizes the symbol of a quote key.
    #[must_use]
    pub fn symbol(key: &str) -> Option<String> {
        normalize_symbol(key.strip_prefix(QUOTE_PREFIX)?)
    }

    /// Extracts the symbols of a batch key, deduplicated and sorted.
    #[must_use]
    pub fn symbols(key: &str) -> Option<Vec<String>> {
        let symbols = key
            .strip_prefix(QUOTES_PREFIX)?
            .split(',')
            .map(normalize_symbol)
            .collect::<Option<BTreeSet<_>>>()?;
        (symbols.len() <= MAX_BATCH).then(|| symbols.into_iter().collect())
    }

    /// Computes the quotes of `symbols` at `ts`, keyed by symbol.
    #[must_use]
    pub fn quotes(symbols: &[String], ts: Timestamp) -> BTreeMap<String, Quote> {
        symbols.iter().map(|symbol| (symbol.clone(), Self::quote(symbol, ts))).collect()
    }

    /// Computes the quote of `symbol` at `ts`.
    #[must_use]
    pub fn quote(symbol: &str, ts: Timestamp) -> Quote {
        let seed = fnv1a(symbol.as_bytes());
        let base = f64::from(u16::try_from(seed % 400).unwrap_or_default()).mul_add(0.5, 50.0);
        let drift = (fastrand::Rng::with_seed(seed).f64() - 0.5) * 2.0;
        let price = round2(base * drift.mul_add(0.01, 1.0));
        let change_pct = round2(drift);
        Quote {
            symbol: symbol.to_owned(),
            price,
            change: round2(price * change_pct / 100.0),
            change_pct,
            ts,
        }
    }
}

impl Producer for QuoteProducer {
    type Value = Quote;

    async fn produce(&self, key: &str) -> Result<Quote, ProducerError> {
        let symbol = Self::symbol(key).ok_or_else(|| format!("not a quote key: {key}"))?;
        Ok(Self::quote(&symbol, Timestamp::now()))
    }
}

/// Trims and upper-cases a ticker symbol, rejecting empty or malformed ones.
pub(crate) fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    let valid = !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    valid.then(|| symbol.to_ascii_uppercase())
}

pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3))
}

/// The producer responsible for a resource key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// [`TAPE_KEY`], written by the scheduler.
    Tape,
    /// [`HOTSET_KEY`], written by the scheduler.
    Hotset,
    /// A `quote:<SYMBOL>` key.
    Quote(String),
    /// A `quotes:<SYMBOL>,<SYMBOL>...` key.
    Quotes(Vec<String>),
    /// An `ohlc:<SYMBOL>:<interval>:<range>` key.
    Ohlc(SeriesRequest),
}

impl Route {
    /// Returns the route of `key`, if any producer serves it.
    #[must_use]
    pub fn of(key: &str) -> Option<Self> {
        match key {
            TAPE_KEY => Some(Self::Tape),
            HOTSET_KEY => Some(Self::Hotset),
            _ if key.starts_with(OHLC_PREFIX) => SeriesRequest::parse(key).ok().map(Self::Ohlc),
            _ if key.starts_with(QUOTES_PREFIX) => QuoteProducer::symbols(key).map(Self::Quotes),
            _ => QuoteProducer::symbol(key).map(Self::Quote),
        }
    }

    /// Returns `true` for keys only the scheduler writes.
    ///
    /// These are served from the cache and never produced on demand.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Tape | Self::Hotset)
    }
}

/// Produces the on-demand keys: quotes, quote batches and OHLC series.
///
/// Scheduled keys are refused so that the scheduler stays their only writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketProducer {
    quotes: QuoteProducer,
    ohlc: OhlcProducer,
}

impl Producer for MarketProducer {
    type Value = serde_json::Value;

    async fn produce(&self, key: &str) -> Result<serde_json::Value, ProducerError> {
        let value = match Route::of(key) {
            Some(Route::Quote(_)) => serde_json::to_value(self.quotes.produce(key).await?)?,
            Some(Route::Quotes(symbols)) => serde_json::to_value(QuoteProducer::quotes(&symbols, Timestamp::now()))?,
            Some(Route::Ohlc(_)) => serde_json::to_value(self.ohlc.produce(key).await?)?,
            Some(Route::Tape | Route::Hotset) => return Err(format!("{key} is written by the scheduler").into()),
            None => return Err(format!("no producer for key {key}").into()),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tape_has_six_option_prints() {
        let tape = TapeProducer.produce(TAPE_KEY).await.unwrap();
        assert_eq!(tape.len(), 6);
        for print in &tape {
            assert!(TAPE_SYMBOLS.contains(&print.symbol.as_str()));
            assert_eq!(print.kind, "opt");
            assert!((50.0..=550.0).contains(&print.strike));
            assert!((0.0..=10_000.0).contains(&print.prem));
        }
    }

    #[tokio::test]
    async fn tape_serializes_with_wire_names() {
        let tape = TapeProducer.produce(TAPE_KEY).await.unwrap();
        let json = serde_json::to_value(&tape[0]).unwrap();
        assert_eq!(json["type"], "opt");
        assert!(json["side"] == "C" || json["side"] == "P");
        assert!(json["t"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn expiry_is_a_friday_about_two_months_out() {
        let now: Timestamp = "2025-10-01T12:00:00Z".parse().unwrap();
        let expiry = TapeProducer::expiry(now).unwrap();
        assert_eq!(expiry, "2025-12-05");
    }

    #[tokio::test]
    async fn hotset_has_eight_scored_rows() {
        let rows = HotsetProducer.produce(HOTSET_KEY).await.unwrap();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[7].symbol, "QQQ");
        assert!(rows.iter().all(|row| (50.0..=100.0).contains(&row.score)));
    }

    #[test]
    fn quote_is_deterministic_per_symbol() {
        let ts = Timestamp::UNIX_EPOCH;
        let first = QuoteProducer::quote("AAPL", ts);
        assert_eq!(first, QuoteProducer::quote("AAPL", ts));
        assert!((50.0..=250.0 * 1.01).contains(&first.price));
        assert!(first.change_pct.abs() <= 1.0);
    }

    #[test]
    fn quote_serializes_camel_case() {
        let json = serde_json::to_value(QuoteProducer::quote("MSFT", Timestamp::UNIX_EPOCH)).unwrap();
        assert!(json.get("changePct").is_some());
        assert_eq!(json["symbol"], "MSFT");
    }

    #[test]
    fn quote_symbols_are_normalized() {
        assert_eq!(QuoteProducer::symbol("quote:aapl").as_deref(), Some("AAPL"));
        assert_eq!(QuoteProducer::symbol("quote:BRK.B").as_deref(), Some("BRK.B"));
        assert_eq!(QuoteProducer::symbol("quote:"), None);
        assert_eq!(QuoteProducer::symbol("quote:a b"), None);
        assert_eq!(QuoteProducer::symbol("fs:tape"), None);
    }

    #[test]
    fn routes() {
        assert_eq!(Route::of("fs:tape"), Some(Route::Tape));
        assert_eq!(Route::of("fs:hotset"), Some(Route::Hotset));
        assert_eq!(Route::of("quote:nvda"), Some(Route::Quote("NVDA".to_owned())));
        assert_eq!(
            Route::of("quotes:msft,aapl,MSFT"),
            Some(Route::Quotes(vec!["AAPL".to_owned(), "MSFT".to_owned()]))
        );
        assert!(matches!(Route::of("ohlc:spy:1d:1y"), Some(Route::Ohlc(request)) if request.symbol == "SPY"));
        assert_eq!(Route::of("ohlc:spy:1w:1y"), None);
        assert_eq!(Route::of("quotes:AAPL,,MSFT"), None);
        assert_eq!(Route::of("fs:unknown"), None);
    }

    #[test]
    fn only_snapshots_are_scheduled() {
        assert!(Route::Tape.is_scheduled());
        assert!(Route::Hotset.is_scheduled());
        assert!(!Route::Quote("AAPL".to_owned()).is_scheduled());
    }

    #[test]
    fn batch_quotes_match_single_quotes() {
        let ts = Timestamp::UNIX_EPOCH;
        let symbols = QuoteProducer::symbols("quotes:TSLA,aapl").unwrap();
        let quotes = QuoteProducer::quotes(&symbols, ts);

        assert_eq!(quotes.keys().collect::<Vec<_>>(), ["AAPL", "TSLA"]);
        assert_eq!(quotes["TSLA"], QuoteProducer::quote("TSLA", ts));
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let key = format!("quotes:{}", (0..=MAX_BATCH).map(|i| format!("S{i}")).collect::<Vec<_>>().join(","));
        assert_eq!(QuoteProducer::symbols(&key), None);
    }

    #[tokio::test]
    async fn market_producer_rejects_unknown_keys() {
        let error = MarketProducer::default().produce("weather:today").await.unwrap_err();
        assert!(error.to_string().contains("weather:today"));
    }

    #[tokio::test]
    async fn market_producer_dispatches() {
        let quote = MarketProducer::default().produce("quote:TSLA").await.unwrap();
        assert_eq!(quote["symbol"], "TSLA");

        let batch = MarketProducer::default().produce("quotes:AAPL,MSFT").await.unwrap();
        assert_eq!(batch["MSFT"]["symbol"], "MSFT");

        let bars = MarketProducer::default().produce("ohlc:AAPL:1h:1d").await.unwrap();
        assert_eq!(bars.as_array().map(Vec::len), Some(24));
    }

    #[tokio::test]
    async fn market_producer_refuses_scheduled_keys() {
        let error = MarketProducer::default().produce(TAPE_KEY).await.unwrap_err();
        assert!(error.to_string().contains("scheduler"));
        assert!(MarketProducer::default().produce(HOTSET_KEY).await.is_err());
    }
}
