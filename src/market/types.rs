//! Core market data records.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A single price/volume update for one instrument.
///
/// Immutable once constructed; superseded whole by the next tick for the same
/// symbol, never mutated field by field.
#[derive(Debug, Clone, Serialize)]
pub struct Tick {
    pub symbol: String,
    /// Last traded price
    pub ltp: Decimal,
    /// Day open so far
    pub open: Decimal,
    /// Day high so far
    pub high: Decimal,
    /// Day low so far
    pub low: Decimal,
    /// Cumulative day volume
    pub volume: Decimal,
    /// Exchange timestamp, exchange-local wall clock
    pub exchange_ts: NaiveDateTime,
    /// Local receipt timestamp
    pub received_at: DateTime<Utc>,
}

/// Previous-session reference values, seeded once before session start and
/// immutable for the day.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HistoricalReference {
    pub prev_close: Decimal,
    pub prev_high: Decimal,
    /// N-session average daily volume
    pub avg_daily_volume: Decimal,
}

/// High/low of the initial session window. Widened by ticks until locked,
/// frozen afterwards.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OpeningRange {
    pub high: Decimal,
    pub low: Decimal,
}

/// Running VWAP accumulator: cumulative price x volume over cumulative volume.
#[derive(Debug, Clone, Copy, Default)]
pub struct VwapState {
    pub cum_pv: Decimal,
    pub cum_volume: Decimal,
    /// Last observed cumulative day volume, used to derive per-tick deltas
    pub last_day_volume: Decimal,
}

impl VwapState {
    /// Fold one tick into the accumulator. A non-positive volume delta
    /// (vendor restatement or duplicate frame) leaves the accumulator
    /// untouched.
    pub fn apply(&mut self, price: Decimal, day_volume: Decimal) {
        let delta = day_volume - self.last_day_volume;
        if delta > Decimal::ZERO {
            self.cum_pv += price * delta;
            self.cum_volume += delta;
            self.last_day_volume = day_volume;
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        if self.cum_volume > Decimal::ZERO {
            Some(self.cum_pv / self.cum_volume)
        } else {
            None
        }
    }
}

/// One fixed-width OHLCV bucket.
#[derive(Debug, Clone, Serialize)]
pub struct Candle {
    /// Timestamp snapped down to the bucket boundary
    pub bucket_start: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume traded within this bucket (from day-volume deltas)
    pub volume: Decimal,
}
