//! Fixed-width candle aggregation.
//!
//! One mutable current bucket per symbol; a candle completes exactly when a
//! tick arrives in a later bucket, at which point it joins the immutable
//! completed list and a new bucket begins with the triggering tick's values.

use super::types::{Candle, Tick};
use chrono::{NaiveDateTime, Timelike};
use rust_decimal::Decimal;

/// Snap a timestamp down to its fixed-width bucket boundary.
pub fn bucket_start(ts: NaiveDateTime, width_minutes: u32) -> NaiveDateTime {
    let minutes_into_day = ts.hour() * 60 + ts.minute();
    let snapped = minutes_into_day - (minutes_into_day % width_minutes);
    ts.date()
        .and_hms_opt(snapped / 60, snapped % 60, 0)
        .unwrap_or(ts)
}

/// Rolling candle series for one symbol.
#[derive(Debug, Default)]
pub struct CandleSeries {
    current: Option<Candle>,
    completed: Vec<Candle>,
    /// Last observed cumulative day volume, for per-tick deltas
    last_day_volume: Decimal,
}

impl CandleSeries {
    /// Fold a tick into the series.
    pub fn apply(&mut self, tick: &Tick, width_minutes: u32) {
        let bucket = bucket_start(tick.exchange_ts, width_minutes);
        let delta = (tick.volume - self.last_day_volume).max(Decimal::ZERO);
        self.last_day_volume = self.last_day_volume.max(tick.volume);

        match &mut self.current {
            Some(candle) if candle.bucket_start == bucket => {
                candle.high = candle.high.max(tick.ltp);
                candle.low = candle.low.min(tick.ltp);
                candle.close = tick.ltp;
                candle.volume += delta;
            }
            Some(candle) if candle.bucket_start < bucket => {
                let finished = candle.clone();
                self.completed.push(finished);
                self.current = Some(Self::fresh(bucket, tick, delta));
            }
            // Out-of-order tick from an earlier bucket: drop it rather than
            // rewrite a completed candle.
            Some(_) => {}
            None => {
                self.current = Some(Self::fresh(bucket, tick, delta));
            }
        }
    }

    fn fresh(bucket: NaiveDateTime, tick: &Tick, volume: Decimal) -> Candle {
        Candle {
            bucket_start: bucket,
            open: tick.ltp,
            high: tick.ltp,
            low: tick.ltp,
            close: tick.ltp,
            volume,
        }
    }

    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    pub fn completed(&self) -> &[Candle] {
        &self.completed
    }

    /// Mean volume over the last `n` completed candles.
    pub fn average_volume(&self, n: usize) -> Option<Decimal> {
        if self.completed.is_empty() {
            return None;
        }
        let window = &self.completed[self.completed.len().saturating_sub(n)..];
        let total: Decimal = window.iter().map(|c| c.volume).sum();
        Some(total / Decimal::from(window.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn tick(price: Decimal, volume: Decimal, at: NaiveDateTime) -> Tick {
        Tick {
            symbol: "RELIANCE".to_string(),
            ltp: price,
            open: dec!(100),
            high: price,
            low: price,
            volume,
            exchange_ts: at,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_bucket_start_snaps_deterministically() {
        assert_eq!(bucket_start(ts(9, 17, 42), 15), ts(9, 15, 0));
        assert_eq!(bucket_start(ts(9, 29, 59), 15), ts(9, 15, 0));
        assert_eq!(bucket_start(ts(9, 30, 0), 15), ts(9, 30, 0));
        assert_eq!(bucket_start(ts(14, 59, 1), 15), ts(14, 45, 0));
    }

    #[test]
    fn test_candle_completes_on_bucket_rollover() {
        let mut series = CandleSeries::default();
        series.apply(&tick(dec!(100), dec!(1000), ts(9, 16, 0)), 15);
        series.apply(&tick(dec!(101), dec!(1800), ts(9, 20, 0)), 15);
        assert!(series.completed().is_empty());

        // Tick in the next bucket completes the first candle.
        series.apply(&tick(dec!(102), dec!(2500), ts(9, 31, 0)), 15);

        assert_eq!(series.completed().len(), 1);
        let done = &series.completed()[0];
        assert_eq!(done.bucket_start, ts(9, 15, 0));
        assert_eq!(done.open, dec!(100));
        assert_eq!(done.close, dec!(101));
        assert_eq!(done.volume, dec!(1800));

        let current = series.current().unwrap();
        assert_eq!(current.bucket_start, ts(9, 30, 0));
        assert_eq!(current.open, dec!(102));
        assert_eq!(current.volume, dec!(700));
    }

    #[test]
    fn test_completed_candles_are_not_rewritten_by_late_ticks() {
        let mut series = CandleSeries::default();
        series.apply(&tick(dec!(100), dec!(1000), ts(9, 16, 0)), 15);
        series.apply(&tick(dec!(102), dec!(2000), ts(9, 31, 0)), 15);

        // Late tick from the completed bucket.
        series.apply(&tick(dec!(99), dec!(2100), ts(9, 29, 0)), 15);

        assert_eq!(series.completed()[0].low, dec!(100));
        assert_eq!(series.current().unwrap().low, dec!(102));
    }

    #[test]
    fn test_average_volume_over_window() {
        let mut series = CandleSeries::default();
        series.apply(&tick(dec!(100), dec!(1000), ts(9, 16, 0)), 15);
        series.apply(&tick(dec!(101), dec!(3000), ts(9, 31, 0)), 15);
        series.apply(&tick(dec!(102), dec!(6000), ts(9, 46, 0)), 15);

        // Completed: [1000, 2000]; average over last 2 = 1500.
        assert_eq!(series.average_volume(2), Some(dec!(1500)));
        assert_eq!(series.average_volume(1), Some(dec!(2000)));
    }

    #[test]
    fn test_average_volume_empty_is_none() {
        assert_eq!(CandleSeries::default().average_volume(4), None);
    }
}
