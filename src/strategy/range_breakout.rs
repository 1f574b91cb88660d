//! Opening-range breakout strategy.
//!
//! Waits for the opening ranges to lock, then signals the first time price
//! breaks above a symbol's locked range high on elevated candle volume.
//! One signal per symbol per session; there is no disqualification path,
//! a symbol that never breaks out simply never signals.

use super::{SessionPhase, StrategyEvaluator};
use crate::config::RangeBreakoutConfig;
use crate::market::MarketView;
use crate::signal::{CandidateSignal, Direction};
use crate::utils::decimal::{apply_pct, pct_change, safe_div};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info};

pub const STRATEGY_NAME: &str = "range_breakout";

const ACTIVE_PHASES: &[SessionPhase] = &[SessionPhase::OpeningDrive, SessionPhase::MidSession];

/// Completed candles considered for the average-volume baseline.
const VOLUME_LOOKBACK: usize = 4;

pub struct RangeBreakoutStrategy {
    config: RangeBreakoutConfig,
    signaled: HashSet<String>,
}

impl RangeBreakoutStrategy {
    pub fn new(config: RangeBreakoutConfig) -> Self {
        Self {
            config,
            signaled: HashSet::new(),
        }
    }
}

impl StrategyEvaluator for RangeBreakoutStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn active_phases(&self) -> &'static [SessionPhase] {
        ACTIVE_PHASES
    }

    fn evaluate(
        &mut self,
        _phase: SessionPhase,
        market: &MarketView,
        _now: NaiveDateTime,
    ) -> Vec<CandidateSignal> {
        // Ranges are only meaningful once frozen.
        if !market.opening_ranges_locked() {
            return Vec::new();
        }

        let mut candidates = Vec::new();

        for (symbol, tick) in market.ticks() {
            if self.signaled.contains(symbol) {
                continue;
            }
            let Some(range) = market.opening_range(symbol) else {
                continue;
            };
            if tick.ltp <= range.high {
                continue;
            }

            // Volume confirmation needs at least one completed candle.
            let Some(avg_volume) = market.average_candle_volume(symbol, VOLUME_LOOKBACK) else {
                debug!(symbol = %symbol, "Breakout without candle history; waiting");
                continue;
            };
            let Some(current) = market.current_candle(symbol) else {
                continue;
            };
            let volume_ratio = safe_div(current.volume, avg_volume);
            if volume_ratio < self.config.min_candle_volume_ratio {
                debug!(
                    symbol = %symbol,
                    %volume_ratio,
                    "Breakout on thin volume; not signaling"
                );
                continue;
            }

            let entry = range.high;
            // Range low is the natural stop, capped at the maximum risk from
            // entry: take the less risky (higher) of the two.
            let risk_floor = entry * (Decimal::ONE - self.config.max_risk_pct);
            let stop = range.low.max(risk_floor);
            let breakout_pct = pct_change(range.high, tick.ltp);

            info!(
                symbol = %symbol,
                %entry,
                %stop,
                %breakout_pct,
                %volume_ratio,
                "Opening range breakout signal generated"
            );
            self.signaled.insert(symbol.clone());
            candidates.push(CandidateSignal {
                symbol: symbol.clone(),
                direction: Direction::Long,
                strategy: STRATEGY_NAME,
                entry,
                stop,
                target1: apply_pct(entry, self.config.target1_pct),
                target2: apply_pct(entry, self.config.target2_pct),
                factors: vec![
                    ("breakout_pct", breakout_pct),
                    ("candle_volume_ratio", volume_ratio),
                ],
                rationale: format!(
                    "Broke {:.2}% above locked opening range high on {:.1}x candle volume",
                    breakout_pct * Decimal::from(100u8),
                    volume_ratio,
                ),
                generated_at: Utc::now(),
            });
        }

        candidates
    }

    fn reset(&mut self) {
        self.signaled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketDataStore, Tick};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn tick(symbol: &str, ltp: Decimal, volume: Decimal, ts: NaiveDateTime) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            ltp,
            open: dec!(100),
            high: ltp,
            low: dec!(99),
            volume,
            exchange_ts: ts,
            received_at: Utc::now(),
        }
    }

    /// Store with a locked 100..102 opening range and one completed candle
    /// of 1,000 volume, plus a current candle carrying `current_volume`.
    fn breakout_store(symbol: &str, current_volume: Decimal) -> MarketDataStore {
        let store = MarketDataStore::new(15);
        store.update_opening_range(symbol, dec!(100));
        store.update_opening_range(symbol, dec!(102));
        store.lock_opening_ranges();

        store.update_candle(&tick(symbol, dec!(101), dec!(1000), at(9, 20)));
        store.update_candle(&tick(symbol, dec!(102), dec!(1000) + current_volume, at(9, 35)));
        store
    }

    #[test]
    fn test_breakout_on_volume_generates_signal() {
        let store = breakout_store("SBIN", dec!(2000));
        let mut s = RangeBreakoutStrategy::new(RangeBreakoutConfig::default());

        store.update_tick(tick("SBIN", dec!(102.5), dec!(3000), at(9, 36)));
        let candidates = s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 36));

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.entry, dec!(102));
        // Range low 100 is above the 2% risk floor of 99.96, so it wins.
        assert_eq!(c.stop, dec!(100));
        assert_eq!(c.target1, dec!(102) * dec!(1.03));
    }

    #[test]
    fn test_unlocked_ranges_produce_nothing() {
        let store = MarketDataStore::new(15);
        store.update_opening_range("SBIN", dec!(102));
        store.update_tick(tick("SBIN", dec!(105), dec!(1000), at(9, 20)));

        let mut s = RangeBreakoutStrategy::new(RangeBreakoutConfig::default());
        assert!(s.evaluate(SessionPhase::OpeningDrive, &store.view(), at(9, 20)).is_empty());
    }

    #[test]
    fn test_thin_volume_breakout_waits() {
        let store = breakout_store("SBIN", dec!(100));
        let mut s = RangeBreakoutStrategy::new(RangeBreakoutConfig::default());

        store.update_tick(tick("SBIN", dec!(102.5), dec!(1100), at(9, 36)));
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 36)).is_empty());

        // Volume builds up in the same bucket; the symbol may still signal.
        store.update_candle(&tick("SBIN", dec!(102.6), dec!(4000), at(9, 40)));
        store.update_tick(tick("SBIN", dec!(102.6), dec!(4000), at(9, 40)));
        assert_eq!(s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 40)).len(), 1);
    }

    #[test]
    fn test_price_inside_range_is_ignored() {
        let store = breakout_store("SBIN", dec!(2000));
        let mut s = RangeBreakoutStrategy::new(RangeBreakoutConfig::default());

        store.update_tick(tick("SBIN", dec!(101.5), dec!(3000), at(9, 36)));
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 36)).is_empty());
    }

    #[test]
    fn test_one_signal_per_symbol_per_session() {
        let store = breakout_store("SBIN", dec!(2000));
        let mut s = RangeBreakoutStrategy::new(RangeBreakoutConfig::default());

        store.update_tick(tick("SBIN", dec!(102.5), dec!(3000), at(9, 36)));
        assert_eq!(s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 36)).len(), 1);

        store.update_tick(tick("SBIN", dec!(103.5), dec!(4000), at(9, 40)));
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 40)).is_empty());

        s.reset();
        assert_eq!(s.evaluate(SessionPhase::MidSession, &store.view(), at(9, 40)).len(), 1);
    }
}
