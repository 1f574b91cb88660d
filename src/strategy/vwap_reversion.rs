//! VWAP reversion strategy.
//!
//! Mid-session only: looks for a symbol trading well below its running VWAP
//! while its day is still net positive, and bets on a snap back toward the
//! average. Entry is the current price rather than a breakout level, so the
//! targets and stop are tighter than the breakout strategies.

use super::{SessionPhase, StrategyEvaluator};
use crate::config::VwapReversionConfig;
use crate::market::MarketView;
use crate::signal::{CandidateSignal, Direction};
use crate::utils::decimal::{apply_pct, safe_div};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use tracing::info;

pub const STRATEGY_NAME: &str = "vwap_reversion";

const ACTIVE_PHASES: &[SessionPhase] = &[SessionPhase::MidSession];

pub struct VwapReversionStrategy {
    config: VwapReversionConfig,
    signaled: HashSet<String>,
}

impl VwapReversionStrategy {
    pub fn new(config: VwapReversionConfig) -> Self {
        Self {
            config,
            signaled: HashSet::new(),
        }
    }
}

/// Where the current price sits in the day's range, clamped to [0, 1].
/// Degenerate range (high == low) reads as the midpoint.
fn day_position(ltp: Decimal, high: Decimal, low: Decimal) -> Decimal {
    if high <= low {
        return dec!(0.5);
    }
    safe_div(ltp - low, high - low)
        .clamp(Decimal::ZERO, Decimal::ONE)
}

impl StrategyEvaluator for VwapReversionStrategy {
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
        let mut candidates = Vec::new();

        for (symbol, tick) in market.ticks() {
            if self.signaled.contains(symbol) {
                continue;
            }
            let Some(vwap) = market.vwap(symbol) else {
                continue;
            };

            let deviation = safe_div(vwap - tick.ltp, vwap);
            if deviation < self.config.min_deviation_pct {
                continue;
            }
            // Only fade dips in a day that is still up; a stretch below VWAP
            // on a down day is trend, not noise.
            if tick.ltp <= tick.open {
                continue;
            }

            let entry = tick.ltp;
            let stop = entry * (Decimal::ONE - self.config.stop_pct);
            let position = day_position(tick.ltp, tick.high, tick.low);

            info!(
                symbol = %symbol,
                %entry,
                %vwap,
                %deviation,
                "VWAP reversion signal generated"
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
                    ("vwap_deviation_pct", deviation),
                    ("day_position", position),
                ],
                rationale: format!(
                    "Stretched {:.2}% below VWAP {} on an up day",
                    deviation * Decimal::from(100u8),
                    vwap,
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

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn tick(symbol: &str, ltp: Decimal, open: Decimal, high: Decimal, low: Decimal) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            ltp,
            open,
            high,
            low,
            volume: dec!(100_000),
            exchange_ts: noon(),
            received_at: Utc::now(),
        }
    }

    /// Store with SBIN VWAP pinned at 100.
    fn store_with_vwap() -> MarketDataStore {
        let store = MarketDataStore::new(15);
        store.update_vwap("SBIN", dec!(100), dec!(1000));
        store
    }

    #[test]
    fn test_stretch_below_vwap_on_up_day_signals() {
        let store = store_with_vwap();
        // 98 is 2% below VWAP 100, day opened at 97.
        store.update_tick(tick("SBIN", dec!(98), dec!(97), dec!(101), dec!(97)));

        let mut s = VwapReversionStrategy::new(VwapReversionConfig::default());
        let candidates = s.evaluate(SessionPhase::MidSession, &store.view(), noon());

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.entry, dec!(98));
        assert_eq!(c.stop, dec!(98) * dec!(0.99));
        assert_eq!(c.factor("vwap_deviation_pct"), Some(dec!(0.02)));
        // (98 - 97) / (101 - 97) = 0.25
        assert_eq!(c.factor("day_position"), Some(dec!(0.25)));
    }

    #[test]
    fn test_down_day_is_not_faded() {
        let store = store_with_vwap();
        store.update_tick(tick("SBIN", dec!(98), dec!(99), dec!(100), dec!(97)));

        let mut s = VwapReversionStrategy::new(VwapReversionConfig::default());
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), noon()).is_empty());
    }

    #[test]
    fn test_shallow_deviation_is_ignored() {
        let store = store_with_vwap();
        // 99 is only 1% below VWAP; default threshold is 1.5%.
        store.update_tick(tick("SBIN", dec!(99), dec!(98), dec!(101), dec!(97)));

        let mut s = VwapReversionStrategy::new(VwapReversionConfig::default());
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), noon()).is_empty());
    }

    #[test]
    fn test_no_vwap_no_signal() {
        let store = MarketDataStore::new(15);
        store.update_tick(tick("SBIN", dec!(98), dec!(97), dec!(101), dec!(97)));

        let mut s = VwapReversionStrategy::new(VwapReversionConfig::default());
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), noon()).is_empty());
    }

    #[test]
    fn test_one_signal_per_symbol_per_session() {
        let store = store_with_vwap();
        store.update_tick(tick("SBIN", dec!(98), dec!(97), dec!(101), dec!(97)));

        let mut s = VwapReversionStrategy::new(VwapReversionConfig::default());
        assert_eq!(s.evaluate(SessionPhase::MidSession, &store.view(), noon()).len(), 1);
        assert!(s.evaluate(SessionPhase::MidSession, &store.view(), noon()).is_empty());

        s.reset();
        assert_eq!(s.evaluate(SessionPhase::MidSession, &store.view(), noon()).len(), 1);
    }

    #[test]
    fn test_day_position_clamps_degenerate_range() {
        assert_eq!(day_position(dec!(100), dec!(100), dec!(100)), dec!(0.5));
        assert_eq!(day_position(dec!(105), dec!(104), dec!(100)), dec!(1));
    }
}
