//! Concurrent in-memory market data store.
//!
//! The only shared mutable resource between the feed producer and the scan
//! cycle consumer. Every mutation replaces a whole per-symbol record under a
//! write lock, so readers never observe a half-written tick. Purely
//! in-memory; footprint is bounded by the instrument count.

use super::candle::CandleSeries;
use super::types::{Candle, HistoricalReference, OpeningRange, Tick, VwapState};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct RangeState {
    ranges: HashMap<String, OpeningRange>,
    locked: bool,
}

/// Per-symbol live ticks, historical references, and derived intraday
/// indicators behind independent locks per concern.
pub struct MarketDataStore {
    candle_width_minutes: u32,
    ticks: RwLock<HashMap<String, Tick>>,
    historical: RwLock<HashMap<String, HistoricalReference>>,
    ranges: RwLock<RangeState>,
    vwap: RwLock<HashMap<String, VwapState>>,
    candles: RwLock<HashMap<String, CandleSeries>>,
}

impl MarketDataStore {
    pub fn new(candle_width_minutes: u32) -> Self {
        Self {
            candle_width_minutes,
            ticks: RwLock::new(HashMap::new()),
            historical: RwLock::new(HashMap::new()),
            ranges: RwLock::new(RangeState::default()),
            vwap: RwLock::new(HashMap::new()),
            candles: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the live tick for a symbol. Last writer wins.
    pub fn update_tick(&self, tick: Tick) {
        self.ticks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tick.symbol.clone(), tick);
    }

    pub fn tick(&self, symbol: &str) -> Option<Tick> {
        self.ticks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .cloned()
    }

    /// Consistent per-symbol snapshot of all live ticks for one scan cycle.
    pub fn snapshot_ticks(&self) -> HashMap<String, Tick> {
        self.ticks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One read-only view for a whole scan cycle. Ticks are captured here;
    /// the feed keeps writing to the store without the cycle noticing.
    pub fn view(&self) -> MarketView<'_> {
        MarketView {
            store: self,
            ticks: self.snapshot_ticks(),
        }
    }

    /// Seed previous-session reference values; immutable for the session.
    pub fn seed_historical(&self, symbol: &str, reference: HistoricalReference) {
        self.historical
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(symbol.to_string(), reference);
    }

    pub fn historical(&self, symbol: &str) -> Option<HistoricalReference> {
        self.historical
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .copied()
    }

    /// Widen the opening range with a traded price. A no-op once
    /// `lock_opening_ranges` has been called for the session.
    pub fn update_opening_range(&self, symbol: &str, price: Decimal) {
        let mut state = self.ranges.write().unwrap_or_else(PoisonError::into_inner);
        if state.locked {
            return;
        }
        state
            .ranges
            .entry(symbol.to_string())
            .and_modify(|r| {
                *r = OpeningRange {
                    high: r.high.max(price),
                    low: r.low.min(price),
                };
            })
            .or_insert(OpeningRange { high: price, low: price });
    }

    /// Freeze all opening ranges for the rest of the session.
    pub fn lock_opening_ranges(&self) {
        let mut state = self.ranges.write().unwrap_or_else(PoisonError::into_inner);
        if !state.locked {
            state.locked = true;
            debug!(symbols = state.ranges.len(), "Opening ranges locked");
        }
    }

    pub fn opening_ranges_locked(&self) -> bool {
        self.ranges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .locked
    }

    pub fn opening_range(&self, symbol: &str) -> Option<OpeningRange> {
        self.ranges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ranges
            .get(symbol)
            .copied()
    }

    /// Fold a trade into the running VWAP accumulator.
    pub fn update_vwap(&self, symbol: &str, price: Decimal, day_volume: Decimal) {
        self.vwap
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(symbol.to_string())
            .or_default()
            .apply(price, day_volume);
    }

    pub fn vwap(&self, symbol: &str) -> Option<Decimal> {
        self.vwap
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .and_then(|s| s.value())
    }

    pub fn reset_vwap(&self, symbol: &str) {
        self.vwap
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(symbol);
    }

    /// Fold a tick into the symbol's candle series.
    pub fn update_candle(&self, tick: &Tick) {
        self.candles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tick.symbol.clone())
            .or_default()
            .apply(tick, self.candle_width_minutes);
    }

    pub fn current_candle(&self, symbol: &str) -> Option<Candle> {
        self.candles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .and_then(|s| s.current().cloned())
    }

    pub fn completed_candles(&self, symbol: &str) -> Vec<Candle> {
        self.candles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .map(|s| s.completed().to_vec())
            .unwrap_or_default()
    }

    /// Mean volume of the last `n` completed candles.
    pub fn average_candle_volume(&self, symbol: &str, n: usize) -> Option<Decimal> {
        self.candles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .and_then(|s| s.average_volume(n))
    }

    /// Discard ticks and derived state at session end. Historical references
    /// are discarded too; the next session re-seeds.
    pub fn reset_session(&self) {
        self.ticks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.historical
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.ranges.write().unwrap_or_else(PoisonError::into_inner) = RangeState::default();
        self.vwap
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.candles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("Session state reset");
    }
}

/// The market as one scan cycle sees it.
///
/// Every strategy evaluation and exit check within a cycle prices a symbol
/// off the same tick; derived per-session state (references, ranges, VWAP,
/// candles) reads through to the store.
pub struct MarketView<'a> {
    store: &'a MarketDataStore,
    ticks: HashMap<String, Tick>,
}

impl MarketView<'_> {
    pub fn tick(&self, symbol: &str) -> Option<&Tick> {
        self.ticks.get(symbol)
    }

    pub fn ticks(&self) -> impl Iterator<Item = (&String, &Tick)> {
        self.ticks.iter()
    }

    pub fn historical(&self, symbol: &str) -> Option<HistoricalReference> {
        self.store.historical(symbol)
    }

    pub fn opening_ranges_locked(&self) -> bool {
        self.store.opening_ranges_locked()
    }

    pub fn opening_range(&self, symbol: &str) -> Option<OpeningRange> {
        self.store.opening_range(symbol)
    }

    pub fn vwap(&self, symbol: &str) -> Option<Decimal> {
        self.store.vwap(symbol)
    }

    pub fn current_candle(&self, symbol: &str) -> Option<Candle> {
        self.store.current_candle(symbol)
    }

    pub fn average_candle_volume(&self, symbol: &str, n: usize) -> Option<Decimal> {
        self.store.average_candle_volume(symbol, n)
    }
}
