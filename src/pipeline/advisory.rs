//! Advisory overlay stage.

use super::{ScanContext, ScanStage};
use crate::advisory::{AdvisoryCache, Stance};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Downgrades the strength of signals whose symbol carries a bearish
/// stance. Never suppresses: the overlay is advice, not a veto, and a
/// downgrade bottoms out at strength 1. Cache misses pass through untouched.
pub struct AdvisoryStage {
    cache: Arc<AdvisoryCache>,
    enabled: bool,
}

impl AdvisoryStage {
    pub fn new(cache: Arc<AdvisoryCache>, enabled: bool) -> Self {
        Self { cache, enabled }
    }
}

impl ScanStage for AdvisoryStage {
    fn name(&self) -> &'static str {
        "advisory"
    }

    fn process(&self, mut context: ScanContext) -> Result<ScanContext> {
        if !self.enabled {
            return Ok(context);
        }

        for signal in &mut context.ranked {
            if self.cache.stance(&signal.candidate.symbol) == Some(Stance::Bearish) {
                let downgraded = signal.strength.saturating_sub(1).max(1);
                if downgraded != signal.strength {
                    info!(
                        symbol = %signal.candidate.symbol,
                        from = signal.strength,
                        to = downgraded,
                        "Strength downgraded on bearish advisory"
                    );
                    signal.strength = downgraded;
                }
            }
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use crate::signal::RankedSignal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn ranked(symbol: &str, strength: u8) -> RankedSignal {
        RankedSignal {
            candidate: candidate(symbol, "gap_breakout", dec!(100)),
            score: dec!(0.6),
            rank: 1,
            strength,
        }
    }

    fn bearish_cache(symbol: &str) -> Arc<AdvisoryCache> {
        let cache = AdvisoryCache::new();
        let mut stances = HashMap::new();
        stances.insert(symbol.to_string(), Stance::Bearish);
        cache.replace(stances);
        Arc::new(cache)
    }

    #[test]
    fn test_bearish_downgrades_one_level() {
        let stage = AdvisoryStage::new(bearish_cache("SBIN"), true);
        let mut context = context_with(vec![]);
        context.ranked = vec![ranked("SBIN", 4), ranked("TCS", 4)];

        let out = stage.process(context).unwrap();
        assert_eq!(out.ranked[0].strength, 3);
        assert_eq!(out.ranked[1].strength, 4);
        assert!(out.suppressed.is_empty());
    }

    #[test]
    fn test_downgrade_floors_at_one() {
        let stage = AdvisoryStage::new(bearish_cache("SBIN"), true);
        let mut context = context_with(vec![]);
        context.ranked = vec![ranked("SBIN", 1)];

        let out = stage.process(context).unwrap();
        assert_eq!(out.ranked[0].strength, 1);
    }

    #[test]
    fn test_disabled_stage_passes_through() {
        let stage = AdvisoryStage::new(bearish_cache("SBIN"), false);
        let mut context = context_with(vec![]);
        context.ranked = vec![ranked("SBIN", 4)];

        let out = stage.process(context).unwrap();
        assert_eq!(out.ranked[0].strength, 4);
    }

    #[test]
    fn test_cache_miss_is_untouched() {
        let stage = AdvisoryStage::new(Arc::new(AdvisoryCache::new()), true);
        let mut context = context_with(vec![]);
        context.ranked = vec![ranked("SBIN", 4)];

        let out = stage.process(context).unwrap();
        assert_eq!(out.ranked[0].strength, 4);
    }
}
