//! Cross-strategy dedup stage.

use super::{ScanContext, ScanStage};
use crate::signal::{CandidateSignal, SuppressedSignal};
use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

/// Keeps at most one candidate per symbol per cycle. When two strategies
/// fire on the same symbol, the configured priority order decides; a
/// strategy missing from the order loses to any listed one.
pub struct DedupStage {
    priority: Vec<String>,
}

impl DedupStage {
    pub fn new(priority: Vec<String>) -> Self {
        Self { priority }
    }

    fn priority_of(&self, strategy: &str) -> usize {
        self.priority
            .iter()
            .position(|s| s == strategy)
            .unwrap_or(self.priority.len())
    }
}

impl ScanStage for DedupStage {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn process(&self, mut context: ScanContext) -> Result<ScanContext> {
        let mut kept: HashMap<String, CandidateSignal> = HashMap::new();

        for candidate in context.candidates.drain(..) {
            match kept.remove(&candidate.symbol) {
                None => {
                    kept.insert(candidate.symbol.clone(), candidate);
                }
                Some(incumbent) => {
                    let (winner, loser) = if self.priority_of(candidate.strategy)
                        < self.priority_of(incumbent.strategy)
                    {
                        (candidate, incumbent)
                    } else {
                        (incumbent, candidate)
                    };
                    debug!(
                        symbol = %winner.symbol,
                        kept = winner.strategy,
                        dropped = loser.strategy,
                        "Deduplicated same-symbol candidates"
                    );
                    let reason = format!("duplicate symbol; {} takes priority", winner.strategy);
                    kept.insert(winner.symbol.clone(), winner);
                    context.suppressed.push(SuppressedSignal {
                        candidate: loser,
                        stage: "dedup",
                        reason,
                    });
                }
            }
        }

        context.candidates = kept.into_values().collect();
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use rust_decimal_macros::dec;

    fn stage() -> DedupStage {
        DedupStage::new(vec![
            "gap_breakout".to_string(),
            "range_breakout".to_string(),
            "vwap_reversion".to_string(),
        ])
    }

    #[test]
    fn test_priority_decides_same_symbol_conflict() {
        let context = context_with(vec![
            candidate("SBIN", "vwap_reversion", dec!(790)),
            candidate("SBIN", "gap_breakout", dec!(800)),
        ]);
        let out = stage().process(context).unwrap();

        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].strategy, "gap_breakout");
        assert_eq!(out.suppressed.len(), 1);
        assert_eq!(out.suppressed[0].candidate.strategy, "vwap_reversion");
        assert!(out.suppressed[0].reason.contains("gap_breakout"));
    }

    #[test]
    fn test_distinct_symbols_all_pass() {
        let context = context_with(vec![
            candidate("SBIN", "gap_breakout", dec!(800)),
            candidate("TCS", "range_breakout", dec!(3500)),
        ]);
        let out = stage().process(context).unwrap();
        assert_eq!(out.candidates.len(), 2);
        assert!(out.suppressed.is_empty());
    }

    #[test]
    fn test_unlisted_strategy_loses() {
        let context = context_with(vec![
            candidate("SBIN", "mystery", dec!(790)),
            candidate("SBIN", "vwap_reversion", dec!(800)),
        ]);
        let out = stage().process(context).unwrap();
        assert_eq!(out.candidates[0].strategy, "vwap_reversion");
    }
}
