//! Scoring and ranking stages.

use super::{ScanContext, ScanStage};
use crate::config::ScoringConfig;
use crate::rank::{self, SignalScorer};
use crate::signal::{RankedSignal, SuppressedSignal};
use anyhow::Result;
use tracing::debug;

/// Attaches a composite score to every surviving candidate. Rank and
/// strength stay zero until the ranking stage runs.
pub struct ScoringStage {
    scorer: SignalScorer,
}

impl ScoringStage {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            scorer: SignalScorer::new(config),
        }
    }
}

impl ScanStage for ScoringStage {
    fn name(&self) -> &'static str {
        "scoring"
    }

    fn process(&self, mut context: ScanContext) -> Result<ScanContext> {
        context.ranked = context
            .candidates
            .drain(..)
            .map(|candidate| {
                let score = self.scorer.score(&candidate);
                debug!(symbol = %candidate.symbol, strategy = candidate.strategy, %score, "Candidate scored");
                RankedSignal {
                    candidate,
                    score,
                    rank: 0,
                    strength: 0,
                }
            })
            .collect();
        Ok(context)
    }
}

/// Sorts the scored list, assigns ranks and strengths, and suppresses
/// everything below the configured top-N.
pub struct RankingStage {
    max_signals: usize,
}

impl RankingStage {
    pub fn new(max_signals: usize) -> Self {
        Self { max_signals }
    }
}

impl ScanStage for RankingStage {
    fn name(&self) -> &'static str {
        "ranking"
    }

    fn process(&self, mut context: ScanContext) -> Result<ScanContext> {
        let (selected, overflow) = rank::rank(std::mem::take(&mut context.ranked), self.max_signals);
        context.ranked = selected;
        for signal in overflow {
            context.suppressed.push(SuppressedSignal {
                reason: format!("ranked {}, below top-{}", signal.rank, self.max_signals),
                candidate: signal.candidate,
                stage: "ranking",
            });
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scoring_moves_candidates_to_ranked() {
        let stage = ScoringStage::new(&ScoringConfig::default());
        let context = context_with(vec![candidate("SBIN", "gap_breakout", dec!(800))]);

        let out = stage.process(context).unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(out.ranked.len(), 1);
        assert!(out.ranked[0].score > Decimal::ZERO);
        assert_eq!(out.ranked[0].rank, 0);
    }

    #[test]
    fn test_ranking_suppresses_overflow() {
        let scoring = ScoringStage::new(&ScoringConfig::default());
        let ranking = RankingStage::new(2);

        let context = context_with(vec![
            candidate("AAA", "gap_breakout", dec!(100)),
            candidate("BBB", "gap_breakout", dec!(100)),
            candidate("CCC", "gap_breakout", dec!(100)),
        ]);
        let out = ranking.process(scoring.process(context).unwrap()).unwrap();

        assert_eq!(out.ranked.len(), 2);
        assert_eq!(out.ranked[0].rank, 1);
        assert!(out.ranked.iter().all(|r| (1..=5).contains(&r.strength)));
        assert_eq!(out.suppressed.len(), 1);
        // Equal scores tie-break on symbol: CCC is the overflow.
        assert_eq!(out.suppressed[0].candidate.symbol, "CCC");
        assert_eq!(out.suppressed[0].stage, "ranking");
    }
}
