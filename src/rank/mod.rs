//! Composite scoring and top-N ranking.
//!
//! Each strategy-specific raw factor is linearly normalized against its
//! configured band (min -> 0, max -> 1, clamped) and combined into a single
//! [0, 1] composite by the strategy's weight group. Ranking sorts descending
//! by composite score with symbol as the deterministic tie-break, assigns a
//! 1..=5 strength rating by equal-width bucketing, and truncates to the
//! configured top-N without ever padding.

use crate::config::{FactorBand, ScoringConfig};
use crate::signal::{CandidateSignal, RankedSignal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

/// Normalize a raw factor value onto [0, 1] against its band. Out-of-band
/// values clamp; they never extrapolate.
pub fn normalize(value: Decimal, band: &FactorBand) -> Decimal {
    if band.max <= band.min {
        return Decimal::ZERO;
    }
    ((value - band.min) / (band.max - band.min))
        .clamp(Decimal::ZERO, Decimal::ONE)
}

/// Equal-width bucketing of the [0, 1] score range into five strength levels.
pub fn strength_bucket(score: Decimal) -> u8 {
    let bucket = (score * Decimal::from(5u8)).floor().to_i64().unwrap_or(0);
    (bucket + 1).clamp(1, 5) as u8
}

/// Scores candidates with configured factor bands and per-strategy weights.
pub struct SignalScorer {
    bands: HashMap<String, FactorBand>,
    weights: HashMap<String, HashMap<String, Decimal>>,
}

impl SignalScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            bands: config.bands.clone(),
            weights: config.weights.clone(),
        }
    }

    /// Composite score in [0, 1]. A factor the candidate did not report
    /// contributes zero for its weight; a strategy with no weight group
    /// scores zero (and is logged, since that is a configuration gap).
    pub fn score(&self, candidate: &CandidateSignal) -> Decimal {
        let Some(group) = self.weights.get(candidate.strategy) else {
            warn!(
                strategy = candidate.strategy,
                symbol = %candidate.symbol,
                "No scoring weights configured for strategy; scoring zero"
            );
            return Decimal::ZERO;
        };

        let mut composite = Decimal::ZERO;
        for (factor, weight) in group {
            let Some(band) = self.bands.get(factor) else {
                continue; // validated at startup; unreachable in practice
            };
            if let Some(raw) = candidate.factor(factor) {
                composite += *weight * normalize(raw, band);
            }
        }
        composite.clamp(Decimal::ZERO, Decimal::ONE)
    }
}

/// Sort scored signals, assign ranks and strengths, and split off the top-N.
///
/// Returns `(selected, overflow)`. Equal composite scores order by symbol
/// ascending so that re-ranking an unchanged list is idempotent.
pub fn rank(
    mut scored: Vec<RankedSignal>,
    max_signals: usize,
) -> (Vec<RankedSignal>, Vec<RankedSignal>) {
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.candidate.symbol.cmp(&b.candidate.symbol))
    });

    for (i, signal) in scored.iter_mut().enumerate() {
        signal.rank = i + 1;
        signal.strength = strength_bucket(signal.score);
    }

    let overflow = if scored.len() > max_signals {
        scored.split_off(max_signals)
    } else {
        Vec::new()
    };
    (scored, overflow)
}
