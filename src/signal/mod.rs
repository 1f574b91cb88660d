//! Signal data model.
//!
//! Signals move through three shapes on their way out of the pipeline:
//! - `CandidateSignal`: raw output of one strategy, unranked and unfiltered.
//! - `RankedSignal`: candidate plus composite score, rank, and strength.
//! - `FinalSignal`: ranked signal plus sized quantity, capital, and expiry.
//!
//! Candidates dropped along the way become `SuppressedSignal`s so that every
//! rejection is logged with a reason rather than silently discarded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Trade direction. The current strategy set only emits long signals, but the
/// pipeline and exit engine are direction-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// An unranked trade suggestion emitted by a single strategy.
///
/// Immutable once emitted; downstream stages wrap it rather than mutate it.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSignal {
    pub symbol: String,
    pub direction: Direction,
    pub strategy: &'static str,
    pub entry: Decimal,
    pub stop: Decimal,
    pub target1: Decimal,
    pub target2: Decimal,
    /// Strategy-specific raw factor values (e.g. gap %, volume ratio),
    /// consumed by the scorer.
    pub factors: Vec<(&'static str, Decimal)>,
    pub rationale: String,
    pub generated_at: DateTime<Utc>,
}

impl CandidateSignal {
    /// Stable identity: symbol + strategy + entry. Rank and strength may be
    /// adjusted downstream but the identity never changes.
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.symbol, self.strategy, self.entry.normalize())
    }

    /// Look up a raw factor value by name.
    pub fn factor(&self, name: &str) -> Option<Decimal> {
        self.factors
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// A candidate with its composite score, rank position, and strength rating.
#[derive(Debug, Clone, Serialize)]
pub struct RankedSignal {
    pub candidate: CandidateSignal,
    /// Composite score in [0, 1].
    pub score: Decimal,
    /// 1-based rank after sorting; 0 until ranking runs.
    pub rank: usize,
    /// Strength rating in 1..=5 from equal-width score bucketing.
    pub strength: u8,
}

/// The last-mile signal: ranked, sized, and stamped with an expiry.
#[derive(Debug, Clone, Serialize)]
pub struct FinalSignal {
    pub ranked: RankedSignal,
    pub quantity: u64,
    pub capital_required: Decimal,
    pub expires_at: DateTime<Utc>,
}

impl FinalSignal {
    pub fn id(&self) -> String {
        self.ranked.candidate.id()
    }

    pub fn symbol(&self) -> &str {
        &self.ranked.candidate.symbol
    }
}

/// A candidate removed by a pipeline stage, with the stage and reason kept
/// for logging and persistence.
#[derive(Debug, Clone, Serialize)]
pub struct SuppressedSignal {
    pub candidate: CandidateSignal,
    pub stage: &'static str,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candidate(symbol: &str, entry: Decimal) -> CandidateSignal {
        CandidateSignal {
            symbol: symbol.to_string(),
            direction: Direction::Long,
            strategy: "gap_breakout",
            entry,
            stop: entry,
            target1: entry * dec!(1.05),
            target2: entry * dec!(1.07),
            factors: vec![("gap_pct", dec!(0.04))],
            rationale: String::new(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_id_is_stable_across_clones() {
        let c = candidate("RELIANCE", dec!(104));
        assert_eq!(c.id(), c.clone().id());
        assert_eq!(c.id(), "RELIANCE:gap_breakout:104");
    }

    #[test]
    fn test_id_normalizes_trailing_zeros() {
        let a = candidate("TCS", dec!(104.50));
        let b = candidate("TCS", dec!(104.5));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_factor_lookup() {
        let c = candidate("INFY", dec!(1500));
        assert_eq!(c.factor("gap_pct"), Some(dec!(0.04)));
        assert_eq!(c.factor("volume_ratio"), None);
    }
}
