//! Strategy evaluators.
//!
//! Each evaluator is an independent rule engine that reads the cycle's
//! market view and emits zero or more candidate signals. An
//! evaluator owns a private per-symbol state machine and guarantees at most
//! one signal per symbol per session.

mod gap_breakout;
mod range_breakout;
mod vwap_reversion;

pub use gap_breakout::GapBreakoutStrategy;
pub use range_breakout::RangeBreakoutStrategy;
pub use vwap_reversion::VwapReversionStrategy;

use crate::market::MarketView;
use crate::signal::CandidateSignal;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Session phase, derived from configured exchange-local wall-clock
/// boundaries by the session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionPhase {
    PreOpen,
    /// Open through the end of the morning drive
    OpeningDrive,
    MidSession,
    /// No new entries; positions run to square-off
    LateSession,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::PreOpen => "pre-open",
            SessionPhase::OpeningDrive => "opening-drive",
            SessionPhase::MidSession => "mid-session",
            SessionPhase::LateSession => "late-session",
            SessionPhase::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// A rule engine evaluated once per scan cycle.
///
/// The pipeline holds a list of this trait, never concrete types; adding a
/// strategy means adding one implementation and a scoring weight group.
pub trait StrategyEvaluator: Send {
    fn name(&self) -> &'static str;

    /// Phases during which `evaluate` is called at all.
    fn active_phases(&self) -> &'static [SessionPhase];

    /// Read the cycle's market view and emit candidates. Must not perform
    /// any blocking I/O; everything needed comes from the view.
    fn evaluate(
        &mut self,
        phase: SessionPhase,
        market: &MarketView,
        now: NaiveDateTime,
    ) -> Vec<CandidateSignal>;

    /// Clear all per-session state.
    fn reset(&mut self);
}
