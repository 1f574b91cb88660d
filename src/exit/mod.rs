//! Position lifecycle and exit management.
//!
//! Final signals land here as pending entries awaiting confirmation. A
//! confirmed entry becomes an open position whose stop only ever ratchets
//! upward: to breakeven once price clears the first trigger, then trailing
//! behind the session high once it clears the second.

mod monitor;

pub use monitor::{ExitEvent, ExitMonitor};

use crate::signal::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("no pending signal with id {0}")]
    Unknown(String),
    #[error("signal {0} expired before confirmation")]
    Expired(String),
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    /// Price fell to the stop before the trail activated (initial or breakeven level)
    StopLoss,
    /// Price fell to an active trailing stop
    TrailingStop,
    /// Price reached the second target
    TargetTwo,
    /// Forced square-off at session end
    TimeExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop-loss",
            ExitReason::TrailingStop => "trailing-stop",
            ExitReason::TargetTwo => "target-2",
            ExitReason::TimeExit => "time-exit",
        };
        write!(f, "{s}")
    }
}

/// Stop-ratchet state for one open position.
#[derive(Debug, Clone, Serialize)]
pub struct TrailState {
    /// Effective stop; monotonically non-decreasing for the life of the position
    pub current_stop: Decimal,
    pub breakeven_set: bool,
    pub trailing: bool,
    /// Highest price observed since entry
    pub highest_price: Decimal,
    pub target1_alerted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenPosition {
    /// Identity carried over from the originating signal
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub quantity: u64,
    pub target1: Decimal,
    pub target2: Decimal,
    pub opened_at: DateTime<Utc>,
    pub trail: TrailState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClosedPosition {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub quantity: u64,
    pub exit_price: Decimal,
    pub reason: ExitReason,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
}

impl ClosedPosition {
    pub(crate) fn from_open(
        position: OpenPosition,
        exit_price: Decimal,
        reason: ExitReason,
        closed_at: DateTime<Utc>,
    ) -> Self {
        let per_share = match position.direction {
            Direction::Long => exit_price - position.entry,
            Direction::Short => position.entry - exit_price,
        };
        let pnl = per_share * Decimal::from(position.quantity);
        let pnl_pct = if position.entry > Decimal::ZERO {
            per_share / position.entry
        } else {
            Decimal::ZERO
        };
        Self {
            id: position.id,
            symbol: position.symbol,
            direction: position.direction,
            entry: position.entry,
            quantity: position.quantity,
            exit_price,
            reason,
            opened_at: position.opened_at,
            closed_at,
            pnl,
            pnl_pct,
        }
    }
}
