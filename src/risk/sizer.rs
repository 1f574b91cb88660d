//! Capital-aware position sizing.
//!
//! Converts ranked signals into concrete quantities against a fixed session
//! capital split evenly across the open-position budget. Signals that cannot
//! be afforded are suppressed with a reason, never silently dropped.

use crate::config::SizingConfig;
use crate::signal::{FinalSignal, RankedSignal, SuppressedSignal};
use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Result of sizing one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedOrder {
    pub quantity: u64,
    pub capital_required: Decimal,
    pub per_trade_capital: Decimal,
}

pub struct RiskSizer {
    config: SizingConfig,
}

impl RiskSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Per-trade capital = total / max positions;
    /// quantity = floor(per-trade / entry); capital = quantity x entry.
    pub fn size(&self, entry: Decimal) -> SizedOrder {
        let per_trade_capital =
            self.config.total_capital / Decimal::from(self.config.max_positions as u64);
        let quantity = if entry > Decimal::ZERO {
            (per_trade_capital / entry).floor().to_u64().unwrap_or(0)
        } else {
            0
        };
        SizedOrder {
            quantity,
            capital_required: Decimal::from(quantity) * entry,
            per_trade_capital,
        }
    }

    /// Size the top-ranked signals against the remaining position budget.
    ///
    /// Returns immediately empty when the budget is exhausted; otherwise
    /// considers exactly the top `max_positions - open_positions` signals,
    /// suppressing zero-quantity ones and attaching a fixed expiry to each
    /// survivor. An unaffordable signal consumes its slot; affordability
    /// never promotes a lower rank.
    pub fn filter_and_size(
        &self,
        ranked: Vec<RankedSignal>,
        open_positions: usize,
    ) -> (Vec<FinalSignal>, Vec<SuppressedSignal>) {
        if ranked.is_empty() {
            return (Vec::new(), Vec::new());
        }

        if open_positions >= self.config.max_positions {
            info!(
                open_positions,
                max_positions = self.config.max_positions,
                dropped = ranked.len(),
                "Position budget exhausted; no signals sized this cycle"
            );
            let suppressed = ranked
                .into_iter()
                .map(|r| SuppressedSignal {
                    candidate: r.candidate,
                    stage: "sizing",
                    reason: format!(
                        "position budget exhausted ({open_positions} open of {} max)",
                        self.config.max_positions
                    ),
                })
                .collect();
            return (Vec::new(), suppressed);
        }

        let slots = self.config.max_positions - open_positions;
        let mut finals = Vec::new();
        let mut suppressed = Vec::new();
        let mut ranked = ranked.into_iter();

        for ranked_signal in ranked.by_ref().take(slots) {
            let order = self.size(ranked_signal.candidate.entry);
            if order.quantity == 0 {
                info!(
                    symbol = %ranked_signal.candidate.symbol,
                    entry = %ranked_signal.candidate.entry,
                    per_trade = %order.per_trade_capital,
                    "Signal suppressed: entry price exceeds per-trade allocation"
                );
                suppressed.push(SuppressedSignal {
                    candidate: ranked_signal.candidate,
                    stage: "sizing",
                    reason: format!(
                        "unaffordable: entry exceeds per-trade capital {}",
                        order.per_trade_capital
                    ),
                });
                continue;
            }

            debug!(
                symbol = %ranked_signal.candidate.symbol,
                quantity = order.quantity,
                capital = %order.capital_required,
                "Signal sized"
            );
            let expires_at = ranked_signal.candidate.generated_at
                + Duration::minutes(self.config.signal_validity_minutes);
            finals.push(FinalSignal {
                ranked: ranked_signal,
                quantity: order.quantity,
                capital_required: order.capital_required,
                expires_at,
            });
        }

        for ranked_signal in ranked {
            suppressed.push(SuppressedSignal {
                candidate: ranked_signal.candidate,
                stage: "sizing",
                reason: format!("only {slots} position slot(s) available this cycle"),
            });
        }

        (finals, suppressed)
    }
}
