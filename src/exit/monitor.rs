//! Exit monitor: pending registry, confirmation, and per-tick stop checks.

use super::{ClosedPosition, ConfirmError, ExitReason, OpenPosition, TrailState};
use crate::config::ExitConfig;
use crate::market::MarketView;
use crate::signal::FinalSignal;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Something the exit check produced that the engine must act on.
#[derive(Debug, Clone)]
pub enum ExitEvent {
    Closed(ClosedPosition),
    /// First touch of target 1; the position stays open
    TargetAlert {
        id: String,
        symbol: String,
        price: Decimal,
        target: Decimal,
    },
}

/// Owns the pending-signal registry and every open position. Single-owner
/// state driven by the scan cycle; confirmation comes from the operator.
pub struct ExitMonitor {
    config: ExitConfig,
    pending: HashMap<String, FinalSignal>,
    positions: HashMap<String, OpenPosition>,
}

impl ExitMonitor {
    pub fn new(config: ExitConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn open_positions(&self) -> Vec<OpenPosition> {
        self.positions.values().cloned().collect()
    }

    /// Park a delivered signal until the operator confirms the fill.
    /// Re-registering the same id replaces the earlier copy.
    pub fn register_signal(&mut self, signal: FinalSignal) {
        debug!(id = %signal.id(), "Signal registered, awaiting confirmation");
        self.pending.insert(signal.id(), signal);
    }

    /// Drop pending signals whose validity window has passed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, s)| now > s.expires_at)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            info!(%id, "Pending signal expired unconfirmed");
            self.pending.remove(id);
        }
        expired
    }

    /// Promote a pending signal to an open position. Fails if the id is
    /// unknown or the signal expired before confirmation arrived.
    pub fn confirm_position(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<OpenPosition, ConfirmError> {
        let signal = self
            .pending
            .remove(id)
            .ok_or_else(|| ConfirmError::Unknown(id.to_string()))?;
        if now > signal.expires_at {
            return Err(ConfirmError::Expired(id.to_string()));
        }

        let candidate = &signal.ranked.candidate;
        let position = OpenPosition {
            id: signal.id(),
            symbol: candidate.symbol.clone(),
            direction: candidate.direction,
            entry: candidate.entry,
            quantity: signal.quantity,
            target1: candidate.target1,
            target2: candidate.target2,
            opened_at: now,
            trail: TrailState {
                current_stop: candidate.stop,
                breakeven_set: false,
                trailing: false,
                highest_price: candidate.entry,
                target1_alerted: false,
            },
        };
        info!(
            id = %position.id,
            symbol = %position.symbol,
            entry = %position.entry,
            stop = %position.trail.current_stop,
            quantity = position.quantity,
            "Position opened"
        );
        self.positions.insert(position.id.clone(), position.clone());
        Ok(position)
    }

    /// One pass over every open position against the cycle's tick view.
    ///
    /// Per position: ratchet the stop (breakeven, then trailing behind the
    /// session high), then check stop and target-2 exits, then the one-shot
    /// target-1 alert. The stop never moves down.
    pub fn check_positions(&mut self, market: &MarketView, now: DateTime<Utc>) -> Vec<ExitEvent> {
        let mut events = Vec::new();
        let mut closed_ids = Vec::new();

        for position in self.positions.values_mut() {
            let Some(tick) = market.tick(&position.symbol) else {
                continue;
            };
            let price = tick.ltp;
            position.trail.highest_price = position.trail.highest_price.max(price);

            // Ratchet. Proposed stops apply only when above the current one.
            let breakeven_at = position.entry * (Decimal::ONE + self.config.breakeven_trigger_pct);
            if !position.trail.breakeven_set && position.trail.highest_price >= breakeven_at {
                if position.entry > position.trail.current_stop {
                    debug!(id = %position.id, "Stop moved to breakeven");
                    position.trail.current_stop = position.entry;
                }
                position.trail.breakeven_set = true;
            }
            let trail_at = position.entry * (Decimal::ONE + self.config.trail_trigger_pct);
            if position.trail.highest_price >= trail_at {
                position.trail.trailing = true;
                let proposed = position.trail.highest_price
                    * (Decimal::ONE - self.config.trail_distance_pct);
                if proposed > position.trail.current_stop {
                    debug!(id = %position.id, stop = %proposed, "Trailing stop raised");
                    position.trail.current_stop = proposed;
                }
            }

            if price <= position.trail.current_stop {
                // Breakeven alone is still a plain stop; only an active trail
                // reports as a trailing-stop exit.
                let reason = if position.trail.trailing {
                    ExitReason::TrailingStop
                } else {
                    ExitReason::StopLoss
                };
                // Fill at the stop level, not the breaching tick.
                let exit_price = position.trail.current_stop;
                info!(
                    id = %position.id,
                    symbol = %position.symbol,
                    %exit_price,
                    %reason,
                    "Position exit triggered"
                );
                closed_ids.push((position.id.clone(), exit_price, reason));
                continue;
            }

            if price >= position.target2 {
                info!(
                    id = %position.id,
                    symbol = %position.symbol,
                    %price,
                    target = %position.target2,
                    "Second target reached, closing position"
                );
                closed_ids.push((position.id.clone(), position.target2, ExitReason::TargetTwo));
                continue;
            }

            if !position.trail.target1_alerted && price >= position.target1 {
                position.trail.target1_alerted = true;
                events.push(ExitEvent::TargetAlert {
                    id: position.id.clone(),
                    symbol: position.symbol.clone(),
                    price,
                    target: position.target1,
                });
            }
        }

        for (id, exit_price, reason) in closed_ids {
            if let Some(position) = self.positions.remove(&id) {
                events.push(ExitEvent::Closed(ClosedPosition::from_open(
                    position, exit_price, reason, now,
                )));
            }
        }
        events
    }

    /// Square-off: close every open position at its last traded price. A
    /// position with no tick on record closes at entry (flat).
    pub fn force_time_exit(
        &mut self,
        market: &MarketView,
        now: DateTime<Utc>,
    ) -> Vec<ClosedPosition> {
        let mut closed = Vec::new();
        for (_, position) in self.positions.drain() {
            let exit_price = match market.tick(&position.symbol) {
                Some(tick) => tick.ltp,
                None => {
                    warn!(
                        id = %position.id,
                        "No tick at square-off; closing flat at entry"
                    );
                    position.entry
                }
            };
            info!(
                id = %position.id,
                symbol = %position.symbol,
                %exit_price,
                "Position squared off"
            );
            closed.push(ClosedPosition::from_open(
                position,
                exit_price,
                ExitReason::TimeExit,
                now,
            ));
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketDataStore;
    use crate::signal::{CandidateSignal, Direction, RankedSignal};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn exit_config() -> ExitConfig {
        ExitConfig {
            breakeven_trigger_pct: dec!(0.02),
            trail_trigger_pct: dec!(0.04),
            trail_distance_pct: dec!(0.02),
        }
    }

    fn final_signal(symbol: &str, entry: Decimal, stop: Decimal) -> FinalSignal {
        FinalSignal {
            ranked: RankedSignal {
                candidate: CandidateSignal {
                    symbol: symbol.to_string(),
                    direction: Direction::Long,
                    strategy: "gap_breakout",
                    entry,
                    stop,
                    target1: entry * dec!(1.05),
                    target2: entry * dec!(1.07),
                    factors: vec![],
                    rationale: String::new(),
                    generated_at: Utc::now(),
                },
                score: dec!(0.5),
                rank: 1,
                strength: 3,
            },
            quantity: 100,
            capital_required: entry * dec!(100),
            expires_at: Utc::now() + Duration::minutes(15),
        }
    }

    fn confirmed(monitor: &mut ExitMonitor, symbol: &str, entry: Decimal, stop: Decimal) -> String {
        let signal = final_signal(symbol, entry, stop);
        let id = signal.id();
        monitor.register_signal(signal);
        monitor.confirm_position(&id, Utc::now()).unwrap();
        id
    }

    fn market_at(symbol: &str, price: Decimal) -> MarketDataStore {
        let store = MarketDataStore::new(15);
        feed(&store, symbol, price);
        store
    }

    fn feed(store: &MarketDataStore, symbol: &str, price: Decimal) {
        store.update_tick(crate::market::Tick {
            symbol: symbol.to_string(),
            ltp: price,
            open: dec!(100),
            high: price,
            low: dec!(95),
            volume: dec!(1000),
            exchange_ts: chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(11, 0, 0)
                .unwrap(),
            received_at: Utc::now(),
        });
    }

    #[test]
    fn test_confirm_unknown_id_fails() {
        let mut monitor = ExitMonitor::new(exit_config());
        assert!(matches!(
            monitor.confirm_position("SBIN:gap_breakout:800", Utc::now()),
            Err(ConfirmError::Unknown(_))
        ));
    }

    #[test]
    fn test_confirm_after_expiry_fails() {
        let mut monitor = ExitMonitor::new(exit_config());
        let signal = final_signal("SBIN", dec!(800), dec!(790));
        let id = signal.id();
        let expired_at = signal.expires_at + Duration::seconds(1);
        monitor.register_signal(signal);

        assert!(matches!(
            monitor.confirm_position(&id, expired_at),
            Err(ConfirmError::Expired(_))
        ));
        assert_eq!(monitor.open_count(), 0);
    }

    #[test]
    fn test_sweep_drops_expired_pending() {
        let mut monitor = ExitMonitor::new(exit_config());
        let signal = final_signal("SBIN", dec!(800), dec!(790));
        let id = signal.id();
        let later = signal.expires_at + Duration::seconds(1);
        monitor.register_signal(signal);

        let expired = monitor.sweep_expired(later);
        assert_eq!(expired, vec![id.clone()]);
        assert!(matches!(
            monitor.confirm_position(&id, later),
            Err(ConfirmError::Unknown(_))
        ));
    }

    #[test]
    fn test_initial_stop_loss_exit() {
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));

        let events = monitor.check_positions(&market_at("SBIN", dec!(96.5)).view(), Utc::now());
        assert_eq!(events.len(), 1);
        let ExitEvent::Closed(closed) = &events[0] else {
            panic!("expected close");
        };
        assert_eq!(closed.reason, ExitReason::StopLoss);
        // Filled at the stop level, not the breaching tick.
        assert_eq!(closed.exit_price, dec!(97));
        assert_eq!(closed.pnl, dec!(-300));
        assert_eq!(monitor.open_count(), 0);
    }

    #[test]
    fn test_breakeven_stop_hit_reports_plain_stop_loss() {
        // Entry 100, stop 97. +2% parks the stop at breakeven, but the trail
        // trigger (+4%) is never reached; a fall back to 100 is a stop-loss
        // exit, not a trailing-stop one.
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));
        let store = market_at("SBIN", dec!(102));

        assert!(monitor.check_positions(&store.view(), Utc::now()).is_empty());
        let trail = monitor.open_positions()[0].trail.clone();
        assert!(trail.breakeven_set && !trail.trailing);

        feed(&store, "SBIN", dec!(100));
        let events = monitor.check_positions(&store.view(), Utc::now());
        assert_eq!(events.len(), 1);
        let ExitEvent::Closed(closed) = &events[0] else {
            panic!("expected close");
        };
        assert_eq!(closed.reason, ExitReason::StopLoss);
        assert_eq!(closed.exit_price, dec!(100));
        assert_eq!(closed.pnl, Decimal::ZERO);
    }

    #[test]
    fn test_breakeven_then_trailing_ratchet() {
        // Entry 100, stop 97. +2% moves the stop to breakeven, +4% starts
        // trailing 2% behind the high, and the stop never moves back down.
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));
        let store = market_at("SBIN", dec!(102));

        assert!(monitor.check_positions(&store.view(), Utc::now()).is_empty());
        assert_eq!(monitor.open_positions()[0].trail.current_stop, dec!(100));

        feed(&store, "SBIN", dec!(104));
        assert!(monitor.check_positions(&store.view(), Utc::now()).is_empty());
        assert_eq!(monitor.open_positions()[0].trail.current_stop, dec!(101.92));

        feed(&store, "SBIN", dec!(106));
        let events = monitor.check_positions(&store.view(), Utc::now());
        // 106 touched target 1 (105) on the way: alert fires, position stays.
        assert!(matches!(events[0], ExitEvent::TargetAlert { .. }));
        assert_eq!(monitor.open_positions()[0].trail.current_stop, dec!(103.88));

        // Pullback that stays above the stop does not lower it.
        feed(&store, "SBIN", dec!(104.5));
        assert!(monitor.check_positions(&store.view(), Utc::now()).is_empty());
        assert_eq!(monitor.open_positions()[0].trail.current_stop, dec!(103.88));

        feed(&store, "SBIN", dec!(103.88));
        let events = monitor.check_positions(&store.view(), Utc::now());
        assert_eq!(events.len(), 1);
        let ExitEvent::Closed(closed) = &events[0] else {
            panic!("expected close");
        };
        assert_eq!(closed.reason, ExitReason::TrailingStop);
        assert_eq!(closed.exit_price, dec!(103.88));
        assert_eq!(closed.pnl, dec!(388));
    }

    #[test]
    fn test_target_two_closes_at_target() {
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));

        let events = monitor.check_positions(&market_at("SBIN", dec!(108)).view(), Utc::now());
        assert_eq!(events.len(), 1);
        let ExitEvent::Closed(closed) = &events[0] else {
            panic!("expected close");
        };
        assert_eq!(closed.reason, ExitReason::TargetTwo);
        assert_eq!(closed.exit_price, dec!(107));
    }

    #[test]
    fn test_target_one_alert_fires_once() {
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));
        let store = market_at("SBIN", dec!(105.5));

        let first = monitor.check_positions(&store.view(), Utc::now());
        assert!(matches!(first[0], ExitEvent::TargetAlert { .. }));

        let second = monitor.check_positions(&store.view(), Utc::now());
        assert!(second.is_empty());
        assert_eq!(monitor.open_count(), 1);
    }

    #[test]
    fn test_force_time_exit_closes_everything() {
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));
        confirmed(&mut monitor, "TCS", dec!(200), dec!(196));

        let store = market_at("SBIN", dec!(101));
        // TCS has no tick: closes flat at entry.
        let closed = monitor.force_time_exit(&store.view(), Utc::now());

        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(|c| c.reason == ExitReason::TimeExit));
        let tcs = closed.iter().find(|c| c.symbol == "TCS").unwrap();
        assert_eq!(tcs.exit_price, dec!(200));
        assert_eq!(tcs.pnl, Decimal::ZERO);
        assert_eq!(monitor.open_count(), 0);
    }

    #[test]
    fn test_no_tick_leaves_position_untouched() {
        let mut monitor = ExitMonitor::new(exit_config());
        confirmed(&mut monitor, "SBIN", dec!(100), dec!(97));

        let events = monitor.check_positions(&MarketDataStore::new(15).view(), Utc::now());
        assert!(events.is_empty());
        assert_eq!(monitor.open_count(), 1);
    }
}
