//! Gap-up breakout strategy.
//!
//! Per-symbol state machine:
//! `Scanning -> GapDetected -> VolumeAccumulating -> {VolumeValidated | Excluded}`
//! `VolumeValidated -> {SignalGenerated | Disqualified | Expired}`
//!
//! A symbol gaps in when its open sits inside the configured band above the
//! previous close AND above the previous session high. Cumulative volume is
//! checked once at the volume cutoff against the average daily volume. A
//! validated symbol signals the moment price trades strictly above its open,
//! is disqualified if price touches the open, and expires silently at the
//! signal cutoff. Terminal states never re-emit.

use super::{SessionPhase, StrategyEvaluator};
use crate::config::GapConfig;
use crate::market::MarketView;
use crate::signal::{CandidateSignal, Direction};
use crate::utils::decimal::{apply_pct, pct_change, safe_div};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

pub const STRATEGY_NAME: &str = "gap_breakout";

const ACTIVE_PHASES: &[SessionPhase] = &[SessionPhase::OpeningDrive];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GapState {
    Scanning,
    GapDetected,
    VolumeAccumulating,
    VolumeValidated,
    SignalGenerated,
    Disqualified,
    Excluded,
    Expired,
}

impl GapState {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            GapState::SignalGenerated | GapState::Disqualified | GapState::Excluded | GapState::Expired
        )
    }

    fn allows(self, next: GapState) -> bool {
        use GapState::*;
        matches!(
            (self, next),
            (Scanning, GapDetected)
                | (Scanning, Excluded)
                | (GapDetected, VolumeAccumulating)
                | (VolumeAccumulating, VolumeValidated)
                | (VolumeAccumulating, Excluded)
                | (VolumeValidated, SignalGenerated)
                | (VolumeValidated, Disqualified)
                | (VolumeValidated, Expired)
        )
    }
}

#[derive(Debug, Clone)]
struct SymbolTrack {
    state: GapState,
    /// Open recorded at gap detection; entry and default stop
    open: Decimal,
    gap_pct: Decimal,
    volume_ratio: Decimal,
}

pub struct GapBreakoutStrategy {
    config: GapConfig,
    tracks: HashMap<String, SymbolTrack>,
    // Mutually exclusive audit sets; a symbol is in at most one at a time.
    gap_flagged: HashSet<String>,
    volume_validated: HashSet<String>,
    disqualified: HashSet<String>,
    signaled: HashSet<String>,
}

impl GapBreakoutStrategy {
    pub fn new(config: GapConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
            gap_flagged: HashSet::new(),
            volume_validated: HashSet::new(),
            disqualified: HashSet::new(),
            signaled: HashSet::new(),
        }
    }

    /// Audit sets for tests and status reporting:
    /// (gap-flagged, volume-validated, disqualified, signaled).
    pub fn audit_sets(&self) -> (&HashSet<String>, &HashSet<String>, &HashSet<String>, &HashSet<String>) {
        (&self.gap_flagged, &self.volume_validated, &self.disqualified, &self.signaled)
    }

    fn set_state(&mut self, symbol: &str, next: GapState) {
        let track = match self.tracks.get_mut(symbol) {
            Some(t) => t,
            None => return,
        };
        debug_assert!(track.state.allows(next), "invalid gap transition {:?} -> {next:?}", track.state);
        debug!(symbol, from = ?track.state, to = ?next, "Gap state transition");
        track.state = next;

        self.gap_flagged.remove(symbol);
        self.volume_validated.remove(symbol);
        match next {
            GapState::GapDetected | GapState::VolumeAccumulating => {
                self.gap_flagged.insert(symbol.to_string());
            }
            GapState::VolumeValidated => {
                self.volume_validated.insert(symbol.to_string());
            }
            GapState::Disqualified => {
                self.disqualified.insert(symbol.to_string());
            }
            GapState::SignalGenerated => {
                self.signaled.insert(symbol.to_string());
            }
            _ => {}
        }
    }

    fn classify(&mut self, symbol: &str, open: Decimal, prev_close: Decimal, prev_high: Decimal) {
        let gap = pct_change(prev_close, open);
        let in_band = gap >= self.config.min_gap_pct && gap <= self.config.max_gap_pct;

        self.tracks.insert(
            symbol.to_string(),
            SymbolTrack {
                state: GapState::Scanning,
                open,
                gap_pct: gap,
                volume_ratio: Decimal::ZERO,
            },
        );

        if in_band && open > prev_high {
            info!(
                symbol,
                gap_pct = %gap,
                %open,
                %prev_high,
                "Gap detected"
            );
            self.set_state(symbol, GapState::GapDetected);
            self.set_state(symbol, GapState::VolumeAccumulating);
        } else {
            debug!(symbol, gap_pct = %gap, in_band, "Excluded at gap detection");
            self.set_state(symbol, GapState::Excluded);
        }
    }

    fn build_candidate(&self, symbol: &str, track: &SymbolTrack) -> CandidateSignal {
        let entry = track.open;
        // Stop is the opening price, capped so risk from entry never exceeds
        // the configured maximum: take the less risky (higher) of the two.
        let risk_floor = entry * (Decimal::ONE - self.config.max_risk_pct);
        let stop = track.open.max(risk_floor);

        CandidateSignal {
            symbol: symbol.to_string(),
            direction: Direction::Long,
            strategy: STRATEGY_NAME,
            entry,
            stop,
            target1: apply_pct(entry, self.config.target1_pct),
            target2: apply_pct(entry, self.config.target2_pct),
            factors: vec![("gap_pct", track.gap_pct), ("volume_ratio", track.volume_ratio)],
            rationale: format!(
                "Gapped up {:.2}% over prev close, opened above prev high; {:.0}% of avg daily volume by cutoff",
                track.gap_pct * Decimal::from(100u8),
                track.volume_ratio * Decimal::from(100u8),
            ),
            generated_at: Utc::now(),
        }
    }
}

impl StrategyEvaluator for GapBreakoutStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    fn active_phases(&self) -> &'static [SessionPhase] {
        ACTIVE_PHASES
    }

    fn evaluate(
        &mut self,
        _phase: SessionPhase,
        market: &MarketView,
        now: NaiveDateTime,
    ) -> Vec<CandidateSignal> {
        let mut candidates = Vec::new();

        for (symbol, tick) in market.ticks() {
            if !self.tracks.contains_key(symbol) {
                // Missing historical reference is data-unavailable: the
                // symbol stays unclassified until the reference arrives.
                let Some(hist) = market.historical(symbol) else {
                    continue;
                };
                self.classify(symbol, tick.open, hist.prev_close, hist.prev_high);
            }

            let state = match self.tracks.get(symbol) {
                Some(t) => t.state,
                None => continue,
            };
            if state.is_terminal() {
                continue;
            }

            if state == GapState::VolumeAccumulating && now.time() >= self.config.volume_cutoff {
                let Some(hist) = market.historical(symbol) else {
                    continue;
                };
                let ratio = safe_div(tick.volume, hist.avg_daily_volume);
                if let Some(track) = self.tracks.get_mut(symbol) {
                    track.volume_ratio = ratio;
                }
                if ratio >= self.config.min_volume_ratio {
                    info!(symbol = %symbol, volume_ratio = %ratio, "Volume validated");
                    self.set_state(symbol, GapState::VolumeValidated);
                } else {
                    debug!(symbol = %symbol, volume_ratio = %ratio, "Excluded: insufficient volume by cutoff");
                    self.set_state(symbol, GapState::Excluded);
                    continue;
                }
            }

            let state = match self.tracks.get(symbol) {
                Some(t) => t.state,
                None => continue,
            };
            if state != GapState::VolumeValidated {
                continue;
            }

            let track = match self.tracks.get(symbol) {
                Some(t) => t.clone(),
                None => continue,
            };

            if tick.ltp <= track.open {
                info!(symbol = %symbol, ltp = %tick.ltp, open = %track.open, "Disqualified: price fell to open");
                self.set_state(symbol, GapState::Disqualified);
            } else if now.time() >= self.config.signal_cutoff {
                debug!(symbol = %symbol, "Expired: signal cutoff passed");
                self.set_state(symbol, GapState::Expired);
            } else {
                // Strictly above the recorded open: emit exactly one signal
                // for this symbol this session.
                let candidate = self.build_candidate(symbol, &track);
                info!(
                    symbol = %symbol,
                    entry = %candidate.entry,
                    stop = %candidate.stop,
                    "Gap breakout signal generated"
                );
                self.set_state(symbol, GapState::SignalGenerated);
                candidates.push(candidate);
            }
        }

        // Validated symbols whose tick stream went silent still expire.
        let stale: Vec<String> = self
            .tracks
            .iter()
            .filter(|(_, t)| t.state == GapState::VolumeValidated)
            .filter(|_| now.time() >= self.config.signal_cutoff)
            .map(|(s, _)| s.clone())
            .collect();
        for symbol in stale {
            self.set_state(&symbol, GapState::Expired);
        }

        candidates
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.gap_flagged.clear();
        self.volume_validated.clear();
        self.disqualified.clear();
        self.signaled.clear();
    }
}
