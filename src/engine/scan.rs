//! The engine that drives one scan cycle end to end.

use super::clock::{BoundaryEvent, SessionClock};
use crate::advisory::AdvisoryCache;
use crate::config::Config;
use crate::exit::{ConfirmError, ExitEvent, ExitMonitor};
use crate::market::MarketDataStore;
use crate::persistence::SinkEvent;
use crate::pipeline::{ScanContext, ScanPipeline};
use crate::strategy::{
    GapBreakoutStrategy, RangeBreakoutStrategy, SessionPhase, StrategyEvaluator,
    VwapReversionStrategy,
};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

/// Single-owner orchestrator: evaluates strategies, runs the pipeline,
/// registers delivered signals for confirmation, and checks exits, once per
/// main-loop tick. All market data comes in through the shared store.
pub struct ScanEngine {
    store: Arc<MarketDataStore>,
    clock: SessionClock,
    strategies: Vec<Box<dyn StrategyEvaluator>>,
    pipeline: ScanPipeline,
    monitor: ExitMonitor,
    sink: UnboundedSender<SinkEvent>,
    utc_offset_minutes: i64,
    session_closed: bool,
}

impl ScanEngine {
    pub fn new(
        config: &Config,
        store: Arc<MarketDataStore>,
        advisory_cache: Arc<AdvisoryCache>,
        sink: UnboundedSender<SinkEvent>,
    ) -> Self {
        let strategies: Vec<Box<dyn StrategyEvaluator>> = vec![
            Box::new(GapBreakoutStrategy::new(config.gap.clone())),
            Box::new(RangeBreakoutStrategy::new(config.range_breakout.clone())),
            Box::new(VwapReversionStrategy::new(config.vwap_reversion.clone())),
        ];
        Self {
            store,
            clock: SessionClock::new(config.session.clone()),
            strategies,
            pipeline: ScanPipeline::standard(config, advisory_cache, sink.clone()),
            monitor: ExitMonitor::new(config.exits.clone()),
            sink,
            utc_offset_minutes: config.session.utc_offset_minutes as i64,
            session_closed: false,
        }
    }

    pub fn open_positions(&self) -> usize {
        self.monitor.open_count()
    }

    /// Operator confirmed a fill for a delivered signal.
    pub fn confirm(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), ConfirmError> {
        let position = self.monitor.confirm_position(id, now)?;
        self.send(SinkEvent::PositionOpened(position));
        Ok(())
    }

    fn send(&self, event: SinkEvent) {
        if self.sink.send(event).is_err() {
            error!("Sink channel closed; event dropped");
        }
    }

    /// One full scan: boundaries, strategy evaluation, pipeline, exits.
    ///
    /// Ticks are snapshotted once up front; every evaluator and exit check in
    /// the cycle prices a symbol off the same view even while the feed keeps
    /// writing to the store.
    pub fn run_cycle(&mut self, now_utc: DateTime<Utc>) -> Result<()> {
        let now_local = (now_utc + Duration::minutes(self.utc_offset_minutes)).naive_utc();
        let phase = self.clock.phase(now_local.time());
        let market = self.store.view();

        for boundary in self.clock.poll_boundaries(now_local.time()) {
            match boundary {
                BoundaryEvent::LockOpeningRanges => self.store.lock_opening_ranges(),
                BoundaryEvent::SquareOff => {
                    for closed in self.monitor.force_time_exit(&market, now_utc) {
                        self.send(SinkEvent::PositionClosed(closed));
                    }
                }
            }
        }

        match phase {
            SessionPhase::PreOpen => {
                // Fresh session after a close: re-arm the boundary clock.
                if self.session_closed {
                    self.clock.reset();
                    self.session_closed = false;
                }
                return Ok(());
            }
            SessionPhase::Closed => {
                if !self.session_closed {
                    info!("Session closed; clearing per-session state");
                    for strategy in &mut self.strategies {
                        strategy.reset();
                    }
                    self.store.reset_session();
                    self.session_closed = true;
                }
                return Ok(());
            }
            _ => {}
        }

        self.monitor.sweep_expired(now_utc);

        let mut candidates = Vec::new();
        for strategy in &mut self.strategies {
            if strategy.active_phases().contains(&phase) {
                candidates.extend(strategy.evaluate(phase, &market, now_local));
            }
        }
        debug!(%phase, candidates = candidates.len(), "Strategies evaluated");

        let context = ScanContext::new(now_utc, phase, candidates, self.monitor.open_count());
        let result = self.pipeline.run(context)?;
        for signal in result.finals {
            self.monitor.register_signal(signal);
        }

        for event in self.monitor.check_positions(&market, now_utc) {
            match event {
                ExitEvent::Closed(closed) => self.send(SinkEvent::PositionClosed(closed)),
                ExitEvent::TargetAlert {
                    symbol,
                    price,
                    target,
                    ..
                } => self.send(SinkEvent::TargetAlert {
                    symbol,
                    price,
                    target,
                }),
            }
        }

        Ok(())
    }
}
