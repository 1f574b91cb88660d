//! Scan-cycle pipeline.
//!
//! Candidates from the strategies flow through a fixed ordered chain:
//! dedup -> scoring -> ranking -> advisory -> sizing -> delivery. Every
//! stage either carries a candidate forward or moves it into the suppressed
//! list with a reason; nothing is ever silently dropped between stages.

mod advisory;
mod dedup;
mod delivery;
mod scoring;
mod sizing;

pub use advisory::AdvisoryStage;
pub use dedup::DedupStage;
pub use delivery::DeliveryStage;
pub use scoring::{RankingStage, ScoringStage};
pub use sizing::SizingStage;

use crate::advisory::AdvisoryCache;
use crate::config::Config;
use crate::persistence::SinkEvent;
use crate::signal::{CandidateSignal, FinalSignal, RankedSignal, SuppressedSignal};
use crate::strategy::SessionPhase;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Mutable state threaded through the stages of one scan cycle.
#[derive(Debug)]
pub struct ScanContext {
    pub cycle_at: DateTime<Utc>,
    pub phase: SessionPhase,
    pub candidates: Vec<CandidateSignal>,
    pub ranked: Vec<RankedSignal>,
    pub finals: Vec<FinalSignal>,
    pub suppressed: Vec<SuppressedSignal>,
    /// Open positions at cycle start; consumed by the sizing stage
    pub open_positions: usize,
}

impl ScanContext {
    pub fn new(
        cycle_at: DateTime<Utc>,
        phase: SessionPhase,
        candidates: Vec<CandidateSignal>,
        open_positions: usize,
    ) -> Self {
        Self {
            cycle_at,
            phase,
            candidates,
            ranked: Vec::new(),
            finals: Vec::new(),
            suppressed: Vec::new(),
            open_positions,
        }
    }
}

/// One pipeline stage. Stages own their dependencies and are immutable per
/// cycle; all per-cycle state lives in the context.
pub trait ScanStage: Send {
    fn name(&self) -> &'static str;

    fn process(&self, context: ScanContext) -> Result<ScanContext>;
}

/// Ordered stage chain for one scan cycle.
pub struct ScanPipeline {
    stages: Vec<Box<dyn ScanStage>>,
}

impl ScanPipeline {
    pub fn new(stages: Vec<Box<dyn ScanStage>>) -> Self {
        Self { stages }
    }

    /// The production chain, wired from config.
    pub fn standard(
        config: &Config,
        advisory_cache: Arc<AdvisoryCache>,
        sink: UnboundedSender<SinkEvent>,
    ) -> Self {
        Self::new(vec![
            Box::new(DedupStage::new(config.scoring.strategy_priority.clone())),
            Box::new(ScoringStage::new(&config.scoring)),
            Box::new(RankingStage::new(config.scoring.max_signals)),
            Box::new(AdvisoryStage::new(advisory_cache, config.advisory.enabled)),
            Box::new(SizingStage::new(config.sizing.clone())),
            Box::new(DeliveryStage::new(sink)),
        ])
    }

    pub fn run(&self, mut context: ScanContext) -> Result<ScanContext> {
        for stage in &self.stages {
            context = stage.process(context)?;
            debug!(
                stage = stage.name(),
                candidates = context.candidates.len(),
                ranked = context.ranked.len(),
                finals = context.finals.len(),
                suppressed = context.suppressed.len(),
                "Stage complete"
            );
        }
        Ok(context)
    }
}
