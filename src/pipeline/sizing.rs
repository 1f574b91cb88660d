//! Sizing stage.

use super::{ScanContext, ScanStage};
use crate::config::SizingConfig;
use crate::risk::RiskSizer;
use anyhow::Result;

/// Converts the ranked list into sized, expiry-stamped final signals
/// against the open-position budget captured at cycle start.
pub struct SizingStage {
    sizer: RiskSizer,
}

impl SizingStage {
    pub fn new(config: SizingConfig) -> Self {
        Self {
            sizer: RiskSizer::new(config),
        }
    }
}

impl ScanStage for SizingStage {
    fn name(&self) -> &'static str {
        "sizing"
    }

    fn process(&self, mut context: ScanContext) -> Result<ScanContext> {
        let ranked = std::mem::take(&mut context.ranked);
        let (finals, suppressed) = self.sizer.filter_and_size(ranked, context.open_positions);
        context.finals = finals;
        context.suppressed.extend(suppressed);
        Ok(context)
    }
}
