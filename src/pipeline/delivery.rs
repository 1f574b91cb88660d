//! Delivery stage.

use super::{ScanContext, ScanStage};
use crate::persistence::SinkEvent;
use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

/// Terminal stage: hands finals and suppressions to the sink task. Removes
/// nothing from the context; a full sink failure still leaves the cycle
/// result intact for the engine.
pub struct DeliveryStage {
    sink: UnboundedSender<SinkEvent>,
}

impl DeliveryStage {
    pub fn new(sink: UnboundedSender<SinkEvent>) -> Self {
        Self { sink }
    }

    fn send(&self, event: SinkEvent) {
        if self.sink.send(event).is_err() {
            error!("Sink channel closed; event dropped");
        }
    }
}

impl ScanStage for DeliveryStage {
    fn name(&self) -> &'static str {
        "delivery"
    }

    fn process(&self, context: ScanContext) -> Result<ScanContext> {
        for signal in &context.finals {
            info!(
                id = %signal.id(),
                symbol = %signal.symbol(),
                rank = signal.ranked.rank,
                strength = signal.ranked.strength,
                quantity = signal.quantity,
                "Signal delivered"
            );
            self.send(SinkEvent::Signal(signal.clone()));
        }
        for suppressed in &context.suppressed {
            self.send(SinkEvent::Suppressed(suppressed.clone()));
        }
        Ok(context)
    }
}
