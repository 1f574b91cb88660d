//! Operator notifications.
//!
//! Signals and exits are advisory output for a human, not order flow. The
//! default notifier writes to the structured log; other transports plug in
//! behind the same trait.

use tracing::info;

pub trait Notifier: Send {
    fn deliver(&self, message: &str);
}

/// Notifier that emits through the tracing pipeline.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, message: &str) {
        info!("📣 {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct CapturingNotifier(Arc<Mutex<Vec<String>>>);

    impl Notifier for CapturingNotifier {
        fn deliver(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn test_trait_object_dispatch() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let notifier: Box<dyn Notifier> = Box::new(CapturingNotifier(captured.clone()));
        notifier.deliver("SIGNAL RELIANCE LONG");
        assert_eq!(captured.lock().unwrap().as_slice(), ["SIGNAL RELIANCE LONG"]);
    }
}
