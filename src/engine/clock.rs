//! Session clock.

use crate::config::SessionConfig;
use crate::strategy::SessionPhase;
use chrono::NaiveTime;
use tracing::info;

/// One-shot session boundary crossings the engine must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryEvent {
    /// Opening-range window ended; freeze the ranges
    LockOpeningRanges,
    /// Square-off time; force-close every open position
    SquareOff,
}

/// Maps exchange-local wall clock onto session phases and fires each
/// boundary event exactly once per session.
pub struct SessionClock {
    config: SessionConfig,
    range_lock_fired: bool,
    square_off_fired: bool,
}

impl SessionClock {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            range_lock_fired: false,
            square_off_fired: false,
        }
    }

    pub fn phase(&self, now: NaiveTime) -> SessionPhase {
        if now < self.config.open {
            SessionPhase::PreOpen
        } else if now < self.config.midsession_start {
            SessionPhase::OpeningDrive
        } else if now < self.config.late_start {
            SessionPhase::MidSession
        } else if now < self.config.close {
            SessionPhase::LateSession
        } else {
            SessionPhase::Closed
        }
    }

    /// Boundary events that have come due since the last poll. Starting the
    /// process mid-session fires the already-passed boundaries immediately.
    pub fn poll_boundaries(&mut self, now: NaiveTime) -> Vec<BoundaryEvent> {
        let mut events = Vec::new();
        if !self.range_lock_fired && now >= self.config.opening_range_lock {
            self.range_lock_fired = true;
            info!(at = %self.config.opening_range_lock, "Opening-range lock boundary reached");
            events.push(BoundaryEvent::LockOpeningRanges);
        }
        if !self.square_off_fired && now >= self.config.square_off {
            self.square_off_fired = true;
            info!(at = %self.config.square_off, "Square-off boundary reached");
            events.push(BoundaryEvent::SquareOff);
        }
        events
    }

    /// Re-arm the boundaries for the next session.
    pub fn reset(&mut self) {
        self.range_lock_fired = false;
        self.square_off_fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn clock() -> SessionClock {
        SessionClock::new(SessionConfig::default())
    }

    #[test]
    fn test_phase_boundaries() {
        let c = clock();
        assert_eq!(c.phase(t(9, 0)), SessionPhase::PreOpen);
        assert_eq!(c.phase(t(9, 15)), SessionPhase::OpeningDrive);
        assert_eq!(c.phase(t(10, 59)), SessionPhase::OpeningDrive);
        assert_eq!(c.phase(t(11, 0)), SessionPhase::MidSession);
        assert_eq!(c.phase(t(14, 0)), SessionPhase::LateSession);
        assert_eq!(c.phase(t(15, 30)), SessionPhase::Closed);
    }

    #[test]
    fn test_boundaries_fire_once() {
        let mut c = clock();
        assert!(c.poll_boundaries(t(9, 20)).is_empty());
        assert_eq!(c.poll_boundaries(t(9, 30)), vec![BoundaryEvent::LockOpeningRanges]);
        assert!(c.poll_boundaries(t(9, 31)).is_empty());
        assert_eq!(c.poll_boundaries(t(15, 10)), vec![BoundaryEvent::SquareOff]);
        assert!(c.poll_boundaries(t(15, 11)).is_empty());
    }

    #[test]
    fn test_midsession_start_fires_missed_boundaries() {
        let mut c = clock();
        assert_eq!(
            c.poll_boundaries(t(12, 0)),
            vec![BoundaryEvent::LockOpeningRanges]
        );
    }

    #[test]
    fn test_reset_rearms() {
        let mut c = clock();
        c.poll_boundaries(t(15, 20));
        c.reset();
        assert_eq!(
            c.poll_boundaries(t(9, 30)),
            vec![BoundaryEvent::LockOpeningRanges]
        );
    }
}
