//! Scan-cycle engine.
//!
//! Owns the session clock, the strategy set, the pipeline, and the exit
//! monitor, and drives one full scan per tick of the main loop.

mod clock;
mod scan;

pub use clock::{BoundaryEvent, SessionClock};
pub use scan::ScanEngine;
