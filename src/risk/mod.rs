//! Risk-based position sizing.

mod sizer;

pub use sizer::{RiskSizer, SizedOrder};
