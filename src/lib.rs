//! # Intraday Signal Engine
//!
//! A real-time intraday equity scanner: ingests a live tick feed, evaluates
//! gap, opening-range, and VWAP-reversion strategies, ranks the candidates,
//! sizes them against a fixed capital budget, and manages confirmed
//! positions with a ratcheting trailing stop until square-off.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `feed`: Vendor tick stream (WebSocket) and reference data (REST)
//! - `market`: Shared in-memory market data store and derived indicators
//! - `strategy`: Per-symbol strategy state machines emitting candidates
//! - `pipeline`: Dedup -> score -> rank -> advisory -> size -> deliver
//! - `rank` / `risk`: Composite scoring and capital-aware sizing
//! - `exit`: Pending-signal registry and trailing-stop position monitor
//! - `advisory`: External stance overlay, refreshed off-cycle
//! - `persistence`: SQLite audit trail behind an async sink task
//! - `notify`: Operator-facing signal and exit notifications

pub mod advisory;
pub mod config;
pub mod engine;
pub mod exit;
pub mod feed;
pub mod market;
pub mod notify;
pub mod persistence;
pub mod pipeline;
pub mod rank;
pub mod risk;
pub mod signal;
pub mod strategy;
pub mod utils;

pub use config::Config;
