//! Market data: live ticks, historical references, and derived intraday
//! indicators (opening range, VWAP, fixed-width candles).

mod candle;
mod store;
mod types;

pub use candle::{bucket_start, CandleSeries};
pub use store::{MarketDataStore, MarketView};
pub use types::{Candle, HistoricalReference, OpeningRange, Tick, VwapState};
