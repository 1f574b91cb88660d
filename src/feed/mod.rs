//! Market data ingestion.
//!
//! A producer task owns the vendor connections and folds each tick into the
//! shared market data store; the scan cycle only ever reads. Reconnects
//! with a flat delay; the session survives feed gaps, it just sees stale
//! ticks until the stream resumes.

mod reference;
mod websocket;

pub use reference::ReferenceClient;
pub use websocket::{FeedEvent, TickFeed, TickUpdate};

use crate::market::{MarketDataStore, Tick};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const RECONNECT_DELAY_SECS: u64 = 5;

/// Parse a raw vendor update into a typed tick. The exchange timestamp is
/// shifted from UTC into exchange-local wall clock, which is what every
/// session boundary in the config is expressed in.
pub fn to_tick(update: &TickUpdate, utc_offset_minutes: i64) -> Option<Tick> {
    let parse = |field: &str, value: &str| -> Option<Decimal> {
        match Decimal::from_str(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(symbol = %update.symbol, field, value, "Dropping malformed tick: {e}");
                None
            }
        }
    };
    let exchange_ts = DateTime::from_timestamp_millis(update.timestamp_ms)
        .map(|dt| (dt + Duration::minutes(utc_offset_minutes)).naive_utc())?;

    Some(Tick {
        symbol: update.symbol.clone(),
        ltp: parse("lp", &update.last_price)?,
        open: parse("o", &update.open)?,
        high: parse("h", &update.high)?,
        low: parse("l", &update.low)?,
        volume: parse("v", &update.day_volume)?,
        exchange_ts,
        received_at: Utc::now(),
    })
}

/// Fold one tick into every store concern it touches: last price, VWAP,
/// opening range (a no-op once locked), and the candle series.
pub fn ingest_tick(store: &MarketDataStore, tick: Tick) {
    store.update_vwap(&tick.symbol, tick.ltp, tick.volume);
    store.update_opening_range(&tick.symbol, tick.ltp);
    store.update_candle(&tick);
    store.update_tick(tick);
}

/// Feed producer loop: connect, drain events into the store, reconnect on
/// drop. Exits when the shutdown flag is set.
pub async fn run_feed(
    feed: TickFeed,
    store: Arc<MarketDataStore>,
    symbols: Vec<String>,
    utc_offset_minutes: i64,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let (tx, mut rx) = mpsc::channel(1024);
        if let Err(e) = feed.subscribe_ticks(&symbols, tx).await {
            error!("Feed connection failed: {e:#}");
            tokio::time::sleep(std::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
            continue;
        }

        while let Some(event) = rx.recv().await {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            match event {
                FeedEvent::Tick(update) => {
                    if let Some(tick) = to_tick(&update, utc_offset_minutes) {
                        ingest_tick(&store, tick);
                    }
                }
                FeedEvent::Connected => {
                    info!(symbols = symbols.len(), "Tick feed connected");
                }
                FeedEvent::Disconnected => {
                    warn!("Tick feed disconnected; reconnecting");
                    break;
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn update(symbol: &str, price: &str, volume: &str) -> TickUpdate {
        TickUpdate {
            symbol: symbol.to_string(),
            last_price: price.to_string(),
            open: "100".to_string(),
            high: "106".to_string(),
            low: "99".to_string(),
            day_volume: volume.to_string(),
            // 2026-03-02 04:30:00 UTC = 10:00:00 IST
            timestamp_ms: 1772425800000,
        }
    }

    #[test]
    fn test_to_tick_shifts_into_exchange_local_time() {
        let tick = to_tick(&update("RELIANCE", "104.5", "1000"), 330).unwrap();
        assert_eq!(tick.ltp, dec!(104.5));
        assert_eq!(
            tick.exchange_ts,
            chrono::NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_malformed_price_drops_the_tick() {
        assert!(to_tick(&update("RELIANCE", "not-a-price", "1000"), 330).is_none());
    }

    #[test]
    fn test_ingest_touches_every_concern() {
        let store = MarketDataStore::new(15);
        let tick = to_tick(&update("RELIANCE", "104.5", "1000"), 330).unwrap();
        ingest_tick(&store, tick);

        assert_eq!(store.tick("RELIANCE").unwrap().ltp, dec!(104.5));
        assert_eq!(store.vwap("RELIANCE"), Some(dec!(104.5)));
        assert_eq!(store.opening_range("RELIANCE").unwrap().high, dec!(104.5));
        assert!(store.current_candle("RELIANCE").is_some());
    }

    #[test]
    fn test_ingest_respects_locked_opening_range() {
        let store = MarketDataStore::new(15);
        ingest_tick(&store, to_tick(&update("RELIANCE", "104.5", "1000"), 330).unwrap());
        store.lock_opening_ranges();
        ingest_tick(&store, to_tick(&update("RELIANCE", "110", "2000"), 330).unwrap());

        assert_eq!(store.opening_range("RELIANCE").unwrap().high, dec!(104.5));
        assert_eq!(store.tick("RELIANCE").unwrap().ltp, dec!(110));
    }
}
