//! Vendor WebSocket client for the real-time tick stream.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

/// Feed event types.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Tick update for a subscribed symbol
    Tick(TickUpdate),
    /// Connection established
    Connected,
    /// Connection lost
    Disconnected,
}

/// Raw tick as the vendor sends it. Prices and volume arrive as strings;
/// parsing into `Decimal` happens at ingest so a malformed field drops one
/// tick instead of poisoning the stream.
#[derive(Debug, Clone, Deserialize)]
pub struct TickUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "lp")]
    pub last_price: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub day_volume: String,
    /// Exchange timestamp, epoch milliseconds UTC
    #[serde(rename = "t")]
    pub timestamp_ms: i64,
}

/// WebSocket client for the vendor tick stream.
pub struct TickFeed {
    url: String,
}

impl TickFeed {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    /// Connect and stream tick updates for the given symbols into `tx`.
    ///
    /// The subscription rides on the URL; the stream is read-only from our
    /// side, so the write half is dropped after the split. Returns once the
    /// reader task is spawned.
    pub async fn subscribe_ticks(
        &self,
        symbols: &[String],
        tx: mpsc::Sender<FeedEvent>,
    ) -> Result<()> {
        let streams: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let url = format!("{}?symbols={}", self.url, streams.join(","));
        info!("Connecting to tick stream: {url}");

        let (ws_stream, _) = connect_async(&url)
            .await
            .context("Failed to connect to tick stream")?;
        let (_, mut read) = ws_stream.split();

        let _ = tx.send(FeedEvent::Connected).await;

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        for event in parse_frame(&text) {
                            if tx.send(event).await.is_err() {
                                warn!("Feed receiver dropped; stopping reader");
                                return;
                            }
                        }
                    }
                    Ok(Message::Ping(_)) => {
                        // tungstenite answers pings itself
                    }
                    Ok(Message::Close(_)) => {
                        info!("Tick stream closed by vendor");
                        let _ = tx.send(FeedEvent::Disconnected).await;
                        return;
                    }
                    Err(e) => {
                        error!("Tick stream error: {e}");
                        let _ = tx.send(FeedEvent::Disconnected).await;
                        return;
                    }
                    _ => {}
                }
            }
        });

        Ok(())
    }
}

/// A text frame carries either a single update or a batch of them.
fn parse_frame(raw: &str) -> Vec<FeedEvent> {
    if let Ok(update) = serde_json::from_str::<TickUpdate>(raw) {
        vec![FeedEvent::Tick(update)]
    } else if let Ok(updates) = serde_json::from_str::<Vec<TickUpdate>>(raw) {
        updates.into_iter().map(FeedEvent::Tick).collect()
    } else {
        warn!("Unparseable feed frame dropped");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_update_deserializes_vendor_payload() {
        let json = r#"{"s":"RELIANCE","lp":"2850.55","o":"2840.00","h":"2861.10","l":"2833.25","v":"1250000","t":1772438400000}"#;
        let update: TickUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.symbol, "RELIANCE");
        assert_eq!(update.last_price, "2850.55");
        assert_eq!(update.timestamp_ms, 1772438400000);
    }

    #[test]
    fn test_parse_frame_handles_single_batch_and_garbage() {
        let single = r#"{"s":"TCS","lp":"3500","o":"3490","h":"3510","l":"3480","v":"50000","t":1772438400000}"#;
        assert_eq!(parse_frame(single).len(), 1);

        let batch = format!("[{single},{single}]");
        assert_eq!(parse_frame(&batch).len(), 2);

        assert!(parse_frame("not json").is_empty());
    }
}
