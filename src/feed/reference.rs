//! Previous-session reference data over REST.

use crate::market::{HistoricalReference, MarketDataStore};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ReferenceEntry {
    symbol: String,
    prev_close: Decimal,
    prev_high: Decimal,
    avg_daily_volume: Decimal,
}

/// REST client for the vendor's previous-session endpoint. Fetched once at
/// startup; the values are immutable for the session.
pub struct ReferenceClient {
    client: reqwest::Client,
    url: String,
}

impl ReferenceClient {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub async fn fetch(&self, symbols: &[String]) -> Result<HashMap<String, HistoricalReference>> {
        let entries = self
            .client
            .get(&self.url)
            .query(&[("symbols", symbols.join(","))])
            .send()
            .await
            .context("Reference data request failed")?
            .error_for_status()?
            .json::<Vec<ReferenceEntry>>()
            .await
            .context("Malformed reference data response")?;

        Ok(entries
            .into_iter()
            .map(|e| {
                (
                    e.symbol,
                    HistoricalReference {
                        prev_close: e.prev_close,
                        prev_high: e.prev_high,
                        avg_daily_volume: e.avg_daily_volume,
                    },
                )
            })
            .collect())
    }

    /// Fetch and seed the store. Symbols absent from the response simply
    /// stay unseeded; strategies that need them skip those symbols.
    pub async fn seed(&self, store: &MarketDataStore, symbols: &[String]) -> Result<usize> {
        let references = self.fetch(symbols).await?;
        let seeded = references.len();
        for (symbol, reference) in references {
            store.seed_historical(&symbol, reference);
        }
        info!(seeded, requested = symbols.len(), "Historical references seeded");
        Ok(seeded)
    }
}
