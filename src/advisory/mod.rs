//! Advisory overlay cache.
//!
//! External sentiment-style input for the pipeline's advisory stage. The
//! cache is refreshed on its own cadence by a background task so the scan
//! cycle never blocks on network I/O; a cache miss means "no information".

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Advisory stance for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Bullish,
    Neutral,
    Bearish,
}

/// Shared read-mostly stance cache. Written only by the refresh task,
/// consulted by the advisory pipeline stage.
#[derive(Default)]
pub struct AdvisoryCache {
    stances: RwLock<HashMap<String, Stance>>,
}

impl AdvisoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the symbol has no cached stance; callers must treat this
    /// as "no information", not as neutral-bearish.
    pub fn stance(&self, symbol: &str) -> Option<Stance> {
        self.stances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(symbol)
            .copied()
    }

    /// Atomically replace the whole cache with a fresh fetch.
    pub fn replace(&self, stances: HashMap<String, Stance>) {
        *self
            .stances
            .write()
            .unwrap_or_else(PoisonError::into_inner) = stances;
    }

    pub fn len(&self) -> usize {
        self.stances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of advisory stances, fetched out-of-band from the scan cycle.
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<HashMap<String, Stance>>;
}

/// REST-backed advisory source returning a JSON `{symbol: stance}` map.
pub struct HttpAdvisorySource {
    client: reqwest::Client,
    url: String,
}

impl HttpAdvisorySource {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl AdvisorySource for HttpAdvisorySource {
    async fn fetch(&self) -> anyhow::Result<HashMap<String, Stance>> {
        let stances = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<HashMap<String, Stance>>()
            .await?;
        Ok(stances)
    }
}

/// Refresh loop: replaces the cache on success, keeps the stale cache on
/// failure. Runs until the process shuts down.
pub async fn run_refresh(
    cache: Arc<AdvisoryCache>,
    source: Box<dyn AdvisorySource>,
    refresh_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
    loop {
        interval.tick().await;
        match source.fetch().await {
            Ok(stances) => {
                debug!(symbols = stances.len(), "Advisory cache refreshed");
                cache.replace(stances);
            }
            Err(e) => {
                warn!("Advisory refresh failed, keeping stale cache: {e:#}");
            }
        }
    }
}
