//! Sentiment indicator publishing.
//!
//! Each indicator is fetched on its own, wrapped as a one-entry mapping
//! `symbol -> quote`, published on its asset-class channel and persisted under
//! `snapshot.<indicator>`.
//!
//! TOTAL3's share of the crypto market is derived from the BTC/ETH dominance
//! fetched earlier in the same cycle. When no dominance reading is cached the
//! share degrades to `0.00` instead of failing the cycle.

use crate::clients::{DominanceReading, IndicatorSource};
use crate::models::{DominanceQuote, FearGreedQuote, Indicator, Quote, Total3Quote};
use crate::publisher::publish_snapshot;
use crate::redis::MarketStore;
use crate::utils::{format_market_cap, format_number};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct IndicatorPublisher {
    source: Arc<dyn IndicatorSource>,
    store: Arc<dyn MarketStore>,
    /// Last dominance reading, consumed by TOTAL3
    last_dominance: RwLock<Option<DominanceReading>>,
}

impl IndicatorPublisher {
    pub fn new(source: Arc<dyn IndicatorSource>, store: Arc<dyn MarketStore>) -> Self {
        Self {
            source,
            store,
            last_dominance: RwLock::new(None),
        }
    }

    /// Fetch, publish and persist one indicator
    pub async fn publish(&self, indicator: Indicator) -> Result<Quote> {
        let quote = self
            .fetch(indicator)
            .await
            .with_context(|| format!("Failed to fetch {}", indicator))?;

        let mut payload = BTreeMap::new();
        payload.insert(indicator.symbol(), &quote);

        publish_snapshot(
            self.store.as_ref(),
            indicator.channel(),
            &indicator.snapshot_key(),
            &payload,
        )
        .await?;

        info!("{} published successfully", indicator);
        Ok(quote)
    }

    async fn fetch(&self, indicator: Indicator) -> Result<Quote> {
        let quote = match indicator {
            Indicator::FearGreed => {
                let reading = self.source.fear_greed().await?;
                Quote::FearGreed(FearGreedQuote {
                    score: format_number(&reading.score),
                    rating: title_case(reading.rating.as_deref().unwrap_or("Unknown")),
                })
            }
            Indicator::BtcDominance => {
                let reading = self.source.dominance().await?;
                *self.last_dominance.write() = Some(reading);
                Quote::Dominance(DominanceQuote {
                    value: format_number(&reading.btc),
                })
            }
            Indicator::Total3 => {
                let reading = self.source.total3().await?;
                Quote::Total3(Total3Quote {
                    market_cap: format_market_cap(&reading.market_cap),
                    change_percent: format_number(&reading.change_percent),
                    share: self.total3_share(),
                })
            }
        };
        Ok(quote)
    }

    fn total3_share(&self) -> String {
        match *self.last_dominance.read() {
            Some(DominanceReading { btc, eth }) => {
                let btc = btc.unwrap_or(0.0);
                let eth = eth.unwrap_or(0.0);
                format_number(&(100.0 - btc - eth))
            }
            None => {
                warn!("No dominance reading cached yet, TOTAL3 share defaults to 0.00");
                format_number(&0.0)
            }
        }
    }
}

/// `"extreme fear"` -> `"Extreme Fear"`
fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
