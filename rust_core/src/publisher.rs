//! Group fetch-and-publish pipeline.
//!
//! One cycle per asset group: fetch every symbol serially, shape the raw
//! fields into the group's quote, then publish the batch on the group channel
//! and persist it as the group snapshot. A batch with no successful symbol
//! is neither published nor persisted.
//!
//! Per-symbol failures are absorbed here (logged, counted by the governor,
//! skipped). Batch-level provider failures and store failures propagate to
//! the calling loop.

use crate::clients::{QuoteProvider, RawQuote};
use crate::governor::{GovernorConfig, PacingJitter, RetryGovernor};
use crate::models::{AssetClass, Batch, CryptoQuote, ForexQuote, IndexQuote, Quote, StockQuote};
use crate::redis::MarketStore;
use crate::universe::SymbolUniverse;
use crate::utils::{format_market_cap, format_number};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const REGULAR_SESSION: &str = "REGULAR";
const PRE_MARKET: &str = "PRE";
const UNKNOWN_STATE: &str = "UNKNOWN";

pub struct MarketPublisher {
    provider: Arc<dyn QuoteProvider>,
    store: Arc<dyn MarketStore>,
    governor: RetryGovernor,
    pacing: PacingJitter,
}

impl MarketPublisher {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        store: Arc<dyn MarketStore>,
        governor: GovernorConfig,
        pacing: PacingJitter,
    ) -> Self {
        Self {
            provider,
            store,
            governor: RetryGovernor::new(governor),
            pacing,
        }
    }

    pub fn governor(&self) -> &RetryGovernor {
        &self.governor
    }

    /// Fetch, shape, publish and persist one asset group.
    ///
    /// Returns the number of symbols in the published batch.
    pub async fn process_group(&mut self, symbols: &[String], asset_class: AssetClass) -> Result<usize> {
        info!("Starting {} data collection...", asset_class);
        let started = Instant::now();

        let mut batch = Batch::new();
        for symbol in symbols {
            let raw = match self.provider.get_quote(symbol).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        "Failed to fetch {} {} from {}: {}",
                        asset_class,
                        symbol,
                        self.provider.provider_name(),
                        e
                    );
                    self.governor.on_failure().await;
                    continue;
                }
            };

            self.governor.record_success();
            self.pacing.pause().await;
            batch.insert(symbol.clone(), shape_quote(asset_class, &raw));
        }

        let published = self.publish_batch(asset_class, &batch).await?;
        info!(
            "{} data published ({} symbols). Took {:.2} seconds",
            asset_class,
            published,
            started.elapsed().as_secs_f64()
        );
        Ok(published)
    }

    /// Forex goes out as one multi-symbol request, without per-symbol pacing.
    pub async fn process_forex(&mut self, symbols: &[String]) -> Result<usize> {
        info!("Starting {} data collection...", AssetClass::Forex);
        let started = Instant::now();

        let quotes = self
            .provider
            .get_quotes(symbols)
            .await
            .with_context(|| {
                format!("Forex batch fetch from {} failed", self.provider.provider_name())
            })?;

        let mut batch = Batch::new();
        for symbol in symbols {
            match quotes.get(symbol) {
                Some(raw) => {
                    batch.insert(symbol.clone(), shape_quote(AssetClass::Forex, raw));
                }
                None => debug!("{} missing from forex batch response", symbol),
            }
        }

        let published = self.publish_batch(AssetClass::Forex, &batch).await?;
        info!(
            "{} data published ({} symbols). Took {:.2} seconds",
            AssetClass::Forex,
            published,
            started.elapsed().as_secs_f64()
        );
        Ok(published)
    }

    /// Index, stock, crypto, then forex, back to back.
    pub async fn publish_all_markets(&mut self, universe: &SymbolUniverse) -> Result<()> {
        for asset_class in AssetClass::ALL {
            let symbols = universe.symbols(asset_class);
            match asset_class {
                AssetClass::Forex => self.process_forex(symbols).await?,
                AssetClass::Index | AssetClass::Stock | AssetClass::Crypto => {
                    self.process_group(symbols, asset_class).await?
                }
            };
        }
        info!("All market data published successfully");
        Ok(())
    }

    async fn publish_batch(&self, asset_class: AssetClass, batch: &Batch) -> Result<usize> {
        if batch.is_empty() {
            warn!("No {} quotes fetched this cycle, nothing published", asset_class);
            return Ok(0);
        }
        publish_snapshot(
            self.store.as_ref(),
            asset_class.channel(),
            &asset_class.snapshot_key(),
            batch,
        )
        .await?;
        Ok(batch.len())
    }
}

/// Publish `payload` as JSON on `channel`, then persist the same bytes at `key`.
pub async fn publish_snapshot<T: Serialize + ?Sized>(
    store: &dyn MarketStore,
    channel: &str,
    key: &str,
    payload: &T,
) -> Result<()> {
    let json = serde_json::to_string(payload).context("Failed to serialize snapshot")?;
    store
        .publish(channel, &json)
        .await
        .with_context(|| format!("Failed to publish on {}", channel))?;
    store
        .set(key, &json)
        .await
        .with_context(|| format!("Failed to persist {}", key))?;
    Ok(())
}

/// Map raw upstream fields onto the group's quote shape
pub fn shape_quote(asset_class: AssetClass, raw: &RawQuote) -> Quote {
    let change = format_number(&raw.regular_market_change);
    let change_percent = format_number(&raw.regular_market_change_percent);

    match asset_class {
        AssetClass::Index => Quote::Index(IndexQuote {
            current_value: format_number(&raw.regular_market_price),
            change,
            change_percent,
        }),
        AssetClass::Stock => Quote::Stock(StockQuote {
            current_price: format_number(&raw.regular_market_price),
            market_cap: format_market_cap(&raw.market_cap),
            change,
            change_percent,
            market_state: raw
                .market_state
                .clone()
                .unwrap_or_else(|| UNKNOWN_STATE.to_string()),
            otc_price: off_hours_price(raw),
        }),
        AssetClass::Crypto => Quote::Crypto(CryptoQuote {
            current_price: format_number(&raw.regular_market_price),
            market_cap: format_market_cap(&raw.market_cap),
            change,
            change_percent,
        }),
        AssetClass::Forex => Quote::Forex(ForexQuote {
            rate: format_number(&raw.regular_market_price),
            change,
            change_percent,
        }),
    }
}

/// Pre-market price during `PRE`, post-market price in any other
/// non-regular state, nothing during the regular session.
fn off_hours_price(raw: &RawQuote) -> Option<String> {
    let state = raw.market_state.as_deref()?;
    if state == REGULAR_SESSION {
        return None;
    }
    let price = if state == PRE_MARKET {
        &raw.pre_market_price
    } else {
        &raw.post_market_price
    };
    Some(format_number(price))
}
