//! Quote Provider Trait
//!
//! Defines the fetch capability the publishing pipeline depends on: single
//! quote, multi-symbol quote and multi-symbol daily close history. Every
//! failure comes back as a [`ProviderError`]; callers treat all variants the
//! same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Raw upstream quote fields, loosely typed as delivered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuote {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub regular_market_price: Option<Value>,
    #[serde(default)]
    pub regular_market_change: Option<Value>,
    #[serde(default)]
    pub regular_market_change_percent: Option<Value>,
    #[serde(default)]
    pub market_cap: Option<Value>,
    /// `PRE`, `REGULAR`, `POST`, `CLOSED`, ...
    #[serde(default)]
    pub market_state: Option<String>,
    #[serde(default)]
    pub pre_market_price: Option<Value>,
    #[serde(default)]
    pub post_market_price: Option<Value>,
}

/// One daily bar's close; `None` when the provider has no value for that day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub timestamp: DateTime<Utc>,
    pub close: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} rate limited the request")]
    RateLimited { provider: String },

    #[error("{provider} API error: {status} - {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Failed to reach {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse {provider} response: {message}")]
    Decode { provider: String, message: String },

    #[error("Symbol not found: {symbol}")]
    NotFound { symbol: String },
}

impl ProviderError {
    pub fn decode(provider: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn transport(provider: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            source,
        }
    }
}

/// Market data capability used by the publisher and the chart job
///
/// Implementations must be Send + Sync for use across spawned loops.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider display name for logs
    fn provider_name(&self) -> &str;

    /// Current quote for one symbol
    async fn get_quote(&self, symbol: &str) -> Result<RawQuote, ProviderError>;

    /// Current quotes for several symbols in one request
    ///
    /// Symbols the provider does not know are absent from the map.
    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, RawQuote>, ProviderError>;

    /// Daily closes covering the last `days` calendar days, oldest first
    async fn get_daily_closes(
        &self,
        symbols: &[String],
        days: u32,
    ) -> Result<HashMap<String, Vec<DailyClose>>, ProviderError>;
}
