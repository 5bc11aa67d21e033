//! Sentiment indicator sources
//!
//! - Fear & Greed: CNN graph data
//! - Market cap dominance: CoinGecko `/global`
//! - TOTAL3 (crypto market cap excluding BTC and ETH): TradingView scanner

use super::quote_provider::ProviderError;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FEAR_GREED_URL: &str = "https://production.dataviz.cnn.io/index/fearandgreed/graphdata";
pub const DEFAULT_DOMINANCE_URL: &str = "https://api.coingecko.com/api/v3/global";
pub const DEFAULT_TOTAL3_URL: &str = "https://scanner.tradingview.com/global/scan";

const TOTAL3_TICKER: &str = "CRYPTOCAP:TOTAL3";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FearGreedReading {
    pub score: Option<Value>,
    pub rating: Option<String>,
}

/// Market cap share in percent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DominanceReading {
    pub btc: Option<f64>,
    pub eth: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Total3Reading {
    pub market_cap: Option<f64>,
    pub change_percent: Option<f64>,
}

#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn fear_greed(&self) -> Result<FearGreedReading, ProviderError>;

    async fn dominance(&self) -> Result<DominanceReading, ProviderError>;

    async fn total3(&self) -> Result<Total3Reading, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct IndicatorEndpoints {
    pub fear_greed_url: String,
    pub dominance_url: String,
    pub total3_url: String,
}

impl Default for IndicatorEndpoints {
    fn default() -> Self {
        Self {
            fear_greed_url: DEFAULT_FEAR_GREED_URL.to_string(),
            dominance_url: DEFAULT_DOMINANCE_URL.to_string(),
            total3_url: DEFAULT_TOTAL3_URL.to_string(),
        }
    }
}

pub struct IndicatorClient {
    client: Client,
    endpoints: IndicatorEndpoints,
}

impl IndicatorClient {
    pub fn new(endpoints: IndicatorEndpoints) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, endpoints })
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        provider: &str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(provider, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: provider.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider: provider.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(provider, e))?;
        serde_json::from_str(&body).map_err(|e| ProviderError::decode(provider, e.to_string()))
    }
}

#[async_trait]
impl IndicatorSource for IndicatorClient {
    async fn fear_greed(&self) -> Result<FearGreedReading, ProviderError> {
        debug!("Fetching Fear & Greed index");
        let request = self
            .client
            .get(&self.endpoints.fear_greed_url)
            .header(header::ACCEPT, "application/json, text/plain, */*")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(header::ORIGIN, "https://www.cnn.com")
            .header(header::REFERER, "https://www.cnn.com/");
        let body: FearGreedResponse = self.fetch_json("CNN", request).await?;
        Ok(body.into_reading())
    }

    async fn dominance(&self) -> Result<DominanceReading, ProviderError> {
        debug!("Fetching market cap dominance");
        let request = self.client.get(&self.endpoints.dominance_url);
        let body: GlobalResponse = self.fetch_json("CoinGecko", request).await?;
        Ok(body.into_reading())
    }

    async fn total3(&self) -> Result<Total3Reading, ProviderError> {
        debug!("Fetching TOTAL3");
        let request = self.client.post(&self.endpoints.total3_url).json(&json!({
            "symbols": { "tickers": [TOTAL3_TICKER], "query": { "types": [] } },
            "columns": ["close", "change"]
        }));
        let body: ScanResponse = self.fetch_json("TradingView", request).await?;
        body.into_reading()
    }
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct FearGreedResponse {
    #[serde(default)]
    fear_and_greed: Option<FearGreedBody>,
}

#[derive(Debug, Default, Deserialize)]
struct FearGreedBody {
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    rating: Option<String>,
}

impl FearGreedResponse {
    fn into_reading(self) -> FearGreedReading {
        let body = self.fear_and_greed.unwrap_or_default();
        FearGreedReading {
            score: body.score,
            rating: body.rating,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GlobalResponse {
    #[serde(default)]
    data: Option<GlobalData>,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalData {
    #[serde(default)]
    market_cap_percentage: Option<std::collections::HashMap<String, f64>>,
}

impl GlobalResponse {
    fn into_reading(self) -> DominanceReading {
        let shares = self
            .data
            .and_then(|d| d.market_cap_percentage)
            .unwrap_or_default();
        DominanceReading {
            btc: shares.get("btc").copied(),
            eth: shares.get("eth").copied(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default)]
    data: Vec<ScanRow>,
}

#[derive(Debug, Deserialize)]
struct ScanRow {
    s: String,
    #[serde(default)]
    d: Vec<Option<f64>>,
}

impl ScanResponse {
    fn into_reading(self) -> Result<Total3Reading, ProviderError> {
        let row = self
            .data
            .into_iter()
            .find(|row| row.s == TOTAL3_TICKER)
            .ok_or_else(|| ProviderError::NotFound {
                symbol: TOTAL3_TICKER.to_string(),
            })?;
        Ok(Total3Reading {
            market_cap: row.d.first().copied().flatten(),
            change_percent: row.d.get(1).copied().flatten(),
        })
    }
}
