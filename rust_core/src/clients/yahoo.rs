//! Yahoo Finance API Client
//!
//! Quotes come from the `/v7/finance/quote` endpoint (several symbols per
//! request), daily closes from `/v8/finance/chart/{symbol}`.
//!
//! The quote endpoint only answers sessions that carry Yahoo's consent
//! cookie and the matching crumb, so the client keeps a cookie jar and
//! fetches a crumb before the first quote request. The crumb is cached for
//! an hour and refreshed once when Yahoo answers 401.

use super::quote_provider::{DailyClose, ProviderError, QuoteProvider, RawQuote};
use crate::governor::PacingJitter;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::header::REFERER;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

const PROVIDER: &str = "Yahoo";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FINANCE_REFERER: &str = "https://finance.yahoo.com/";
const CRUMB_TTL: Duration = Duration::from_secs(3600);

/// Where the client talks to Yahoo
#[derive(Debug, Clone)]
pub struct YahooEndpoints {
    /// Host of the quote, chart and crumb APIs
    pub base_url: String,
    /// Page that hands out the session cookie
    pub cookie_url: String,
}

impl Default for YahooEndpoints {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            cookie_url: DEFAULT_YAHOO_COOKIE_URL.to_string(),
        }
    }
}

struct Crumb {
    value: String,
    fetched_at: Instant,
}

pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    /// Held across a refresh so concurrent callers wait for one handshake
    crumb: Mutex<Option<Crumb>>,
    /// Pause between per-symbol chart requests
    history_pacing: PacingJitter,
}

impl YahooClient {
    pub fn new(endpoints: YahooEndpoints, history_pacing: PacingJitter) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: endpoints.base_url.trim_end_matches('/').to_string(),
            cookie_url: endpoints.cookie_url,
            crumb: Mutex::new(None),
            history_pacing,
        })
    }

    /// Cached crumb, running the cookie handshake when missing or stale
    async fn crumb(&self) -> Result<String, ProviderError> {
        let mut slot = self.crumb.lock().await;
        if let Some(crumb) = slot.as_ref() {
            if crumb.fetched_at.elapsed() < CRUMB_TTL {
                return Ok(crumb.value.clone());
            }
        }

        let value = self.refresh_crumb().await?;
        *slot = Some(Crumb {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    async fn invalidate_crumb(&self) {
        *self.crumb.lock().await = None;
    }

    async fn refresh_crumb(&self) -> Result<String, ProviderError> {
        // The cookie page answers 404 but still sets the session cookie
        self.client
            .get(&self.cookie_url)
            .header(REFERER, FINANCE_REFERER)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .header(REFERER, FINANCE_REFERER)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        let body = read_body(response).await?;
        let crumb = body.trim();
        if !is_valid_crumb(crumb) {
            return Err(ProviderError::decode(
                PROVIDER,
                format!("unusable crumb: {:.80}", crumb),
            ));
        }

        info!("Yahoo session crumb refreshed");
        Ok(crumb.to_string())
    }

    async fn send_quote_request(&self, joined: &str) -> Result<Response, ProviderError> {
        let crumb = self.crumb().await?;
        self.client
            .get(format!("{}/v7/finance/quote", self.base_url))
            .query(&[("symbols", joined), ("crumb", crumb.as_str())])
            .header(REFERER, FINANCE_REFERER)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, ProviderError> {
        let joined = symbols.join(",");

        debug!("Fetching {} quotes from Yahoo", symbols.len());

        let mut response = self.send_quote_request(&joined).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Yahoo rejected the session crumb, refreshing");
            self.invalidate_crumb().await;
            response = self.send_quote_request(&joined).await?;
        }

        let body = read_body(response).await?;
        parse_quote_response(&body)
    }

    async fn fetch_chart(&self, symbol: &str, days: u32) -> Result<Vec<DailyClose>, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::decode(PROVIDER, format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::decode(PROVIDER, "base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);

        let now = Utc::now();
        let start = now - ChronoDuration::days(days as i64);

        debug!("Fetching {} day chart for {} from Yahoo", days, symbol);

        let response = self
            .client
            .get(url)
            .query(&[
                ("period1", start.timestamp().to_string()),
                ("period2", now.timestamp().to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                symbol: symbol.to_string(),
            });
        }

        let body = read_body(response).await?;
        parse_chart_response(&body)
    }
}

/// Crumbs are short opaque tokens; anything else is an error page
fn is_valid_crumb(crumb: &str) -> bool {
    !crumb.is_empty()
        && crumb.len() < 100
        && !crumb.contains(char::is_whitespace)
        && !crumb.contains('<')
}

/// Fetch one symbol at a time with a pause in between.
///
/// A failed symbol is logged and left out. The call only fails when no
/// symbol succeeded, with the last error seen.
async fn fetch_each<F, Fut>(
    symbols: &[String],
    pacing: &PacingJitter,
    fetch: F,
) -> Result<HashMap<String, Vec<DailyClose>>, ProviderError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<DailyClose>, ProviderError>>,
{
    let mut result = HashMap::with_capacity(symbols.len());
    let mut last_error = None;

    for (i, symbol) in symbols.iter().enumerate() {
        if i > 0 {
            pacing.pause().await;
        }
        match fetch(symbol.clone()).await {
            Ok(closes) => {
                result.insert(symbol.clone(), closes);
            }
            Err(ProviderError::NotFound { symbol }) => {
                warn!("Yahoo has no chart for {}, skipping", symbol);
            }
            Err(e) => {
                warn!("Chart fetch for {} failed: {}", symbol, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if result.is_empty() => Err(e),
        _ => Ok(result),
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            provider: PROVIDER.to_string(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            provider: PROVIDER.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    response
        .text()
        .await
        .map_err(|e| ProviderError::transport(PROVIDER, e))
}

#[async_trait]
impl QuoteProvider for YahooClient {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    async fn get_quote(&self, symbol: &str) -> Result<RawQuote, ProviderError> {
        let quotes = self.fetch_quotes(&[symbol.to_string()]).await?;
        quotes
            .into_iter()
            .find(|q| q.symbol.as_deref() == Some(symbol))
            .ok_or_else(|| ProviderError::NotFound {
                symbol: symbol.to_string(),
            })
    }

    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, RawQuote>, ProviderError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let quotes = self.fetch_quotes(symbols).await?;
        Ok(quotes
            .into_iter()
            .filter_map(|q| q.symbol.clone().map(|s| (s, q)))
            .collect())
    }

    async fn get_daily_closes(
        &self,
        symbols: &[String],
        days: u32,
    ) -> Result<HashMap<String, Vec<DailyClose>>, ProviderError> {
        fetch_each(symbols, &self.history_pacing, |symbol| async move {
            self.fetch_chart(&symbol, days).await
        })
        .await
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    #[serde(default)]
    result: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    result: Option<Vec<ChartSeries>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartSeries {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub(crate) fn parse_quote_response(body: &str) -> Result<Vec<RawQuote>, ProviderError> {
    let envelope: QuoteEnvelope =
        serde_json::from_str(body).map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;
    Ok(envelope.quote_response.result)
}

pub(crate) fn parse_chart_response(body: &str) -> Result<Vec<DailyClose>, ProviderError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?;

    if let Some(error) = envelope.chart.error.filter(|e| !e.is_null()) {
        return Err(ProviderError::decode(PROVIDER, error.to_string()));
    }

    let series = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::decode(PROVIDER, "chart result is empty"))?;

    let closes = series
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    Ok(series
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let timestamp: DateTime<Utc> = Utc.timestamp_opt(*ts, 0).single()?;
            let close = closes.get(i).copied().flatten().filter(|c| c.is_finite());
            Some(DailyClose { timestamp, close })
        })
        .collect())
}
