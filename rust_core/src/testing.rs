//! In-memory fakes shared by the unit tests.

use crate::clients::{
    DailyClose, DominanceReading, FearGreedReading, IndicatorSource, ProviderError, QuoteProvider,
    RawQuote, Total3Reading,
};
use crate::redis::MarketStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Publish { channel: String, payload: String },
    Set { key: String, value: String },
}

#[derive(Default)]
pub struct MemoryStore {
    pub ops: Mutex<Vec<StoreOp>>,
    pub values: Mutex<HashMap<String, String>>,
    pub fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn publishes(&self) -> Vec<(String, String)> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                StoreOp::Publish { channel, payload } => Some((channel.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn sets(&self) -> Vec<(String, String)> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                StoreOp::Set { key, value } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(anyhow!("store unavailable"));
        }
        self.ops.lock().push(StoreOp::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(anyhow!("store unavailable"));
        }
        self.ops.lock().push(StoreOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Provider answering from fixed tables; unknown symbols fail
#[derive(Default)]
pub struct StaticProvider {
    pub quotes: HashMap<String, RawQuote>,
    pub closes: HashMap<String, Vec<DailyClose>>,
    pub fail_batches: bool,
    /// Number of upcoming history requests that fail before one succeeds
    pub history_failures: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl StaticProvider {
    pub fn with_quotes(quotes: Vec<(&str, RawQuote)>) -> Self {
        Self {
            quotes: quotes
                .into_iter()
                .map(|(s, q)| (s.to_string(), q))
                .collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl QuoteProvider for StaticProvider {
    fn provider_name(&self) -> &str {
        "static"
    }

    async fn get_quote(&self, symbol: &str) -> Result<RawQuote, ProviderError> {
        self.calls.lock().push(symbol.to_string());
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::RateLimited {
                provider: "static".to_string(),
            })
    }

    async fn get_quotes(&self, symbols: &[String]) -> Result<HashMap<String, RawQuote>, ProviderError> {
        self.calls.lock().push(symbols.join(","));
        if self.fail_batches {
            return Err(ProviderError::decode("static", "batch failed"));
        }
        Ok(symbols
            .iter()
            .filter_map(|s| self.quotes.get(s).map(|q| (s.clone(), q.clone())))
            .collect())
    }

    async fn get_daily_closes(
        &self,
        symbols: &[String],
        _days: u32,
    ) -> Result<HashMap<String, Vec<DailyClose>>, ProviderError> {
        self.calls.lock().push(format!("history:{}", symbols.join(",")));
        let pending = self.history_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.history_failures.store(pending - 1, Ordering::SeqCst);
            return Err(ProviderError::RateLimited {
                provider: "static".to_string(),
            });
        }
        if self.fail_batches {
            return Err(ProviderError::decode("static", "history failed"));
        }
        Ok(symbols
            .iter()
            .filter_map(|s| self.closes.get(s).map(|c| (s.clone(), c.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct StaticIndicators {
    pub fear_greed: Option<FearGreedReading>,
    pub dominance: Option<DominanceReading>,
    pub total3: Option<Total3Reading>,
}

fn unavailable(what: &str) -> ProviderError {
    ProviderError::Http {
        provider: what.to_string(),
        status: 503,
        body: String::new(),
    }
}

#[async_trait]
impl IndicatorSource for StaticIndicators {
    async fn fear_greed(&self) -> Result<FearGreedReading, ProviderError> {
        self.fear_greed.clone().ok_or_else(|| unavailable("CNN"))
    }

    async fn dominance(&self) -> Result<DominanceReading, ProviderError> {
        self.dominance.ok_or_else(|| unavailable("CoinGecko"))
    }

    async fn total3(&self) -> Result<Total3Reading, ProviderError> {
        self.total3.ok_or_else(|| unavailable("TradingView"))
    }
}

/// Reply delay used by [`FakeRedis`] for slow commands
pub const FAKE_REDIS_DELAY: Duration = Duration::from_millis(300);

/// Shared state behind a [`FakeRedis`] listener
#[derive(Default)]
pub struct FakeRedisState {
    pub values: Mutex<HashMap<String, String>>,
    pub connections: AtomicUsize,
    /// `SET` on a key starting with `slow` is answered late this many times
    pub slow_sets: AtomicUsize,
    /// Every `PING` is answered late while set
    pub slow_ping: AtomicBool,
}

/// RESP server on a local port covering the commands the guard sends.
///
/// `GET hangup` closes the connection without a reply.
pub struct FakeRedis {
    pub addr: SocketAddr,
    pub state: Arc<FakeRedisState>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(FakeRedisState::default());

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_resp(socket, shared.clone()));
            }
        });

        Self { addr, state }
    }

    pub fn store_config(&self) -> crate::redis::StoreConfig {
        crate::redis::StoreConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            socket_timeout: Duration::from_millis(100),
            retry_on_timeout: false,
            ..crate::redis::StoreConfig::default()
        }
    }
}

async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        parts.push(String::from_utf8(buf).ok()?);
    }
    Some(parts)
}

async fn serve_resp(socket: tokio::net::TcpStream, state: Arc<FakeRedisState>) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    while let Some(parts) = read_command(&mut reader).await {
        let name = parts.first().map(|p| p.to_uppercase()).unwrap_or_default();
        let reply = match name.as_str() {
            "PING" => {
                if state.slow_ping.load(Ordering::SeqCst) {
                    tokio::time::sleep(FAKE_REDIS_DELAY).await;
                }
                "+PONG\r\n".to_string()
            }
            "SET" if parts.len() >= 3 => {
                let slow = parts[1].starts_with("slow")
                    && state
                        .slow_sets
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok();
                if slow {
                    tokio::time::sleep(FAKE_REDIS_DELAY).await;
                }
                state.values.lock().insert(parts[1].clone(), parts[2].clone());
                "+OK\r\n".to_string()
            }
            "GET" if parts.len() >= 2 => {
                if parts[1] == "hangup" {
                    return;
                }
                let value = state.values.lock().get(&parts[1]).cloned();
                match value {
                    Some(value) => format!("${}\r\n{}\r\n", value.len(), value),
                    None => "$-1\r\n".to_string(),
                }
            }
            "PUBLISH" => ":0\r\n".to_string(),
            _ => "+OK\r\n".to_string(),
        };
        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
