// Shared models for the ticker publisher
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod chart;
pub mod quote;

pub use chart::{ChartMetadata, ChartPoint, ChartRecord};
pub use quote::{
    CryptoQuote, DominanceQuote, FearGreedQuote, ForexQuote, IndexQuote, Quote, StockQuote,
    Total3Quote,
};

// ============================================================================
// Channels
// ============================================================================

pub const INDEX_CHANNEL: &str = "index.price.stream";
pub const STOCK_CHANNEL: &str = "stock.price.stream";
pub const CRYPTO_CHANNEL: &str = "crypto.price.stream";
pub const FOREX_CHANNEL: &str = "forex.price.stream";

/// One cycle's formatted quotes for one asset group, keyed by symbol.
pub type Batch = BTreeMap<String, Quote>;

// ============================================================================
// Asset classes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Index,
    Stock,
    Crypto,
    Forex,
}

impl AssetClass {
    /// Publishing order of the all-markets sequence.
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Index,
        AssetClass::Stock,
        AssetClass::Crypto,
        AssetClass::Forex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Index => "index",
            AssetClass::Stock => "stock",
            AssetClass::Crypto => "crypto",
            AssetClass::Forex => "forex",
        }
    }

    pub fn channel(&self) -> &'static str {
        match self {
            AssetClass::Index => INDEX_CHANNEL,
            AssetClass::Stock => STOCK_CHANNEL,
            AssetClass::Crypto => CRYPTO_CHANNEL,
            AssetClass::Forex => FOREX_CHANNEL,
        }
    }

    /// Key holding the latest batch for this group.
    pub fn snapshot_key(&self) -> String {
        format!("snapshot.{}", self.as_str())
    }

    /// Key holding the chart record of `symbol`.
    pub fn chart_key(&self, symbol: &str) -> String {
        format!("{}.{}", self.as_str(), symbol)
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

// ============================================================================
// Sentiment indicators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    FearGreed,
    BtcDominance,
    Total3,
}

impl Indicator {
    /// Symbol the indicator is published under inside its message.
    pub fn symbol(&self) -> &'static str {
        match self {
            Indicator::FearGreed => "Fear&Greed",
            Indicator::BtcDominance => "BTC.D",
            Indicator::Total3 => "TOTAL3",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Indicator::FearGreed => "fear-greed",
            Indicator::BtcDominance => "btc-dominance",
            Indicator::Total3 => "total3",
        }
    }

    /// Fear & Greed rides the index stream, the crypto metrics the crypto stream.
    pub fn asset_class(&self) -> AssetClass {
        match self {
            Indicator::FearGreed => AssetClass::Index,
            Indicator::BtcDominance | Indicator::Total3 => AssetClass::Crypto,
        }
    }

    pub fn channel(&self) -> &'static str {
        self.asset_class().channel()
    }

    pub fn snapshot_key(&self) -> String {
        format!("snapshot.{}", self.key())
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
