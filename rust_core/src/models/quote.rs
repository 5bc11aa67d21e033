//! Published quote shapes.
//!
//! Each asset group and indicator has its own field set. [`Quote`] closes
//! over all of them and serializes untagged, so subscribers see a flat JSON
//! object per symbol.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub current_value: String,
    pub change: String,
    pub change_percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuote {
    pub current_price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    pub change: String,
    pub change_percent: String,
    pub market_state: String,
    /// Pre- or post-market price, only outside the regular session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otc_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoQuote {
    pub current_price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    pub change: String,
    pub change_percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForexQuote {
    pub rate: String,
    pub change: String,
    pub change_percent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FearGreedQuote {
    pub score: String,
    pub rating: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DominanceQuote {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Total3Quote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    pub change_percent: String,
    /// Share of total crypto market cap outside BTC and ETH, in percent
    pub share: String,
}

// Variant order matters for untagged deserialization: shapes with more
// required fields come before the ones they overlap with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quote {
    Index(IndexQuote),
    Stock(StockQuote),
    Crypto(CryptoQuote),
    Forex(ForexQuote),
    FearGreed(FearGreedQuote),
    Total3(Total3Quote),
    Dominance(DominanceQuote),
}
