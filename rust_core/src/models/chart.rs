//! Persisted daily chart history for one symbol.

use super::AssetClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub close: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartMetadata {
    pub interval: String,
    pub period: String,
    pub timezone: String,
    pub market_hours: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRecord {
    #[serde(rename = "type")]
    pub asset_class: AssetClass,
    pub symbol: String,
    /// Exchange-local wall clock at collection time
    pub stored_at: String,
    /// Trading date (`YYYY-MM-DD`, exchange-local) to close price
    pub chart_data: BTreeMap<String, ChartPoint>,
    pub metadata: ChartMetadata,
}

impl ChartRecord {
    /// Store key, e.g. `stock.AAPL`.
    pub fn key(&self) -> String {
        self.asset_class.chart_key(&self.symbol)
    }
}
