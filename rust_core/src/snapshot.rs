//! Read-back of persisted snapshots and chart records.

use crate::models::{AssetClass, ChartRecord};
use crate::redis::MarketStore;
use anyhow::{Context, Result};
use serde_json::Value;

/// Latest batch stored under `key`, if any
pub async fn load_snapshot(store: &dyn MarketStore, key: &str) -> Result<Option<Value>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).with_context(|| format!("Corrupt snapshot at {}", key))?;
    Ok(Some(value))
}

/// Stored chart record for one symbol, if any
pub async fn load_chart(
    store: &dyn MarketStore,
    asset_class: AssetClass,
    symbol: &str,
) -> Result<Option<ChartRecord>> {
    let key = asset_class.chart_key(symbol);
    let Some(raw) = store.get(&key).await? else {
        return Ok(None);
    };
    let record = serde_json::from_str(&raw).with_context(|| format!("Corrupt chart record at {}", key))?;
    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartMetadata, ChartPoint};
    use crate::publisher::publish_snapshot;
    use crate::testing::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_snapshot_round_trips_through_store() {
        let store = MemoryStore::default();
        let payload = json!({"^GSPC": {"price": "5000.00"}});
        publish_snapshot(&store, "index.price.stream", "snapshot.index", &payload)
            .await
            .unwrap();

        let loaded = load_snapshot(&store, "snapshot.index").await.unwrap();
        assert_eq!(loaded, Some(payload));
        assert_eq!(load_snapshot(&store, "snapshot.stock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let store = MemoryStore::default();
        store.set("snapshot.crypto", "{not json").await.unwrap();
        assert!(load_snapshot(&store, "snapshot.crypto").await.is_err());
    }

    #[tokio::test]
    async fn test_load_chart_by_class_and_symbol() {
        let store = MemoryStore::default();
        let mut chart_data = BTreeMap::new();
        chart_data.insert(
            "2024-06-03".to_string(),
            ChartPoint {
                close: "191.29".to_string(),
            },
        );
        let record = ChartRecord {
            asset_class: AssetClass::Stock,
            symbol: "AAPL".to_string(),
            stored_at: "2024-06-03 20:00:00 EDT".to_string(),
            chart_data,
            metadata: ChartMetadata {
                interval: "1d".to_string(),
                period: "30d".to_string(),
                timezone: "America/New_York (ET)".to_string(),
                market_hours: "9:30 AM - 4:00 PM ET (Regular Market Hours)".to_string(),
            },
        };
        store
            .set(&record.key(), &serde_json::to_string(&record).unwrap())
            .await
            .unwrap();

        let loaded = load_chart(&store, AssetClass::Stock, "AAPL").await.unwrap();
        assert_eq!(loaded, Some(record));
        assert_eq!(load_chart(&store, AssetClass::Stock, "MSFT").await.unwrap(), None);
    }
}
