//! Store capability used by the publishing pipeline.
//!
//! The pipeline only needs four independently atomic commands. Keeping them
//! behind a trait lets every component take the store by injection
//! (`Arc<dyn MarketStore>`) and lets tests swap in an in-memory store.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Publish `payload` on `channel`
    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;

    /// Overwrite `key` with `value`
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read `key`, `None` when it does not exist
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Liveness check. Transport failures report `false`, never an error.
    async fn ping(&self) -> bool;
}
