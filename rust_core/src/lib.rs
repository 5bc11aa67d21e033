//! Ticker Core - market data fetching, shaping and publishing.
//!
//! This module provides:
//! - Quote and chart providers (Yahoo Finance, CNN, CoinGecko, TradingView)
//! - Typed payload models for every asset class and sentiment indicator
//! - A self-healing Redis store guard with publish/set/get
//! - Retry governor and pacing jitter for rate-limited upstreams
//! - Group fetch-and-publish pipeline with snapshot persistence
//! - Daily chart retention on exchange-local close-of-market time
//! - Snapshot and chart read-back helpers

pub mod chart;
pub mod clients;
pub mod governor;
pub mod indicators;
pub mod models;
pub mod publisher;
pub mod redis;
pub mod snapshot;
pub mod universe;
pub mod utils;

#[cfg(test)]
mod testing;

pub use chart::{ChartConfig, ChartRetention};
pub use governor::{GovernorConfig, PacingJitter, RetryGovernor};
pub use indicators::IndicatorPublisher;
pub use models::{AssetClass, Indicator, Quote};
pub use publisher::MarketPublisher;
pub use redis::{MarketStore, StoreConfig, StoreGuard};
pub use universe::SymbolUniverse;
