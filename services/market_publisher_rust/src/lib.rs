//! market_publisher_rust - Supervised polling loops publishing market tickers to Redis

pub mod config;
pub mod loops;
pub mod supervisor;

pub use config::Config;
pub use loops::LoopContext;
pub use supervisor::Supervisor;
