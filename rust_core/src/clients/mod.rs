pub mod indicators;
pub mod quote_provider;
pub mod yahoo;

// Re-export commonly used types
pub use indicators::{
    DominanceReading, FearGreedReading, IndicatorClient, IndicatorEndpoints, IndicatorSource,
    Total3Reading,
};
pub use quote_provider::{DailyClose, ProviderError, QuoteProvider, RawQuote};
pub use yahoo::{YahooClient, YahooEndpoints};
