pub mod formatters;

pub use formatters::{format_market_cap, format_number, format_number_or, Numeric};
