pub mod guard;
pub mod store;

pub use guard::{StoreConfig, StoreGuard};
pub use store::MarketStore;
