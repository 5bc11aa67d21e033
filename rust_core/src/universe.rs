//! Static symbol membership per asset class.

use crate::models::AssetClass;

const INDEX_SYMBOLS: &[&str] = &["^IXIC", "^GSPC", "^DJI", "^RUT", "^TLT", "^VIX"];
const STOCK_SYMBOLS: &[&str] = &["AAPL", "NVDA", "MSFT", "AMZN", "GOOGL", "META", "TSLA"];
const CRYPTO_SYMBOLS: &[&str] = &["BTC-USD", "ETH-USD", "SOL-USD"];
const FOREX_SYMBOLS: &[&str] = &["DX-Y.NYB", "KRW=X", "EURKRW=X", "CNYKRW=X", "JPYKRW=X"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolUniverse {
    pub index: Vec<String>,
    pub stock: Vec<String>,
    pub crypto: Vec<String>,
    pub forex: Vec<String>,
}

impl Default for SymbolUniverse {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            index: owned(INDEX_SYMBOLS),
            stock: owned(STOCK_SYMBOLS),
            crypto: owned(CRYPTO_SYMBOLS),
            forex: owned(FOREX_SYMBOLS),
        }
    }
}

impl SymbolUniverse {
    pub fn symbols(&self, asset_class: AssetClass) -> &[String] {
        match asset_class {
            AssetClass::Index => &self.index,
            AssetClass::Stock => &self.stock,
            AssetClass::Crypto => &self.crypto,
            AssetClass::Forex => &self.forex,
        }
    }

    /// Every symbol, in publishing order
    pub fn all_symbols(&self) -> Vec<String> {
        AssetClass::ALL
            .iter()
            .flat_map(|class| self.symbols(*class).iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_membership() {
        let universe = SymbolUniverse::default();
        assert!(universe.symbols(AssetClass::Stock).contains(&"AAPL".to_string()));
        assert!(universe.symbols(AssetClass::Forex).contains(&"KRW=X".to_string()));
        assert_eq!(universe.all_symbols().len(), 6 + 7 + 3 + 5);
        assert_eq!(universe.all_symbols()[0], "^IXIC");
    }
}
