// src/degraded.rs
//! What the engine substitutes when a source has nothing to offer.

use chrono::Utc;
use std::sync::Arc;

use crate::analyze::signals::NEUTRAL_TREND_INTEREST;
use crate::config::SymbolCfg;
use crate::ingest::fetcher::RandomSource;
use crate::ingest::types::Quote;
use crate::region::Region;

pub trait DegradedModeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stand-in quotes when the commodity connector returned nothing.
    fn quotes(&self, symbols: &[SymbolCfg]) -> Vec<Quote>;

    /// Stand-in search interest for a region without a trend reading.
    fn trend_interest(&self, region: Region) -> f64;
}

/// No quotes, neutral trend interest. Missing data never moves a score.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralFallback;

impl DegradedModeProvider for NeutralFallback {
    fn name(&self) -> &'static str {
        "neutral"
    }

    fn quotes(&self, _symbols: &[SymbolCfg]) -> Vec<Quote> {
        Vec::new()
    }

    fn trend_interest(&self, _region: Region) -> f64 {
        NEUTRAL_TREND_INTEREST
    }
}

/// Jittered quotes around fixed base prices, flagged `synthetic`.
pub struct SyntheticFallback {
    rng: Arc<dyn RandomSource>,
}

impl SyntheticFallback {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    pub fn base_price(symbol: &str) -> f64 {
        match symbol {
            "CL=F" => 70.0,
            "BZ=F" => 75.0,
            "GC=F" => 2650.0,
            "SI=F" => 30.0,
            "NG=F" => 3.5,
            _ => 100.0,
        }
    }

    fn quote(&self, sym: &SymbolCfg) -> Quote {
        let base = Self::base_price(&sym.symbol);
        let price = base * (1.0 + self.rng.uniform(-0.02, 0.02));
        let pct = self.rng.uniform(-3.0, 3.0);
        let change = price * pct / 100.0;
        let history = (0..24)
            .map(|_| base * (1.0 + self.rng.uniform(-0.01, 0.01)))
            .collect();
        Quote {
            symbol: sym.symbol.clone(),
            name: sym.name.clone(),
            price: round2(price),
            change: round2(change),
            change_percent: round2(pct),
            previous_close: round2(price - change),
            history,
            updated_at: Utc::now(),
            synthetic: true,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl DegradedModeProvider for SyntheticFallback {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn quotes(&self, symbols: &[SymbolCfg]) -> Vec<Quote> {
        symbols.iter().map(|s| self.quote(s)).collect()
    }

    fn trend_interest(&self, _region: Region) -> f64 {
        NEUTRAL_TREND_INTEREST
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotesCfg;
    use crate::ingest::fetcher::FixedRandom;

    #[test]
    fn neutral_offers_no_quotes() {
        let syms = QuotesCfg::commodities().symbols;
        assert!(NeutralFallback.quotes(&syms).is_empty());
        assert_eq!(NeutralFallback.trend_interest(Region::Korea), 50.0);
    }

    #[test]
    fn synthetic_quotes_are_deterministic_under_fixed_random() {
        // 0.75 of every range: price +1%, change +1.5%
        let fb = SyntheticFallback::new(Arc::new(FixedRandom(0.75)));
        let q = fb.quotes(&QuotesCfg::commodities().symbols);
        assert_eq!(q.len(), 5);
        let oil = &q[0];
        assert_eq!(oil.symbol, "CL=F");
        assert_eq!(oil.price, 70.7);
        assert_eq!(oil.change_percent, 1.5);
        assert_eq!(oil.history.len(), 24);
        assert!(q.iter().all(|x| x.synthetic));
    }
}
