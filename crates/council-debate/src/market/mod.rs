//! Market data collaborators
//!
//! The orchestrator fetches one [`MarketSnapshot`] per session through the
//! [`MarketDataFetcher`] seam and substitutes a synthetic snapshot when the
//! fetch fails.

mod yahoo;

pub use yahoo::YahooMarketData;

use crate::error::Result;
use crate::model::MarketSnapshot;
use async_trait::async_trait;

/// Source of price, volume and daily move for a subject
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    async fn get(&self, subject: &str) -> Result<MarketSnapshot>;
}

/// Percent change from `previous` to `current`
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    (previous.is_finite() && current.is_finite() && previous != 0.0)
        .then(|| (current - previous) / previous * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_change() {
        let pct = percent_change(100.0, 101.5).unwrap();
        assert!((pct - 1.5).abs() < 1e-9);

        let pct = percent_change(200.0, 190.0).unwrap();
        assert!((pct + 5.0).abs() < 1e-9);

        assert_eq!(percent_change(0.0, 10.0), None);
        assert_eq!(percent_change(f64::NAN, 10.0), None);
    }
}
