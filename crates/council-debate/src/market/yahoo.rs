//! Yahoo Finance market data

use super::{MarketDataFetcher, percent_change};
use crate::error::{DebateError, Result};
use crate::model::MarketSnapshot;
use async_trait::async_trait;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

/// Daily snapshot from Yahoo Finance chart data
///
/// The move is computed from the last two daily closes, and the volume is the
/// last session's.
#[derive(Debug, Default, Clone, Copy)]
pub struct YahooMarketData;

impl YahooMarketData {
    pub fn new() -> Self {
        Self
    }

    fn upstream(symbol: &str, reason: impl ToString) -> DebateError {
        DebateError::UpstreamData {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl MarketDataFetcher for YahooMarketData {
    #[instrument(skip(self))]
    async fn get(&self, subject: &str) -> Result<MarketSnapshot> {
        let provider = yahoo::YahooConnector::new().map_err(|e| Self::upstream(subject, e))?;

        // A few days of range covers weekends and holidays
        let response = provider
            .get_quote_range(subject, "1d", "5d")
            .await
            .map_err(|e| Self::upstream(subject, e))?;

        let quotes = response.quotes().map_err(|e| Self::upstream(subject, e))?;
        let [.., previous, last] = quotes.as_slice() else {
            return Err(Self::upstream(
                subject,
                format!("need two daily closes, got {}", quotes.len()),
            ));
        };

        let percent_move = percent_change(previous.close, last.close)
            .ok_or_else(|| Self::upstream(subject, "previous close is zero"))?;

        debug!(
            close = last.close,
            previous = previous.close,
            percent_move,
            "Fetched daily quotes"
        );

        Ok(MarketSnapshot::new(last.close, percent_move, last.volume))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires network access to Yahoo Finance"]
    async fn test_fetch_snapshot() {
        let snapshot = YahooMarketData::new().get("AAPL").await.unwrap();
        assert!(snapshot.price > 0.0);
        assert!(snapshot.volume > 0);
    }

    #[tokio::test]
    #[ignore = "requires network access to Yahoo Finance"]
    async fn test_unknown_symbol_is_upstream_error() {
        let err = YahooMarketData::new().get("NOT_A_TICKER_123").await.unwrap_err();
        assert!(matches!(err, DebateError::UpstreamData { .. }));
    }
}
