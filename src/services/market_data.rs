//! Market-data provider seam.
//!
//! The monitor talks to the provider only through [`MarketDataSource`], so the
//! Yahoo client can be swapped for an in-memory fake in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// One daily bar as the provider reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
}

impl DailyBar {
    /// Adjusted close, falling back to the raw close.
    pub fn adjusted_or_close(&self) -> Option<f64> {
        self.adj_close.or(self.close)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub long_name: Option<String>,
    pub shares_outstanding: Option<f64>,
    pub implied_shares_outstanding: Option<f64>,
}

impl CompanyProfile {
    /// Reported shares outstanding, falling back to the implied figure.
    pub fn shares(&self) -> Option<f64> {
        self.shares_outstanding
            .or(self.implied_shares_outstanding)
            .filter(|s| s.is_finite() && *s > 0.0)
    }
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("no data for symbol {symbol}")]
    NoData { symbol: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormat(String),
}

impl MarketDataError {
    /// Whether re-running later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MarketDataError::Http(_) => true,
            MarketDataError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars for `symbol` with dates in `[start, end]`, oldest first.
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketDataError>;

    /// Current company name and share counts.
    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_fall_back_to_implied() {
        let profile = CompanyProfile {
            long_name: None,
            shares_outstanding: None,
            implied_shares_outstanding: Some(5.0e9),
        };
        assert_eq!(profile.shares(), Some(5.0e9));

        let zero = CompanyProfile {
            shares_outstanding: Some(0.0),
            ..Default::default()
        };
        assert_eq!(zero.shares(), None);
    }

    #[test]
    fn bar_prefers_adjusted_close() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bar = DailyBar { date, close: Some(10.0), adj_close: Some(9.5) };
        assert_eq!(bar.adjusted_or_close(), Some(9.5));
        let bar = DailyBar { date, close: Some(10.0), adj_close: None };
        assert_eq!(bar.adjusted_or_close(), Some(10.0));
    }

    #[test]
    fn only_network_and_throttling_are_transient() {
        let e = MarketDataError::Status { symbol: "X".into(), status: 503 };
        assert!(e.is_transient());
        let e = MarketDataError::Status { symbol: "X".into(), status: 404 };
        assert!(!e.is_transient());
        assert!(!MarketDataError::NoData { symbol: "X".into() }.is_transient());
    }
}
