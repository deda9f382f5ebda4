// src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One line of the ticker list file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRecord {
    pub ticker: String,
    pub company_name: String,
}

/// Where a snapshot's market cap came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapQuality {
    /// Provider reported shares outstanding.
    Reported,
    /// Shares outstanding unavailable; market cap is `price × PLACEHOLDER_SHARES`.
    PlaceholderShares,
}

impl CapQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapQuality::Reported => "reported",
            CapQuality::PlaceholderShares => "placeholder_shares",
        }
    }
}

impl fmt::Display for CapQuality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Share count assumed when the provider has no shares-outstanding figure.
pub const PLACEHOLDER_SHARES: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapSnapshot {
    pub ticker: String,
    pub market_cap: f64,
    pub price: f64,
    pub date: NaiveDate,
    pub company_name: String,
    pub quality: CapQuality,
}

impl MarketCapSnapshot {
    /// Shares implied by the base-date snapshot, held constant for the run.
    pub fn implied_shares(&self) -> f64 {
        self.market_cap / self.price
    }
}

/// Portfolio weights keyed by ticker, kept in ticker-file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    order: Vec<String>,
    weights: HashMap<String, f64>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a weight. New tickers are appended to the order.
    pub fn insert(&mut self, ticker: impl Into<String>, weight: f64) {
        let ticker = ticker.into();
        if self.weights.insert(ticker.clone(), weight).is_none() {
            self.order.push(ticker);
        }
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.weights.get(ticker).copied()
    }

    pub fn tickers(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.order
            .iter()
            .map(move |t| (t.as_str(), self.weights[t]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// Trading dates × symbols of (adjusted) closing prices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMatrix {
    pub dates: Vec<NaiveDate>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl PriceMatrix {
    /// Aligns per-symbol `(date, price)` series on the union of their dates.
    pub fn from_series(series: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Self {
        let mut dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(d, _)| *d))
            .collect();
        dates.sort();
        dates.dedup();

        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut columns = HashMap::new();
        for (symbol, points) in series {
            let mut column = vec![None; dates.len()];
            for (date, price) in points {
                if price.is_finite() {
                    column[index[&date]] = Some(price);
                }
            }
            columns.insert(symbol, column);
        }

        Self { dates, columns }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.columns.contains_key(symbol)
    }

    pub fn price(&self, symbol: &str, row: usize) -> Option<f64> {
        self.columns
            .get(symbol)
            .and_then(|c| c.get(row).copied().flatten())
    }
}

/// Day-over-day percentage change of a `PriceMatrix`, first date dropped.
///
/// Row `i` here corresponds to row `i + 1` of the source matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl ReturnSeries {
    pub fn from_prices(prices: &PriceMatrix) -> Self {
        let dates = prices.dates.iter().skip(1).copied().collect();
        let columns = prices
            .columns
            .iter()
            .map(|(symbol, column)| {
                let returns = column
                    .windows(2)
                    .map(|w| match (w[0], w[1]) {
                        (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
                        _ => None,
                    })
                    .collect();
                (symbol.clone(), returns)
            })
            .collect();

        Self { dates, columns }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn get(&self, symbol: &str, row: usize) -> Option<f64> {
        self.columns
            .get(symbol)
            .and_then(|c| c.get(row).copied().flatten())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerDay {
    pub ticker: String,
    pub price: Option<f64>,
    pub daily_return: Option<f64>,
}

/// One trading day of portfolio output.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRecord {
    pub date: NaiveDate,
    pub fixed_daily_return: f64,
    pub fixed_cumulative_value: f64,
    pub reweighted_daily_return: f64,
    pub reweighted_cumulative_value: f64,
    pub benchmark_daily_return: f64,
    pub benchmark_cumulative_value: f64,
    pub tickers: Vec<TickerDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerChange {
    pub ticker: String,
    pub original_name: String,
    pub current_name: String,
    #[serde(rename = "change_detected")]
    pub detected_on: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn weight_map_keeps_insertion_order() {
        let mut weights = WeightMap::new();
        weights.insert("MSFT", 0.5);
        weights.insert("AAPL", 0.3);
        weights.insert("NVDA", 0.2);
        weights.insert("MSFT", 0.4);

        assert_eq!(weights.tickers(), &["MSFT", "AAPL", "NVDA"]);
        assert_eq!(weights.get("MSFT"), Some(0.4));
        assert_eq!(weights.len(), 3);
    }

    #[test]
    fn price_matrix_aligns_on_union_of_dates() {
        let matrix = PriceMatrix::from_series(vec![
            ("A".into(), vec![(d(2), 10.0), (d(3), 11.0)]),
            ("B".into(), vec![(d(3), 20.0), (d(4), 21.0)]),
        ]);

        assert_eq!(matrix.dates, vec![d(2), d(3), d(4)]);
        assert_eq!(matrix.price("A", 2), None);
        assert_eq!(matrix.price("B", 0), None);
        assert_eq!(matrix.price("B", 2), Some(21.0));
    }

    #[test]
    fn returns_need_both_prices() {
        let matrix = PriceMatrix::from_series(vec![
            ("A".into(), vec![(d(2), 10.0), (d(3), 11.0), (d(4), 11.0)]),
            ("B".into(), vec![(d(2), 20.0), (d(4), 22.0)]),
        ]);
        let returns = ReturnSeries::from_prices(&matrix);

        assert_eq!(returns.dates, vec![d(3), d(4)]);
        assert!((returns.get("A", 0).unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(returns.get("A", 1), Some(0.0));
        assert_eq!(returns.get("B", 0), None);
        assert_eq!(returns.get("B", 1), None);
    }
}
