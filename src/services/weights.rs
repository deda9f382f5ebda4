// src/services/weights.rs
use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use log::{error, info, warn};
use std::cmp::Reverse;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{CapQuality, MarketCapSnapshot, TickerRecord, WeightMap, PLACEHOLDER_SHARES};

use super::market_data::{DailyBar, MarketDataError, MarketDataSource};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no price data around the base date")]
    NoData,

    #[error("no usable close on {date}")]
    NoClose { date: NaiveDate },

    #[error(transparent)]
    Fetch(MarketDataError),
}

impl SnapshotError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SnapshotError::Fetch(e) if e.is_transient())
    }
}

/// Base-date snapshots plus the tickers that could not be priced.
#[derive(Debug, Default)]
pub struct SnapshotReport {
    pub snapshots: Vec<MarketCapSnapshot>,
    pub failures: Vec<(String, SnapshotError)>,
}

impl SnapshotReport {
    pub fn placeholder_count(&self) -> usize {
        self.snapshots
            .iter()
            .filter(|s| s.quality == CapQuality::PlaceholderShares)
            .count()
    }

    /// Tickers whose lookup failed in a way a later run may not repeat.
    pub fn transient_failures(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|(_, e)| e.is_transient())
            .map(|(ticker, _)| ticker.as_str())
            .collect()
    }

    pub fn log_failure_summary(&self) {
        if self.failures.is_empty() {
            return;
        }
        let transient = self.transient_failures();
        warn!(
            "{} ticker(s) left out of the portfolio, {} of them on network or throttling errors",
            self.failures.len(),
            transient.len()
        );
        if !transient.is_empty() {
            warn!("  Re-running may recover: {}", transient.join(", "));
        }
    }
}

/// One snapshot per ticker: a repeated ticker keeps its first position and
/// its last snapshot.
fn latest_per_ticker(snapshots: Vec<MarketCapSnapshot>) -> Vec<MarketCapSnapshot> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut latest: Vec<MarketCapSnapshot> = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        match index.get(&snapshot.ticker) {
            Some(&i) => latest[i] = snapshot,
            None => {
                index.insert(snapshot.ticker.clone(), latest.len());
                latest.push(snapshot);
            }
        }
    }
    latest
}

/// Bar whose date is closest to `target`; the later bar wins a tie.
pub fn nearest_bar(bars: &[DailyBar], target: NaiveDate) -> Option<&DailyBar> {
    bars.iter()
        .min_by_key(|b| ((b.date - target).num_days().abs(), Reverse(b.date)))
}

/// Market cap for one ticker on (or nearest to) `base_date`.
pub async fn snapshot_ticker<S: MarketDataSource + ?Sized>(
    source: &S,
    record: &TickerRecord,
    base_date: NaiveDate,
    window_days: i64,
) -> Result<MarketCapSnapshot, SnapshotError> {
    let start = base_date - Duration::days(window_days);
    let end = base_date + Duration::days(window_days);

    let bars = match source.daily_history(&record.ticker, start, end).await {
        Ok(bars) if !bars.is_empty() => bars,
        Ok(_) | Err(MarketDataError::NoData { .. }) => return Err(SnapshotError::NoData),
        Err(e) => return Err(SnapshotError::Fetch(e)),
    };

    let bar = nearest_bar(&bars, base_date).ok_or(SnapshotError::NoData)?;
    // Adjusted, so the base price shares a split basis with today's share count.
    let price = bar
        .adjusted_or_close()
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or(SnapshotError::NoClose { date: bar.date })?;

    let shares = match source.company_profile(&record.ticker).await {
        Ok(profile) => profile.shares(),
        Err(e) => {
            warn!("  Could not look up shares outstanding for {}: {}", record.ticker, e);
            None
        }
    };

    let (market_cap, quality) = match shares {
        Some(shares) => (price * shares, CapQuality::Reported),
        None => {
            warn!("  Warning: Using estimated market cap for {}", record.ticker);
            (price * PLACEHOLDER_SHARES, CapQuality::PlaceholderShares)
        }
    };

    Ok(MarketCapSnapshot {
        ticker: record.ticker.clone(),
        market_cap,
        price,
        date: bar.date,
        company_name: record.company_name.clone(),
        quality,
    })
}

/// Collect base-date snapshots for every ticker, one request at a time.
pub async fn collect_snapshots<S: MarketDataSource + ?Sized>(
    source: &S,
    records: &[TickerRecord],
    base_date: NaiveDate,
    window_days: i64,
) -> SnapshotReport {
    info!("Fetching market caps for {}...", base_date);
    let mut report = SnapshotReport::default();

    for record in records {
        match snapshot_ticker(source, record, base_date, window_days).await {
            Ok(snapshot) => {
                info!("  ✓ {}: ${:.0}", snapshot.ticker, snapshot.market_cap);
                report.snapshots.push(snapshot);
            }
            Err(SnapshotError::NoData) => {
                warn!("  Warning: No data for {} ({})", record.ticker, record.company_name);
                report.failures.push((record.ticker.clone(), SnapshotError::NoData));
            }
            Err(e) => {
                error!("  Error fetching data for {}: {}", record.ticker, e);
                report.failures.push((record.ticker.clone(), e));
            }
        }
    }

    report.snapshots = latest_per_ticker(report.snapshots);
    info!(
        "Successfully retrieved market caps for {} tickers",
        report.snapshots.len()
    );
    if report.placeholder_count() > 0 {
        warn!(
            "{} ticker(s) use the placeholder share count; their weights are not economically meaningful",
            report.placeholder_count()
        );
    }
    report
}

/// `weight[t] = market_cap[t] / Σ market_cap` over the given snapshots.
///
/// A repeated ticker counts once, with its last market cap.
pub fn calculate_weights(snapshots: &[MarketCapSnapshot]) -> Result<WeightMap> {
    if snapshots.is_empty() {
        bail!("No market cap data retrieved");
    }
    let mut caps = WeightMap::new();
    for snapshot in snapshots {
        caps.insert(snapshot.ticker.clone(), snapshot.market_cap);
    }
    let total = caps.total();
    if !(total.is_finite() && total > 0.0) {
        bail!("Total market cap is not positive ({total})");
    }

    info!("Calculating portfolio weights...");
    let mut weights = WeightMap::new();
    for (ticker, cap) in caps.iter() {
        let weight = cap / total;
        info!("  {}: {:.4} ({:.2}%)", ticker, weight, weight * 100.0);
        weights.insert(ticker, weight);
    }
    info!("Total portfolio weight: {:.4}", weights.total());

    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 10, day).unwrap()
    }

    fn snap(ticker: &str, market_cap: f64) -> MarketCapSnapshot {
        MarketCapSnapshot {
            ticker: ticker.into(),
            market_cap,
            price: 10.0,
            date: d(25),
            company_name: format!("{ticker} Inc."),
            quality: CapQuality::Reported,
        }
    }

    #[test]
    fn weights_are_market_cap_shares() {
        let weights = calculate_weights(&[snap("A", 600.0), snap("B", 400.0)]).unwrap();
        assert!((weights.get("A").unwrap() - 0.6).abs() < 1e-12);
        assert!((weights.get("B").unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn repeated_ticker_keeps_last_market_cap() {
        let weights = calculate_weights(&[snap("A", 100.0), snap("B", 200.0), snap("A", 300.0)]).unwrap();
        assert_eq!(weights.tickers(), ["A".to_string(), "B".to_string()]);
        assert!((weights.get("A").unwrap() - 0.6).abs() < 1e-12);
        assert!((weights.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn latest_per_ticker_keeps_first_position() {
        let latest = latest_per_ticker(vec![snap("A", 100.0), snap("B", 200.0), snap("A", 300.0)]);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].ticker, "A");
        assert_eq!(latest[0].market_cap, 300.0);
        assert_eq!(latest[1].ticker, "B");
    }

    #[test]
    fn failures_split_by_kind() {
        let report = SnapshotReport {
            snapshots: Vec::new(),
            failures: vec![
                ("GONE".into(), SnapshotError::NoData),
                (
                    "SLOW".into(),
                    SnapshotError::Fetch(MarketDataError::Status { symbol: "SLOW".into(), status: 503 }),
                ),
                (
                    "BAD".into(),
                    SnapshotError::Fetch(MarketDataError::SymbolNotFound { symbol: "BAD".into() }),
                ),
            ],
        };
        assert_eq!(report.transient_failures(), vec!["SLOW"]);
        report.log_failure_summary();
    }

    #[test]
    fn empty_snapshots_fail() {
        assert!(calculate_weights(&[]).is_err());
    }

    #[test]
    fn nearest_bar_prefers_later_on_tie() {
        let bar = |day| DailyBar { date: d(day), close: Some(1.0), adj_close: None };
        let bars = vec![bar(21), bar(24), bar(26), bar(28)];
        assert_eq!(nearest_bar(&bars, d(25)).unwrap().date, d(26));
        assert_eq!(nearest_bar(&bars, d(23)).unwrap().date, d(24));
        assert_eq!(nearest_bar(&bars, d(27)).unwrap().date, d(28));
        assert!(nearest_bar(&[], d(25)).is_none());
    }

    proptest! {
        #[test]
        fn weights_sum_to_one(caps in prop::collection::vec(1.0e3f64..1.0e13, 1..40)) {
            let snapshots: Vec<_> = caps
                .iter()
                .enumerate()
                .map(|(i, cap)| snap(&format!("T{i}"), *cap))
                .collect();
            let weights = calculate_weights(&snapshots).unwrap();
            prop_assert!((weights.total() - 1.0).abs() < 1e-9);
            prop_assert_eq!(weights.len(), snapshots.len());
        }
    }
}
