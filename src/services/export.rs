// src/services/export.rs
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::models::{MarketCapSnapshot, PortfolioRecord, TickerChange, WeightMap};

const PORTFOLIO_COLUMNS: [&str; 10] = [
    "date",
    "daily_return",
    "cumulative_return",
    "portfolio_value",
    "daily_weighted_return",
    "daily_weighted_cumulative",
    "daily_weighted_value",
    "benchmark_daily_return",
    "benchmark_cumulative_return",
    "benchmark_value",
];

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Main dataset: one row per trading day, then `<T>_price`/`<T>_return`
/// columns for every ticker present in the first record.
pub fn export_portfolio_csv(records: &[PortfolioRecord], base_value: f64) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let tickers: Vec<&str> = records
        .first()
        .map(|r| r.tickers.iter().map(|t| t.ticker.as_str()).collect())
        .unwrap_or_default();

    let mut header: Vec<String> = PORTFOLIO_COLUMNS.iter().map(|c| c.to_string()).collect();
    for ticker in &tickers {
        header.push(format!("{ticker}_price"));
        header.push(format!("{ticker}_return"));
    }
    wtr.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.date.format("%Y-%m-%d").to_string(),
            record.fixed_daily_return.to_string(),
            (record.fixed_cumulative_value / base_value).to_string(),
            record.fixed_cumulative_value.to_string(),
            record.reweighted_daily_return.to_string(),
            (record.reweighted_cumulative_value / base_value).to_string(),
            record.reweighted_cumulative_value.to_string(),
            record.benchmark_daily_return.to_string(),
            (record.benchmark_cumulative_value / base_value).to_string(),
            record.benchmark_cumulative_value.to_string(),
        ];
        for day in &record.tickers {
            row.push(opt(day.price));
            row.push(opt(day.daily_return));
        }
        wtr.write_record(&row)?;
    }

    finish(wtr)
}

/// `ticker, weight, company_name, data_quality` in weight order.
pub fn export_weights_csv(weights: &WeightMap, snapshots: &[MarketCapSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "weight", "company_name", "data_quality"])?;

    for (ticker, weight) in weights.iter() {
        let snapshot = snapshots.iter().find(|s| s.ticker == ticker);
        wtr.write_record([
            ticker.to_string(),
            weight.to_string(),
            snapshot.map(|s| s.company_name.clone()).unwrap_or_default(),
            snapshot.map(|s| s.quality.to_string()).unwrap_or_default(),
        ])?;
    }

    finish(wtr)
}

pub fn export_changes_csv(changes: &[TickerChange]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for change in changes {
        wtr.serialize(change)?;
    }
    if changes.is_empty() {
        wtr.write_record(["ticker", "original_name", "current_name", "change_detected"])?;
    }
    finish(wtr)
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

pub fn save_portfolio_csv(path: &Path, records: &[PortfolioRecord], base_value: f64) -> Result<()> {
    info!("Saving portfolio data to {}...", path.display());
    write_file(path, &export_portfolio_csv(records, base_value)?)
}

pub fn save_weights_csv(path: &Path, weights: &WeightMap, snapshots: &[MarketCapSnapshot]) -> Result<()> {
    write_file(path, &export_weights_csv(weights, snapshots)?)?;
    info!("  - Weights: {}", path.display());
    Ok(())
}

/// Writes the changes file only when there is something to report.
pub fn save_changes_csv(path: &Path, changes: &[TickerChange]) -> Result<Option<PathBuf>> {
    if changes.is_empty() {
        return Ok(None);
    }
    write_file(path, &export_changes_csv(changes)?)?;
    info!("Ticker changes saved to {}", path.display());
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapQuality, TickerDay};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn record(day: u32) -> PortfolioRecord {
        PortfolioRecord {
            date: date(day),
            fixed_daily_return: 0.01,
            fixed_cumulative_value: 101.0,
            reweighted_daily_return: 0.02,
            reweighted_cumulative_value: 102.0,
            benchmark_daily_return: 0.0,
            benchmark_cumulative_value: 100.0,
            tickers: vec![
                TickerDay { ticker: "AAA".into(), price: Some(10.5), daily_return: Some(0.05) },
                TickerDay { ticker: "BBB".into(), price: None, daily_return: None },
            ],
        }
    }

    #[test]
    fn portfolio_csv_layout() {
        let csv = export_portfolio_csv(&[record(5), record(6)], 100.0).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "date,daily_return,cumulative_return,portfolio_value,daily_weighted_return,\
daily_weighted_cumulative,daily_weighted_value,benchmark_daily_return,\
benchmark_cumulative_return,benchmark_value,AAA_price,AAA_return,BBB_price,BBB_return"
        );
        assert_eq!(lines[1], "2024-02-05,0.01,1.01,101,0.02,1.02,102,0,1,100,10.5,0.05,,");
    }

    #[test]
    fn empty_dataset_has_header_only() {
        let csv = export_portfolio_csv(&[], 100.0).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn weights_csv_flags_placeholder_caps() {
        let mut weights = WeightMap::new();
        weights.insert("AAA", 0.75);
        weights.insert("BBB", 0.25);
        let snapshots = vec![
            MarketCapSnapshot {
                ticker: "AAA".into(),
                market_cap: 3.0,
                price: 1.0,
                date: date(1),
                company_name: "Triple A, Inc.".into(),
                quality: CapQuality::Reported,
            },
            MarketCapSnapshot {
                ticker: "BBB".into(),
                market_cap: 1.0,
                price: 1.0,
                date: date(1),
                company_name: "Double B".into(),
                quality: CapQuality::PlaceholderShares,
            },
        ];
        let csv = export_weights_csv(&weights, &snapshots).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "ticker,weight,company_name,data_quality");
        assert_eq!(lines[1], "AAA,0.75,\"Triple A, Inc.\",reported");
        assert_eq!(lines[2], "BBB,0.25,Double B,placeholder_shares");
    }

    #[test]
    fn changes_csv_columns() {
        let changes = vec![TickerChange {
            ticker: "META".into(),
            original_name: "Facebook".into(),
            current_name: "Meta Platforms".into(),
            detected_on: date(9),
        }];
        let csv = export_changes_csv(&changes).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "ticker,original_name,current_name,change_detected");
        assert_eq!(lines[1], "META,Facebook,Meta Platforms,2024-02-09");
    }

    #[test]
    fn no_changes_writes_no_file() {
        let path = std::env::temp_dir().join(format!("no_changes_{}.csv", std::process::id()));
        assert!(save_changes_csv(&path, &[]).unwrap().is_none());
        assert!(!path.exists());
    }
}
