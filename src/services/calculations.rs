// src/services/calculations.rs
use serde::Serialize;
use log::warn;
use crate::models::PortfolioRecord;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub fixed_total_return_pct: f64,
    pub reweighted_total_return_pct: f64,
    pub benchmark_total_return_pct: f64,
    pub fixed_volatility_pct: f64,
    pub reweighted_volatility_pct: f64,
    pub benchmark_volatility_pct: f64,
    pub trading_days: usize,
    pub stocks: usize,
}

impl PerformanceSummary {
    /// Reweighted minus fixed total return, in percentage points.
    pub fn fixed_vs_daily_difference(&self) -> f64 {
        self.reweighted_total_return_pct - self.fixed_total_return_pct
    }
}

fn calculate_average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = calculate_average(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn total_return_pct(last_value: Option<f64>, base_value: f64) -> f64 {
    match last_value {
        Some(v) if base_value > 0.0 => (v / base_value - 1.0) * 100.0,
        _ => 0.0,
    }
}

pub fn annualized_volatility_pct(daily_returns: &[f64]) -> f64 {
    sample_std(daily_returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}

pub fn summarize(records: &[PortfolioRecord], base_value: f64, stocks: usize) -> PerformanceSummary {
    if records.len() < 2 {
        warn!("Only {} trading day(s); volatility figures will read as zero", records.len());
    }

    let last = records.last();
    let fixed: Vec<f64> = records.iter().map(|r| r.fixed_daily_return).collect();
    let reweighted: Vec<f64> = records.iter().map(|r| r.reweighted_daily_return).collect();
    let benchmark: Vec<f64> = records.iter().map(|r| r.benchmark_daily_return).collect();

    PerformanceSummary {
        fixed_total_return_pct: total_return_pct(last.map(|r| r.fixed_cumulative_value), base_value),
        reweighted_total_return_pct: total_return_pct(
            last.map(|r| r.reweighted_cumulative_value),
            base_value,
        ),
        benchmark_total_return_pct: total_return_pct(
            last.map(|r| r.benchmark_cumulative_value),
            base_value,
        ),
        fixed_volatility_pct: annualized_volatility_pct(&fixed),
        reweighted_volatility_pct: annualized_volatility_pct(&reweighted),
        benchmark_volatility_pct: annualized_volatility_pct(&benchmark),
        trading_days: records.len(),
        stocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(day: u32, r: f64, value: f64) -> PortfolioRecord {
        PortfolioRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            fixed_daily_return: r,
            fixed_cumulative_value: value,
            reweighted_daily_return: r,
            reweighted_cumulative_value: value,
            benchmark_daily_return: 0.0,
            benchmark_cumulative_value: 100.0,
            tickers: Vec::new(),
        }
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        let std = sample_std(&[0.01, -0.01]);
        assert!((std - 0.0002f64.sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[0.5]), 0.0);
    }

    #[test]
    fn summary_reports_total_returns() {
        let records = vec![record(2, 0.01, 101.0), record(3, -0.02, 98.98)];
        let summary = summarize(&records, 100.0, 2);

        assert!((summary.fixed_total_return_pct - -1.02).abs() < 1e-9);
        assert_eq!(summary.benchmark_total_return_pct, 0.0);
        assert_eq!(summary.benchmark_volatility_pct, 0.0);
        assert!(summary.fixed_volatility_pct > 0.0);
        assert_eq!(summary.fixed_vs_daily_difference(), 0.0);
        assert_eq!(summary.trading_days, 2);
    }

    #[test]
    fn empty_records_summarize_to_zero() {
        let summary = summarize(&[], 100.0, 0);
        assert_eq!(summary.fixed_total_return_pct, 0.0);
        assert_eq!(summary.fixed_volatility_pct, 0.0);
    }
}
