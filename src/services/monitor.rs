// src/services/monitor.rs
//! The portfolio-monitor pipeline.
//!
//! Each stage takes the previous stage's output and returns its own; nothing
//! is accumulated on a long-lived object.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::path::PathBuf;

use crate::config::{market_today, MonitorConfig};
use crate::models::{MarketCapSnapshot, PortfolioRecord, PriceMatrix, TickerChange, WeightMap};

use super::calculations::{summarize, PerformanceSummary};
use super::changes::detect_name_changes;
use super::chart::save_chart_html;
use super::export::{save_changes_csv, save_portfolio_csv, save_weights_csv};
use super::market_data::MarketDataSource;
use super::returns::{build_records, compute_portfolio_returns, PortfolioReturns};
use super::tickers::load_ticker_list;
use super::weights::{calculate_weights, collect_snapshots, SnapshotError};

/// Everything a completed run produced.
#[derive(Debug)]
pub struct MonitorReport {
    pub snapshots: Vec<MarketCapSnapshot>,
    /// Tickers left out at the base date, with the reason.
    pub skipped: Vec<(String, SnapshotError)>,
    pub weights: WeightMap,
    pub returns: PortfolioReturns,
    pub records: Vec<PortfolioRecord>,
    pub changes: Vec<TickerChange>,
    pub summary: PerformanceSummary,
    pub files: Vec<PathBuf>,
}

/// Fetch the adjusted-close panel for `symbols`, one request per symbol.
///
/// Symbols that fail are logged and left out of the panel.
pub async fn fetch_price_matrix<S: MarketDataSource + ?Sized>(
    source: &S,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> PriceMatrix {
    info!("Fetching portfolio data from {} to {}...", start, end);
    let mut series = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        match source.daily_history(symbol, start, end).await {
            Ok(bars) => {
                let points: Vec<(NaiveDate, f64)> = bars
                    .iter()
                    .filter_map(|b| b.adjusted_or_close().map(|p| (b.date, p)))
                    .collect();
                if points.is_empty() {
                    warn!("  No usable prices for {}", symbol);
                    continue;
                }
                series.push((symbol.clone(), points));
            }
            Err(e) => warn!("  Could not fetch history for {}: {}", symbol, e),
        }
    }

    PriceMatrix::from_series(series)
}

pub async fn run_monitor<S: MarketDataSource + ?Sized>(
    source: &S,
    config: &MonitorConfig,
) -> Result<MonitorReport> {
    run_monitor_on(source, config, market_today()).await
}

/// Full run with an explicit "today" for change detection stamps.
pub async fn run_monitor_on<S: MarketDataSource + ?Sized>(
    source: &S,
    config: &MonitorConfig,
    today: NaiveDate,
) -> Result<MonitorReport> {
    let tickers = load_ticker_list(&config.ticker_file)?;

    let snapshot_report =
        collect_snapshots(source, &tickers, config.base_date, config.snapshot_window_days).await;
    snapshot_report.log_failure_summary();
    let snapshots = snapshot_report.snapshots;
    let skipped = snapshot_report.failures;
    let weights = calculate_weights(&snapshots)?;

    let mut files = Vec::new();
    let weights_path = config.weights_csv();
    save_weights_csv(&weights_path, &weights, &snapshots)?;
    files.push(weights_path);

    let mut symbols = weights.tickers().to_vec();
    if !symbols.contains(&config.benchmark) {
        symbols.push(config.benchmark.clone());
    }
    let prices = fetch_price_matrix(source, &symbols, config.base_date, config.end_date()).await;
    let returns = compute_portfolio_returns(&prices, &weights, &snapshots, &config.benchmark)
        .context("Error computing portfolio returns")?;
    let records = build_records(&prices, &weights, &returns, config.base_value);

    let changes = detect_name_changes(source, &snapshots, today).await;

    save_portfolio_csv(&config.output_csv, &records, config.base_value)?;
    files.push(config.output_csv.clone());
    if let Some(path) = save_changes_csv(&config.changes_csv(), &changes)? {
        files.push(path);
    }

    let summary = summarize(&records, config.base_value, weights.len());
    save_chart_html(&config.chart_html, &records, &summary, &config.benchmark)?;
    files.push(config.chart_html.clone());

    info!("  Fixed Weights Return: {:.2}%", summary.fixed_total_return_pct);
    info!("  Daily Reweighted Return: {:.2}%", summary.reweighted_total_return_pct);
    info!("  {} Return: {:.2}%", config.benchmark, summary.benchmark_total_return_pct);
    info!("  Fixed vs Daily Difference: {:+.2}%", summary.fixed_vs_daily_difference());

    Ok(MonitorReport {
        snapshots,
        skipped,
        weights,
        returns,
        records,
        changes,
        summary,
        files,
    })
}

/// Run and log the banner/file list the way the command-line entry point does.
pub async fn run_and_report<S: MarketDataSource + ?Sized>(
    source: &S,
    config: &MonitorConfig,
) -> Result<MonitorReport> {
    info!("{}", "=".repeat(60));
    info!("PORTFOLIO MONITOR");
    info!("{}", "=".repeat(60));

    let report = match run_monitor(source, config).await {
        Ok(report) => report,
        Err(e) => {
            error!("Run failed: {:#}", e);
            return Err(e);
        }
    };

    info!("{}", "=".repeat(60));
    info!("ANALYSIS COMPLETE!");
    info!("{}", "=".repeat(60));
    info!("Files created:");
    for file in &report.files {
        info!("  • {}", file.display());
    }
    Ok(report)
}
