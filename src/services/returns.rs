// src/services/returns.rs
//! Fixed-weight and daily-reweighted portfolio returns.
//!
//! Fixed weights come from the base date and never change. The reweighted
//! portfolio re-derives weights every day from the previous close times the
//! share count implied by the base-date snapshot.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashMap;

use crate::models::{
    MarketCapSnapshot, PortfolioRecord, PriceMatrix, ReturnSeries, TickerDay, WeightMap,
    PLACEHOLDER_SHARES,
};

/// Daily return series produced by the engine, aligned on `dates`.
#[derive(Debug, Clone, Default)]
pub struct PortfolioReturns {
    pub dates: Vec<NaiveDate>,
    pub fixed: Vec<f64>,
    pub reweighted: Vec<f64>,
    pub benchmark: Vec<f64>,
    /// Weights applied by the reweighted portfolio on each date.
    pub daily_weights: Vec<WeightMap>,
}

/// Σ `weight × return` over tickers with a return on `row`.
///
/// Tickers without a return that day contribute nothing and the remaining
/// weights are not renormalised, so exposure shrinks on days with gaps.
pub fn weighted_return(returns: &ReturnSeries, row: usize, weights: &WeightMap) -> f64 {
    weights
        .iter()
        .filter_map(|(ticker, weight)| returns.get(ticker, row).map(|r| weight * r))
        .sum()
}

pub fn fixed_weight_returns(returns: &ReturnSeries, weights: &WeightMap) -> Vec<f64> {
    (0..returns.len())
        .map(|row| weighted_return(returns, row, weights))
        .collect()
}

/// Implied share count per ticker: base market cap over base price.
pub fn implied_shares(snapshots: &[MarketCapSnapshot]) -> HashMap<String, f64> {
    snapshots
        .iter()
        .map(|s| (s.ticker.clone(), s.implied_shares()))
        .collect()
}

/// Weights from estimated market caps at price row `price_row`.
///
/// Only tickers with a price on that row take part; the rest are absent from
/// the returned map.
pub fn market_cap_weights_at(
    prices: &PriceMatrix,
    price_row: usize,
    tickers: &[String],
    shares: &HashMap<String, f64>,
) -> WeightMap {
    let caps: Vec<(&String, f64)> = tickers
        .iter()
        .filter_map(|t| {
            let price = prices.price(t, price_row)?;
            let shares = shares.get(t).copied().unwrap_or(PLACEHOLDER_SHARES);
            Some((t, price * shares))
        })
        .collect();
    let total: f64 = caps.iter().map(|(_, cap)| cap).sum();

    let mut weights = WeightMap::new();
    if total > 0.0 {
        for (ticker, cap) in caps {
            weights.insert(ticker.clone(), cap / total);
        }
    }
    weights
}

/// Daily-reweighted returns and the weights used on each date.
///
/// Return row 0 uses `base_weights` as-is. Return row `i > 0` uses weights
/// from price row `i`, which is the trading day before return date `i`.
pub fn reweighted_returns(
    prices: &PriceMatrix,
    returns: &ReturnSeries,
    base_weights: &WeightMap,
    snapshots: &[MarketCapSnapshot],
) -> (Vec<f64>, Vec<WeightMap>) {
    let shares = implied_shares(snapshots);
    let tickers = base_weights.tickers();

    let mut daily_returns = Vec::with_capacity(returns.len());
    let mut daily_weights = Vec::with_capacity(returns.len());
    for row in 0..returns.len() {
        let weights = if row == 0 {
            base_weights.clone()
        } else {
            market_cap_weights_at(prices, row, tickers, &shares)
        };
        daily_returns.push(weighted_return(returns, row, &weights));
        daily_weights.push(weights);
    }
    (daily_returns, daily_weights)
}

/// Running product of `(1 + r)`, unscaled.
pub fn cumulative_growth(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// Running product of `(1 + r)` scaled to start at `base_value`.
pub fn cumulative_values(returns: &[f64], base_value: f64) -> Vec<f64> {
    cumulative_growth(returns)
        .into_iter()
        .map(|g| g * base_value)
        .collect()
}

/// Run both portfolios and the benchmark over `prices`.
pub fn compute_portfolio_returns(
    prices: &PriceMatrix,
    weights: &WeightMap,
    snapshots: &[MarketCapSnapshot],
    benchmark: &str,
) -> Result<PortfolioReturns> {
    if prices.is_empty() {
        bail!("No price data available");
    }
    let returns = ReturnSeries::from_prices(prices);
    if returns.is_empty() {
        bail!("Need at least two trading days to compute returns");
    }

    let fixed = fixed_weight_returns(&returns, weights);
    let (reweighted, daily_weights) = reweighted_returns(prices, &returns, weights, snapshots);

    if !prices.has_symbol(benchmark) {
        warn!("Benchmark {} has no price data; its returns will read as zero", benchmark);
    }
    let mut benchmark_weights = WeightMap::new();
    benchmark_weights.insert(benchmark, 1.0);
    let benchmark = fixed_weight_returns(&returns, &benchmark_weights);

    info!("Portfolio returns calculated for {} trading days", returns.len());
    Ok(PortfolioReturns {
        dates: returns.dates.clone(),
        fixed,
        reweighted,
        benchmark,
        daily_weights,
    })
}

/// One record per return date, with per-ticker price/return for every
/// weighted ticker present in the price panel.
pub fn build_records(
    prices: &PriceMatrix,
    weights: &WeightMap,
    series: &PortfolioReturns,
    base_value: f64,
) -> Vec<PortfolioRecord> {
    let returns = ReturnSeries::from_prices(prices);
    let fixed_values = cumulative_values(&series.fixed, base_value);
    let reweighted_values = cumulative_values(&series.reweighted, base_value);
    let benchmark_values = cumulative_values(&series.benchmark, base_value);
    let tickers: Vec<&String> = weights
        .tickers()
        .iter()
        .filter(|t| prices.has_symbol(t))
        .collect();

    series
        .dates
        .iter()
        .enumerate()
        .map(|(row, date)| PortfolioRecord {
            date: *date,
            fixed_daily_return: series.fixed[row],
            fixed_cumulative_value: fixed_values[row],
            reweighted_daily_return: series.reweighted[row],
            reweighted_cumulative_value: reweighted_values[row],
            benchmark_daily_return: series.benchmark[row],
            benchmark_cumulative_value: benchmark_values[row],
            tickers: tickers
                .iter()
                .map(|t| TickerDay {
                    ticker: (*t).clone(),
                    price: prices.price(t, row + 1),
                    daily_return: returns.get(t, row),
                })
                .collect(),
        })
        .collect()
}
