// src/services/chart.rs
//! Self-contained HTML chart: inline SVG, no scripts or external assets.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use log::info;
use std::path::Path;

use crate::models::PortfolioRecord;

use super::calculations::PerformanceSummary;
use super::export::write_file;

const WIDTH: f64 = 960.0;
const VALUE_HEIGHT: f64 = 420.0;
const RETURN_HEIGHT: f64 = 220.0;
const PADDING: f64 = 48.0;

const FIXED_COLOR: &str = "#2E86AB";
const REWEIGHTED_COLOR: &str = "#A23B72";
const BENCHMARK_COLOR: &str = "#FF6B35";

struct LineSeries<'a> {
    label: &'a str,
    color: &'a str,
    width: f64,
    dash: bool,
    values: Vec<f64>,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn x_positions(n: usize) -> Vec<f64> {
    let inner = WIDTH - 2.0 * PADDING;
    match n {
        0 => Vec::new(),
        1 => vec![PADDING + inner / 2.0],
        _ => (0..n)
            .map(|i| PADDING + inner * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

fn scale(value: f64, min_v: f64, max_v: f64, height: f64) -> f64 {
    let inner = height - 2.0 * PADDING;
    let norm = if max_v > min_v { (value - min_v) / (max_v - min_v) } else { 0.5 };
    PADDING + (1.0 - norm) * inner
}

fn extent<'a>(values: impl Iterator<Item = &'a f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = if include_zero { (0.0, 0.0) } else { (f64::INFINITY, f64::NEG_INFINITY) };
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-9);
    (lo - pad, hi + pad)
}

fn svg_open(height: f64) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {WIDTH} {height}"><style>text{{font-family:Arial,sans-serif;font-size:11px;fill:#555}}</style>"#
    )
}

fn y_axis(svg: &mut String, min_v: f64, max_v: f64, height: f64, unit: &str) {
    for i in 0..=4 {
        let value = min_v + (max_v - min_v) * i as f64 / 4.0;
        let y = scale(value, min_v, max_v, height);
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#eeeeee" stroke-width="1" />"##,
            x1 = PADDING,
            x2 = WIDTH - PADDING,
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{value:.1}{unit}</text>"#,
            x = PADDING - 6.0,
            y = y + 4.0,
        ));
    }
}

fn time_axis(svg: &mut String, dates: &[NaiveDate], xs: &[f64], height: f64) {
    let axis_y = height - PADDING;
    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{axis_y:.2}" x2="{x2:.2}" y2="{axis_y:.2}" stroke="#000" stroke-width="1" />"##,
        x1 = PADDING,
        x2 = WIDTH - PADDING,
    ));

    // One label per quarter keeps multi-year runs readable.
    let mut last: Option<(i32, u32)> = None;
    for (date, x) in dates.iter().zip(xs) {
        let key = (date.year(), (date.month() - 1) / 3);
        if last == Some(key) {
            continue;
        }
        last = Some(key);
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
            y = axis_y + 16.0,
            label = date.format("%Y-%m"),
        ));
    }
}

fn value_panel(dates: &[NaiveDate], series: &[LineSeries]) -> String {
    let height = VALUE_HEIGHT;
    let xs = x_positions(dates.len());
    let (min_v, max_v) = extent(series.iter().flat_map(|s| s.values.iter()), false);

    let mut svg = svg_open(height);
    y_axis(&mut svg, min_v, max_v, height, "");
    for line in series {
        let points = xs
            .iter()
            .zip(&line.values)
            .filter(|(_, v)| v.is_finite())
            .map(|(x, v)| format!("{x:.2},{:.2}", scale(*v, min_v, max_v, height)))
            .collect::<Vec<_>>()
            .join(" ");
        svg.push_str(&format!(
            r#"<polyline fill="none" stroke="{color}" stroke-width="{width}" stroke-dasharray="{dash}" points="{points}" />"#,
            color = line.color,
            width = line.width,
            dash = if line.dash { "6 4" } else { "0" },
        ));
    }

    let mut y = PADDING + 14.0;
    for line in series {
        svg.push_str(&format!(
            r#"<line x1="{x1:.2}" y1="{ly:.2}" x2="{x2:.2}" y2="{ly:.2}" stroke="{color}" stroke-width="2" stroke-dasharray="{dash}" />"#,
            x1 = WIDTH - PADDING - 260.0,
            x2 = WIDTH - PADDING - 236.0,
            ly = y - 4.0,
            color = line.color,
            dash = if line.dash { "6 4" } else { "0" },
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" fill="#333">{label}</text>"##,
            x = WIDTH - PADDING - 230.0,
            label = escape(line.label),
        ));
        y += 16.0;
    }

    time_axis(&mut svg, dates, &xs, height);
    svg.push_str("</svg>");
    svg
}

fn return_panel(dates: &[NaiveDate], returns: &[f64], up: &str, down: &str) -> String {
    let height = RETURN_HEIGHT;
    let xs = x_positions(dates.len());
    let pct: Vec<f64> = returns.iter().map(|r| r * 100.0).collect();
    let (min_v, max_v) = extent(pct.iter(), true);
    let zero = scale(0.0, min_v, max_v, height);
    let bar_width = ((WIDTH - 2.0 * PADDING) / dates.len().max(1) as f64 * 0.8).max(0.5);

    let mut svg = svg_open(height);
    y_axis(&mut svg, min_v, max_v, height, "%");
    for ((x, value), date) in xs.iter().zip(&pct).zip(dates) {
        let y = scale(*value, min_v, max_v, height);
        svg.push_str(&format!(
            r#"<rect x="{bx:.2}" y="{top:.2}" width="{bar_width:.2}" height="{h:.2}" fill="{color}"><title>{date}: {value:.2}%</title></rect>"#,
            bx = x - bar_width / 2.0,
            top = y.min(zero),
            h = (y - zero).abs(),
            color = if *value >= 0.0 { up } else { down },
        ));
    }
    time_axis(&mut svg, dates, &xs, height);
    svg.push_str("</svg>");
    svg
}

fn summary_box(summary: &PerformanceSummary, benchmark: &str) -> String {
    format!(
        r#"<div class="summary"><b>Performance Summary</b><br>
Fixed Weights: {:.1}%<br>
Daily Reweighted: {:.1}%<br>
{bench}: {:.1}%<br><br>
Fixed Weight Vol: {:.1}%<br>
Daily Vol: {:.1}%<br>
{bench} Vol: {:.1}%<br>
Stocks: {}</div>"#,
        summary.fixed_total_return_pct,
        summary.reweighted_total_return_pct,
        summary.benchmark_total_return_pct,
        summary.fixed_volatility_pct,
        summary.reweighted_volatility_pct,
        summary.benchmark_volatility_pct,
        summary.stocks,
        bench = escape(benchmark),
    )
}

/// Render the three-panel performance chart as a complete HTML document.
pub fn render_chart_html(
    records: &[PortfolioRecord],
    summary: &PerformanceSummary,
    benchmark: &str,
) -> String {
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
    let benchmark_label = format!("Benchmark ({benchmark})");
    let series = [
        LineSeries {
            label: "Portfolio (Fixed Weights)",
            color: FIXED_COLOR,
            width: 3.0,
            dash: false,
            values: records.iter().map(|r| r.fixed_cumulative_value).collect(),
        },
        LineSeries {
            label: "Portfolio (Daily Reweighted)",
            color: REWEIGHTED_COLOR,
            width: 3.0,
            dash: false,
            values: records.iter().map(|r| r.reweighted_cumulative_value).collect(),
        },
        LineSeries {
            label: &benchmark_label,
            color: BENCHMARK_COLOR,
            width: 2.0,
            dash: true,
            values: records.iter().map(|r| r.benchmark_cumulative_value).collect(),
        },
    ];
    let fixed: Vec<f64> = records.iter().map(|r| r.fixed_daily_return).collect();
    let reweighted: Vec<f64> = records.iter().map(|r| r.reweighted_daily_return).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Portfolio Performance</title>
<style>
body{{font-family:Arial,sans-serif;margin:24px auto;max-width:1000px;color:#222}}
h1{{text-align:center;font-size:22px;margin-bottom:2px}}
.sub{{text-align:center;color:#777;margin-bottom:18px}}
.panel-title{{font-weight:bold;margin:18px 0 4px}}
.summary{{float:right;border:1px solid #999;background:#fff;padding:8px 12px;font-size:12px;line-height:1.5}}
</style>
</head>
<body>
<h1>Portfolio Performance</h1>
<div class="sub">Fixed weights vs daily rebalancing comparison</div>
{summary}
<div class="panel-title">Portfolio Cumulative Value</div>
{values}
<div class="panel-title">Fixed-Weight Portfolio Daily Returns</div>
{fixed}
<div class="panel-title">Daily Reweighted Portfolio Daily Returns</div>
{reweighted}
</body>
</html>
"#,
        summary = summary_box(summary, benchmark),
        values = value_panel(&dates, &series),
        fixed = return_panel(&dates, &fixed, "green", "red"),
        reweighted = return_panel(&dates, &reweighted, "#2E8B57", "#DC143C"),
    )
}

pub fn save_chart_html(
    path: &Path,
    records: &[PortfolioRecord],
    summary: &PerformanceSummary,
    benchmark: &str,
) -> Result<()> {
    info!("Creating chart: {}", path.display());
    let html = render_chart_html(records, summary, benchmark);
    write_file(path, &html)?;
    info!("Chart saved as {}", path.display());
    Ok(())
}
