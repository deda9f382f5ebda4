// src/config.rs
use chrono::{NaiveDate, Utc};
use chrono_tz::America::New_York;
use std::path::{Path, PathBuf};

pub const DEFAULT_TICKER_FILE: &str = "tickerlist.txt";
pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_OUTPUT_CSV: &str = "ai_portfolio_data.csv";
pub const DEFAULT_CHART_HTML: &str = "ai_portfolio_chart.html";
pub const DEFAULT_BASE_VALUE: f64 = 100.0;
/// Days either side of the base date searched for the nearest trading day.
pub const DEFAULT_SNAPSHOT_WINDOW_DAYS: i64 = 7;

pub fn default_base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 10, 25).unwrap_or_default()
}

/// Today's date on the exchange calendar.
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub ticker_file: PathBuf,
    pub base_date: NaiveDate,
    /// Last date of the price history. `None` means today.
    pub end_date: Option<NaiveDate>,
    pub benchmark: String,
    pub base_value: f64,
    pub snapshot_window_days: i64,
    pub output_csv: PathBuf,
    pub chart_html: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            ticker_file: PathBuf::from(DEFAULT_TICKER_FILE),
            base_date: default_base_date(),
            end_date: None,
            benchmark: DEFAULT_BENCHMARK.to_string(),
            base_value: DEFAULT_BASE_VALUE,
            snapshot_window_days: DEFAULT_SNAPSHOT_WINDOW_DAYS,
            output_csv: PathBuf::from(DEFAULT_OUTPUT_CSV),
            chart_html: PathBuf::from(DEFAULT_CHART_HTML),
        }
    }
}

impl MonitorConfig {
    pub fn new(ticker_file: impl Into<PathBuf>, base_date: NaiveDate) -> Self {
        MonitorConfig {
            ticker_file: ticker_file.into(),
            base_date,
            ..Default::default()
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_benchmark(mut self, benchmark: impl Into<String>) -> Self {
        self.benchmark = benchmark.into();
        self
    }

    /// Places the CSV dataset and the chart in `dir`, keeping their file names.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.output_csv = dir.join(file_name_or(&self.output_csv, DEFAULT_OUTPUT_CSV));
        self.chart_html = dir.join(file_name_or(&self.chart_html, DEFAULT_CHART_HTML));
        self
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(market_today)
    }

    pub fn weights_csv(&self) -> PathBuf {
        sibling_with_suffix(&self.output_csv, "_weights")
    }

    pub fn changes_csv(&self) -> PathBuf {
        sibling_with_suffix(&self.output_csv, "_changes")
    }
}

fn file_name_or<'a>(path: &'a Path, fallback: &'a str) -> &'a std::ffi::OsStr {
    path.file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(fallback))
}

/// `data.csv` -> `data_weights.csv`, next to the original.
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    path.with_file_name(format!("{stem}{suffix}.{ext}"))
}

#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub data_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        DownloaderConfig {
            data_dir: PathBuf::from("Data"),
            timeout_secs: 30,
        }
    }
}

impl DownloaderConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        DownloaderConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn cpi_dir(&self) -> PathBuf {
        self.data_dir.join("CPI")
    }

    pub fn bea_dir(&self) -> PathBuf {
        self.data_dir.join("BEA_IO")
    }
}
