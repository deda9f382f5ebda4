// src/services/tickers.rs
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::{info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::models::TickerRecord;

/// Load `ticker<TAB>company_name` lines (no header) from `path`.
pub fn load_ticker_list(path: &Path) -> Result<Vec<TickerRecord>> {
    info!("Loading ticker list from {}...", path.display());
    let file = std::fs::File::open(path)
        .with_context(|| format!("Error loading ticker list {}", path.display()))?;
    let records = parse_ticker_list(file)?;
    info!("Successfully loaded {} tickers", records.len());
    Ok(records)
}

pub fn parse_ticker_list<R: Read>(reader: R) -> Result<Vec<TickerRecord>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let symbol_re = Regex::new(r"^[A-Za-z0-9.\-^=]+$")?;
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (line, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("Malformed ticker list line {}", line + 1))?;
        let ticker = row.get(0).unwrap_or("").to_string();
        if ticker.is_empty() {
            continue;
        }
        if !symbol_re.is_match(&ticker) {
            warn!("Line {}: '{}' does not look like a ticker symbol", line + 1, ticker);
        }
        if !seen.insert(ticker.clone()) {
            warn!("Duplicate ticker {} on line {}; its last market cap will be used", ticker, line + 1);
        }
        let company_name = row.get(1).unwrap_or("").to_string();
        records.push(TickerRecord { ticker, company_name });
    }

    Ok(records)
}
