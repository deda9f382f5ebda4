// src/services/yahoo.rs
//! Yahoo Finance client.
//!
//! History comes from the v8 chart endpoint. Share counts come from
//! quoteSummary, which needs a session cookie plus a crumb token; both are
//! fetched lazily on the first profile lookup and reused for the run.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::market_data::{CompanyProfile, DailyBar, MarketDataError, MarketDataSource};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<SummaryData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryData {
    price: Option<PriceModule>,
    default_key_statistics: Option<KeyStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    shares_outstanding: Option<RawValue>,
    implied_shares_outstanding: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

pub struct YahooClient {
    client: Client,
    crumb: OnceCell<String>,
}

impl YahooClient {
    pub fn new() -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            crumb: OnceCell::new(),
        })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp();
        let end_ts = end.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc().timestamp();
        format!(
            "{CHART_URL}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d&includeAdjustedClose=true",
            symbol = encode_symbol(symbol)
        )
    }

    async fn crumb(&self) -> Result<&str, MarketDataError> {
        let crumb = self
            .crumb
            .get_or_try_init(|| async {
                // fc.yahoo.com answers 404 but still sets the session cookie.
                let _ = self.client.get(COOKIE_URL).send().await?;
                let crumb = self.client.get(CRUMB_URL).send().await?.text().await?;
                let crumb = crumb.trim().to_string();
                if crumb.is_empty() || crumb.contains('<') {
                    return Err(MarketDataError::ResponseFormat(
                        "crumb endpoint returned no token".into(),
                    ));
                }
                debug!("Obtained Yahoo crumb");
                Ok(crumb)
            })
            .await?;
        Ok(crumb.as_str())
    }
}

fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E")
}

fn api_error(symbol: &str, err: Option<ApiError>) -> MarketDataError {
    match err {
        Some(e) if e.code == "Not Found" => MarketDataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(e) => MarketDataError::ResponseFormat(format!("{}: {}", e.code, e.description)),
        None => MarketDataError::ResponseFormat("empty result with no error".into()),
    }
}

fn check_status(symbol: &str, status: StatusCode) -> Result<(), MarketDataError> {
    if status == StatusCode::NOT_FOUND {
        return Err(MarketDataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    if !status.is_success() {
        return Err(MarketDataError::Status {
            symbol: symbol.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

fn parse_chart(
    symbol: &str,
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyBar>, MarketDataError> {
    let data = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| api_error(symbol, resp.chart.error))?;

    let gmtoffset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = data.timestamp.unwrap_or_default();
    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        // Bars are stamped at the open; dates follow the exchange's calendar.
        let date = DateTime::from_timestamp(*ts + gmtoffset, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| MarketDataError::ResponseFormat(format!("invalid timestamp: {ts}")))?;
        if date < start || date > end {
            continue;
        }
        let close = closes.get(i).copied().flatten();
        let adj_close = adj_closes.get(i).copied().flatten();
        if close.is_none() && adj_close.is_none() {
            continue;
        }
        bars.push(DailyBar { date, close, adj_close });
    }

    if bars.is_empty() {
        return Err(MarketDataError::NoData {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}

fn parse_summary(symbol: &str, resp: SummaryResponse) -> Result<CompanyProfile, MarketDataError> {
    let data = resp
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| api_error(symbol, resp.quote_summary.error))?;

    let long_name = data
        .price
        .and_then(|p| p.long_name.or(p.short_name))
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let stats = data.default_key_statistics;
    let shares_outstanding = stats
        .as_ref()
        .and_then(|s| s.shares_outstanding.as_ref())
        .and_then(|v| v.raw);
    let implied_shares_outstanding = stats
        .as_ref()
        .and_then(|s| s.implied_shares_outstanding.as_ref())
        .and_then(|v| v.raw);

    Ok(CompanyProfile {
        long_name,
        shares_outstanding,
        implied_shares_outstanding,
    })
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketDataError> {
        let url = Self::chart_url(symbol, start, end);
        debug!("Fetching chart data from URL: {}", url);

        let resp = self.client.get(&url).send().await?;
        check_status(symbol, resp.status())?;
        let chart: ChartResponse = resp.json().await.map_err(|e| {
            MarketDataError::ResponseFormat(format!("failed to parse chart for {symbol}: {e}"))
        })?;

        parse_chart(symbol, chart, start, end)
    }

    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, MarketDataError> {
        let crumb = self.crumb().await?;
        let url = format!("{SUMMARY_URL}/{}", encode_symbol(symbol));
        info!("Fetching company profile for {}", symbol);

        let resp = self
            .client
            .get(&url)
            .query(&[("modules", "price,defaultKeyStatistics"), ("crumb", crumb)])
            .send()
            .await?;
        check_status(symbol, resp.status())?;
        let summary: SummaryResponse = resp.json().await.map_err(|e| {
            MarketDataError::ResponseFormat(format!("failed to parse summary for {symbol}: {e}"))
        })?;

        parse_summary(symbol, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn chart_url_encodes_index_symbols() {
        let url = YahooClient::chart_url("^GSPC", d(2022, 10, 25), d(2022, 10, 26));
        assert!(url.starts_with(
            "https://query2.finance.yahoo.com/v8/finance/chart/%5EGSPC?period1=1666656000&"
        ));
        assert!(url.contains("interval=1d"));
    }

    #[test]
    fn parses_chart_and_skips_empty_bars() {
        let body = r#"{"chart":{"result":[{
            "meta":{"symbol":"AAPL","longName":"Apple Inc."},
            "timestamp":[1666704600,1666791000,1666877400],
            "indicators":{
                "quote":[{"open":[1,1,1],"close":[152.34,null,144.8]}],
                "adjclose":[{"adjclose":[150.9,null,143.4]}]
            }}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let bars = parse_chart("AAPL", resp, d(2022, 10, 1), d(2022, 10, 31)).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2022, 10, 25));
        assert_eq!(bars[0].adjusted_or_close(), Some(150.9));
        assert_eq!(bars[1].close, Some(144.8));
    }

    #[test]
    fn bar_dates_use_exchange_offset() {
        // ASX open on 2024-01-02 is 23:00 UTC the day before.
        let body = r#"{"chart":{"result":[{
            "meta":{"symbol":"BHP.AX","gmtoffset":39600},
            "timestamp":[1704150000],
            "indicators":{"quote":[{"close":[45.1]}],"adjclose":[{"adjclose":[44.2]}]}
            }],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let bars = parse_chart("BHP.AX", resp, d(2024, 1, 1), d(2024, 1, 5)).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2024, 1, 2));
    }

    #[test]
    fn empty_chart_is_no_data() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let err = parse_chart("ZZZZ", resp, d(2022, 10, 1), d(2022, 10, 31)).unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { .. }));
    }

    #[test]
    fn chart_not_found_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let err = parse_chart("GONE", resp, d(2022, 10, 1), d(2022, 10, 31)).unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound { .. }));
    }

    #[test]
    fn parses_summary_modules() {
        let body = r#"{"quoteSummary":{"result":[{
            "price":{"longName":"NVIDIA Corporation","shortName":"NVIDIA Corp"},
            "defaultKeyStatistics":{
                "sharesOutstanding":{"raw":24490000000,"fmt":"24.49B"},
                "impliedSharesOutstanding":{"raw":24600000000,"fmt":"24.6B"}
            }}],"error":null}}"#;
        let resp: SummaryResponse = serde_json::from_str(body).unwrap();
        let profile = parse_summary("NVDA", resp).unwrap();

        assert_eq!(profile.long_name.as_deref(), Some("NVIDIA Corporation"));
        assert_eq!(profile.shares(), Some(24_490_000_000.0));
    }

    #[test]
    fn summary_without_statistics_has_no_shares() {
        let body = r#"{"quoteSummary":{"result":[{"price":{"shortName":"Some ETF"}}],"error":null}}"#;
        let resp: SummaryResponse = serde_json::from_str(body).unwrap();
        let profile = parse_summary("ETF", resp).unwrap();

        assert_eq!(profile.long_name.as_deref(), Some("Some ETF"));
        assert_eq!(profile.shares(), None);
    }
}
