// src/services/downloader.rs
//! Economic reference data: one automated download, two manual sources.

use anyhow::{Context, Result};
use log::{error, info};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::DownloaderConfig;

pub const PCE_CONCORDANCE_URL: &str = "https://www.bls.gov/cex/pce_concordance_2012.xlsx";
pub const CPI_SUPPLEMENTAL_URL: &str = "https://www.bls.gov/cpi/tables/supplemental-files/";
pub const BEA_BENCHMARK_URL: &str =
    "https://www.bea.gov/industry/historical-benchmark-input-output-tables";
pub const BEA_ITABLE_URL: &str = "https://www.bea.gov/itable/input-output";

pub const CPI_YEARS: std::ops::RangeInclusive<i32> = 2000..=2012;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one dataset in the run.
#[derive(Debug)]
pub enum SourceStatus {
    Downloaded { path: PathBuf, bytes: u64 },
    Failed(DownloadError),
    ManualRequired { targets: Vec<PathBuf> },
}

#[derive(Debug)]
pub struct SourceResult {
    pub name: &'static str,
    pub status: SourceStatus,
}

#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub results: Vec<SourceResult>,
}

impl DownloadSummary {
    pub fn automated_total(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !matches!(r.status, SourceStatus::ManualRequired { .. }))
            .count()
    }

    pub fn automated_succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, SourceStatus::Downloaded { .. }))
            .count()
    }

    pub fn manual_required(&self) -> usize {
        self.results.len() - self.automated_total()
    }

    /// Manual target files that are already in place.
    pub fn manual_present(&self) -> Vec<&Path> {
        self.results
            .iter()
            .filter_map(|r| match &r.status {
                SourceStatus::ManualRequired { targets } => Some(targets),
                _ => None,
            })
            .flatten()
            .filter(|p| p.exists())
            .map(|p| p.as_path())
            .collect()
    }
}

/// Create the data directory tree.
pub fn prepare_dirs(config: &DownloaderConfig) -> Result<()> {
    for dir in [config.data_dir.clone(), config.cpi_dir(), config.bea_dir()] {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

pub fn build_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?)
}

/// GET `url` and write the body to `path`. Returns the byte count.
pub async fn download_file(client: &Client, url: &str, path: &Path) -> Result<u64, DownloadError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp.bytes().await?;
    tokio::fs::write(path, &body)
        .await
        .map_err(|source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(body.len() as u64)
}

/// Request failures are recorded and the run goes on; a local write
/// failure is returned as an error.
fn settle(result: Result<u64, DownloadError>, path: PathBuf) -> Result<SourceStatus, DownloadError> {
    match result {
        Ok(bytes) => {
            info!("  ✓ Downloaded successfully ({:.1} KB)", bytes as f64 / 1024.0);
            Ok(SourceStatus::Downloaded { path, bytes })
        }
        Err(e @ DownloadError::Io { .. }) => Err(e),
        Err(e) => {
            error!("  ✗ Failed: {}", e);
            Ok(SourceStatus::Failed(e))
        }
    }
}

pub async fn download_pce_concordance(
    client: &Client,
    config: &DownloaderConfig,
) -> Result<SourceResult, DownloadError> {
    let path = config.data_dir.join("pce_concordance_2012.xlsx");
    info!("Downloading: BLS PCE Concordance 2012");

    let result = download_file(client, PCE_CONCORDANCE_URL, &path).await;
    Ok(SourceResult {
        name: "BLS PCE Concordance 2012",
        status: settle(result, path)?,
    })
}

pub fn cpi_targets(config: &DownloaderConfig) -> Vec<PathBuf> {
    CPI_YEARS
        .map(|year| config.cpi_dir().join(format!("cpi_detailed_december_{year}.xlsx")))
        .collect()
}

pub fn bea_targets(config: &DownloaderConfig) -> Vec<PathBuf> {
    [
        "2007_Commodity_by_Industry_Direct_Requirements.xlsx",
        "2007_PCE_Bridge_NIPA_to_IO.xlsx",
        "2007_PCS_IO_Bridge.xlsx",
    ]
    .iter()
    .map(|f| config.bea_dir().join(f))
    .collect()
}

/// BLS archives the December CPI releases behind pages whose URLs shift,
/// so these are listed for manual download.
pub fn cpi_instructions(config: &DownloaderConfig) -> SourceResult {
    let targets = cpi_targets(config);
    println!("\n{}", "=".repeat(60));
    println!("CPI DETAILED DATA (2000-2012 December Reports)");
    println!("{}", "=".repeat(60));
    println!("\nCPI data typically requires manual download from:");
    println!("{CPI_SUPPLEMENTAL_URL}");
    println!("\nFor each year {}-{}:", CPI_YEARS.start(), CPI_YEARS.end());
    println!("  1. Navigate to the December release");
    println!("  2. Download Table 2 (detailed expenditure categories)");
    println!(
        "  3. Save to: {}",
        config.cpi_dir().join("cpi_detailed_december_YYYY.xlsx").display()
    );

    SourceResult {
        name: "BLS CPI detailed tables",
        status: SourceStatus::ManualRequired { targets },
    }
}

pub fn bea_instructions(config: &DownloaderConfig) -> SourceResult {
    let targets = bea_targets(config);
    let labels = [
        "2007 Commodity-by-Industry Direct Requirements table",
        "2007 PCE Bridge file (NIPA to I-O codes)",
        "2007 PCS-IO Bridge",
    ];
    println!("\n{}", "=".repeat(60));
    println!("BEA 2007 INPUT-OUTPUT TABLES");
    println!("{}", "=".repeat(60));
    println!("\nBEA I-O tables require download from:");
    println!("{BEA_BENCHMARK_URL}");
    println!("\nRequired files:");
    for (i, (label, target)) in labels.iter().zip(&targets).enumerate() {
        println!("  {}. {}", i + 1, label);
        println!("     → Save to: {}", target.display());
    }
    println!("\nAlternatively, use BEA's interactive tool:");
    println!("{BEA_ITABLE_URL}");

    SourceResult {
        name: "BEA 2007 input-output tables",
        status: SourceStatus::ManualRequired { targets },
    }
}

pub fn print_summary(summary: &DownloadSummary, config: &DownloaderConfig) {
    println!("\n{}", "=".repeat(60));
    println!("DOWNLOAD SUMMARY");
    println!("{}", "=".repeat(60));
    println!(
        "Automated downloads completed: {}/{}",
        summary.automated_succeeded(),
        summary.automated_total()
    );
    println!("Manual downloads required: {}", summary.manual_required());
    let present = summary.manual_present();
    if !present.is_empty() {
        println!("Manual files already in place: {}", present.len());
        for path in present {
            println!("  ✓ {}", path.display());
        }
    }
    let data_dir = std::fs::canonicalize(&config.data_dir).unwrap_or_else(|_| config.data_dir.clone());
    println!("\nData directory: {}", data_dir.display());
    println!("{}", "=".repeat(60));
}

/// Run every source in order and print the summary.
pub async fn run(config: &DownloaderConfig) -> Result<DownloadSummary> {
    prepare_dirs(config)?;
    let client = build_client(config)?;
    let mut summary = DownloadSummary::default();

    println!("\n{}", "-".repeat(60));
    println!("1. BLS PCE CONCORDANCE 2012");
    println!("{}", "-".repeat(60));
    summary.results.push(download_pce_concordance(&client, config).await?);
    summary.results.push(cpi_instructions(config));
    summary.results.push(bea_instructions(config));

    print_summary(&summary, config);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(tag: &str) -> DownloaderConfig {
        let dir = std::env::temp_dir().join(format!("econ_data_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        DownloaderConfig::new(dir)
    }

    #[test]
    fn target_paths_cover_every_year_and_file() {
        let config = DownloaderConfig::default();
        let cpi = cpi_targets(&config);
        assert_eq!(cpi.len(), 13);
        assert_eq!(cpi[0], PathBuf::from("Data/CPI/cpi_detailed_december_2000.xlsx"));
        assert_eq!(
            bea_targets(&config)[2],
            PathBuf::from("Data/BEA_IO/2007_PCS_IO_Bridge.xlsx")
        );
    }

    #[test]
    fn prepare_dirs_creates_tree() {
        let config = temp_config("dirs");
        prepare_dirs(&config).unwrap();
        assert!(config.cpi_dir().is_dir());
        assert!(config.bea_dir().is_dir());
        let _ = std::fs::remove_dir_all(&config.data_dir);
    }

    #[test]
    fn summary_counts_manual_and_present_files() {
        let config = temp_config("summary");
        prepare_dirs(&config).unwrap();
        std::fs::write(config.bea_dir().join("2007_PCS_IO_Bridge.xlsx"), b"x").unwrap();

        let summary = DownloadSummary {
            results: vec![
                SourceResult {
                    name: "auto",
                    status: SourceStatus::Downloaded { path: PathBuf::from("a"), bytes: 10 },
                },
                cpi_instructions(&config),
                bea_instructions(&config),
            ],
        };

        assert_eq!(summary.automated_total(), 1);
        assert_eq!(summary.automated_succeeded(), 1);
        assert_eq!(summary.manual_required(), 2);
        assert_eq!(summary.manual_present().len(), 1);
        let _ = std::fs::remove_dir_all(&config.data_dir);
    }

    #[test]
    fn write_failure_aborts_but_http_failure_is_recorded() {
        let path = PathBuf::from("Data/pce_concordance_2012.xlsx");
        let io = DownloadError::Io {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        assert!(matches!(settle(Err(io), path.clone()), Err(DownloadError::Io { .. })));

        let http = DownloadError::Status { url: PCE_CONCORDANCE_URL.into(), status: 404 };
        assert!(matches!(settle(Err(http), path.clone()), Ok(SourceStatus::Failed(_))));
        assert!(matches!(
            settle(Ok(2048), path),
            Ok(SourceStatus::Downloaded { bytes: 2048, .. })
        ));
    }

    #[test]
    fn failed_download_counts_as_automated() {
        let summary = DownloadSummary {
            results: vec![SourceResult {
                name: "auto",
                status: SourceStatus::Failed(DownloadError::Status {
                    url: PCE_CONCORDANCE_URL.into(),
                    status: 403,
                }),
            }],
        };
        assert_eq!(summary.automated_total(), 1);
        assert_eq!(summary.automated_succeeded(), 0);
        assert_eq!(summary.manual_required(), 0);
    }
}
