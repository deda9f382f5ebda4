// src/bin/download_economic_data.rs
use ai_portfolio_monitor::config::DownloaderConfig;
use ai_portfolio_monitor::init_logging;
use ai_portfolio_monitor::services::downloader;
use log::error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    println!("{}", "=".repeat(60));
    println!("ECONOMIC DATA DOWNLOAD SCRIPT");
    println!("{}", "=".repeat(60));

    let config = DownloaderConfig::default();

    tokio::select! {
        result = downloader::run(&config) => match result {
            // Manual steps and a failed request still exit 0.
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nDownload interrupted by user.");
            ExitCode::FAILURE
        }
    }
}
