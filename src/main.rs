use ai_portfolio_monitor::config::MonitorConfig;
use ai_portfolio_monitor::init_logging;
use ai_portfolio_monitor::services::monitor::run_and_report;
use ai_portfolio_monitor::services::yahoo::YahooClient;
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    info!("Logger initialized. Starting the portfolio monitor...");

    let config = MonitorConfig::default();
    let client = match YahooClient::new() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = run_and_report(&client, &config) => match result {
            Ok(_) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        },
        _ = tokio::signal::ctrl_c() => {
            error!("Run interrupted by user.");
            ExitCode::FAILURE
        }
    }
}
