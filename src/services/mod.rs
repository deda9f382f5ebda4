// src/services/mod.rs
pub mod calculations;
pub mod changes;
pub mod chart;
pub mod downloader;
pub mod export;
pub mod market_data;
pub mod monitor;
pub mod returns;
pub mod tickers;
pub mod weights;
pub mod yahoo;
