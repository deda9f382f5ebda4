// src/lib.rs

// Re-export or define the top-level modules you need
pub mod config;
pub mod models;
pub mod services;

/// Initialise `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logging() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
