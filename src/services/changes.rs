// src/services/changes.rs
use chrono::NaiveDate;
use log::{info, warn};

use crate::models::{MarketCapSnapshot, TickerChange};

use super::market_data::MarketDataSource;

const UNKNOWN_SENTINEL: &str = "Unknown";

/// Compare a stored name against the provider's current name.
///
/// Case-insensitive; no fuzzy matching or legal-suffix handling. A missing
/// current name, or one containing the "Unknown" sentinel, never counts as
/// a change.
pub fn name_change(
    snapshot: &MarketCapSnapshot,
    current_name: Option<&str>,
    detected_on: NaiveDate,
) -> Option<TickerChange> {
    let current = current_name?.trim();
    if current.is_empty() || current.contains(UNKNOWN_SENTINEL) {
        return None;
    }
    if current.to_uppercase() == snapshot.company_name.trim().to_uppercase() {
        return None;
    }
    Some(TickerChange {
        ticker: snapshot.ticker.clone(),
        original_name: snapshot.company_name.clone(),
        current_name: current.to_string(),
        detected_on,
    })
}

/// Re-query each weighted ticker's company name and report any drift.
pub async fn detect_name_changes<S: MarketDataSource + ?Sized>(
    source: &S,
    snapshots: &[MarketCapSnapshot],
    detected_on: NaiveDate,
) -> Vec<TickerChange> {
    info!("Checking for ticker/company name changes...");
    let mut changes = Vec::new();

    for snapshot in snapshots {
        let profile = match source.company_profile(&snapshot.ticker).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("  Could not check {}: {}", snapshot.ticker, e);
                continue;
            }
        };

        if let Some(change) = name_change(snapshot, profile.long_name.as_deref(), detected_on) {
            warn!("  ⚠️ Name change detected for {}:", change.ticker);
            warn!("     Original: {}", change.original_name);
            warn!("     Current:  {}", change.current_name);
            changes.push(change);
        }
    }

    if changes.is_empty() {
        info!("  No ticker/company name changes detected");
    }
    changes
}
