//! CLI command implementations

pub mod account;
pub mod card;
pub mod debt;
pub mod doctor;
pub mod import;
pub mod inbox;
pub mod logs;
pub mod status;
pub mod tx;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use moneta_core::services::{EntryPoint, LogEvent, LoggingService};
use moneta_core::MonetaContext;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Log a core failure under `event`, then hand the error back
pub fn log_failure(logger: &Option<LoggingService>, event: &str, command: &str, error: moneta_core::Error) -> anyhow::Error {
    log_event(
        logger,
        LogEvent::new(event).with_command(command).with_core_error(&error),
    );
    error.into()
}

/// Get the moneta data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("MONETA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".moneta"))
        .ok_or_else(|| anyhow!("Could not find home directory; set MONETA_DIR"))
}

/// Open the ledger in the data directory
pub fn get_context() -> Result<MonetaContext> {
    let data_dir = get_data_dir()?;
    MonetaContext::new(&data_dir).context("Failed to initialize moneta context")
}

pub fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).with_context(|| format!("Invalid id: {}", value))
}

pub fn parse_amount(value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).with_context(|| format!("Invalid amount: {}", value))
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {}", value))
}
