//! Import-inbox command - import every statement dropped into a directory

use std::path::PathBuf;

use anyhow::Result;
use moneta_core::adapters::inbox::DirectoryInbox;
use moneta_core::services::LogEvent;

use super::import::print_summary;
use super::{get_context, get_logger, log_event, log_failure, parse_date, parse_id};
use crate::output::{print_json, warning};

pub fn run(dir: PathBuf, account_id: &str, since: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let account_id = parse_id(account_id)?;
    let since = since.map(parse_date).transpose()?;
    let inbox = DirectoryInbox::new(dir);

    let report = ctx
        .imports
        .import_from_source(ctx.owner(), account_id, &inbox, since)
        .map_err(|e| log_failure(&logger, "inbox_import_failed", "import-inbox", e))?;

    let mut event = LogEvent::new("inbox_import_completed")
        .with_command("import-inbox")
        .with_source(report.source.clone());
    if !report.file_errors.is_empty() {
        event = event.with_error(format!("{} statements could not be read", report.file_errors.len()));
    }
    log_event(&logger, event);

    if json {
        return print_json(&report);
    }

    println!("Read {} statements from {}", report.files, inbox.dir().display());
    for failure in &report.file_errors {
        warning(&format!("  skipped {}", failure.message));
    }
    print_summary(&report.summary);
    Ok(())
}
