//! Import command - import transactions from OFX/QFX or CSV statements

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use comfy_table::Cell;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use moneta_core::domain::{ImportSummary, StatementFormat};
use moneta_core::services::{ImportOptions, LogEvent};

use super::{get_context, get_logger, log_event, log_failure, parse_id};
use crate::output::{create_table, info, money_cell, print_json, success, warning};

pub struct ImportArgs {
    pub file: Option<PathBuf>,
    pub account_id: Option<String>,
    pub format: Option<String>,
    pub preview: bool,
    pub profile: Option<String>,
    pub list_profiles: bool,
    pub yes: bool,
    pub json: bool,
}

/// Print the outcome of a confirmed import
pub fn print_summary(summary: &ImportSummary) {
    success(&format!("Imported {} transactions", summary.imported));
    if summary.duplicates > 0 {
        info(&format!("Skipped {} duplicates", summary.duplicates));
    }
    if summary.skipped_rows > 0 {
        info(&format!("Ignored {} unreadable rows", summary.skipped_rows));
    }
    if summary.failed > 0 {
        warning(&format!("{} entries failed:", summary.failed));
        for failure in &summary.errors {
            println!("  #{}: {}", failure.index + 1, failure.message);
        }
    }
    if !summary.batch_id.is_empty() {
        println!("Batch: {}", summary.batch_id.dimmed());
    }
}

fn list_profiles(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let profiles = &ctx.config.import_profiles;

    if json {
        return print_json(profiles);
    }
    if profiles.is_empty() {
        println!("No saved profiles.");
        return Ok(());
    }

    let mut names: Vec<&String> = profiles.keys().collect();
    names.sort();
    println!("Saved import profiles:");
    for name in names {
        let profile = &profiles[name];
        let mappings = &profile.column_mappings;
        println!();
        println!("  {}", name.green());
        println!("    Date: {}", mappings.date);
        if mappings.debit.is_some() || mappings.credit.is_some() {
            if let Some(ref d) = mappings.debit {
                println!("    Debit: {}", d);
            }
            if let Some(ref c) = mappings.credit {
                println!("    Credit: {}", c);
            }
        } else {
            println!("    Amount: {}", mappings.amount);
        }
        if let Some(ref desc) = mappings.description {
            println!("    Description: {}", desc);
        }
        if let Some(ref format) = profile.date_format {
            println!("    Date format: {}", format);
        }
        if profile.options.flip_signs {
            println!("    Options: flip_signs");
        }
        if profile.options.debit_negative {
            println!("    Options: debit_negative");
        }
    }
    Ok(())
}

pub fn run(args: ImportArgs) -> Result<()> {
    if args.list_profiles {
        return list_profiles(args.json);
    }

    let file_path = args.file.ok_or_else(|| anyhow!("File path required for import"))?;
    let account = args
        .account_id
        .ok_or_else(|| anyhow!("--account-id required for import"))?;
    let account_id = parse_id(&account)?;
    let format = args
        .format
        .as_deref()
        .map(|f| f.parse::<StatementFormat>().map_err(|e| anyhow!(e)))
        .transpose()?;

    let bytes = std::fs::read(&file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;

    let ctx = get_context()?;
    let logger = get_logger();
    let owner = ctx.owner();
    let options = ImportOptions {
        format,
        profile: args.profile,
    };

    let preview = ctx
        .imports
        .preview(owner, account_id, &bytes, &options)
        .map_err(|e| log_failure(&logger, "import_failed", "import", e))?;

    if args.preview {
        if args.json {
            return print_json(&preview);
        }
        println!("{}", "PREVIEW MODE - No changes applied".yellow());
        println!();
    }

    if !args.json {
        println!(
            "{} statement: {} new, {} already in the ledger",
            format!("{:?}", preview.format).to_uppercase(),
            preview.candidates.len(),
            preview.duplicates
        );
        if !preview.candidates.is_empty() {
            let mut table = create_table();
            table.set_header(vec!["Date", "Description", "Amount"]);
            for candidate in preview.candidates.iter().take(10) {
                table.add_row(vec![
                    Cell::new(candidate.date),
                    Cell::new(&candidate.description),
                    money_cell(candidate.transaction_type.effect(candidate.amount)),
                ]);
            }
            println!("{}", table);
            if preview.candidates.len() > 10 {
                println!("... and {} more", preview.candidates.len() - 10);
            }
        }
    }

    if args.preview {
        return Ok(());
    }
    if preview.candidates.is_empty() {
        if args.json {
            return print_json(&ImportSummary {
                duplicates: preview.duplicates,
                skipped_rows: preview.skipped_rows,
                ..Default::default()
            });
        }
        println!("Nothing new to import.");
        return Ok(());
    }

    if !args.yes && !args.json {
        let prompt = format!("Import {} transactions?", preview.candidates.len());
        if !Confirm::new().with_prompt(prompt).default(true).interact()? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(preview.candidates.len() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let mut summary = ctx
        .imports
        .confirm_with_progress(owner, &preview.candidates, |done| progress.set_position(done as u64));
    progress.finish_and_clear();
    summary.duplicates = preview.duplicates;
    summary.skipped_rows = preview.skipped_rows;

    let source = format!("{:?}", preview.format).to_lowercase();
    let mut event = LogEvent::new("import_completed")
        .with_command("import")
        .with_source(source);
    if summary.failed > 0 {
        event = event.with_error(format!("{} of {} entries failed", summary.failed, preview.candidates.len()));
    }
    log_event(&logger, event);

    if args.json {
        return print_json(&summary);
    }
    print_summary(&summary);
    Ok(())
}
