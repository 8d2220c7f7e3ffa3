//! Doctor command - run ledger health checks

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};

use super::{get_context, get_logger, log_event};
use crate::output::{create_table, format_size, print_json};
use moneta_core::services::LogEvent;

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let report = ctx.doctor.check_balances(ctx.owner())?;

    if !report.is_healthy() {
        log_event(
            &get_logger(),
            LogEvent::new("doctor_found_problems")
                .with_command("doctor")
                .with_error(format!(
                    "{} drifted balances, {} orphaned transactions",
                    report.drift.len(),
                    report.orphans.len()
                )),
        );
    }

    if json {
        print_json(&report)?;
        if !report.is_healthy() {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!("{}", "Ledger Health Check".bold());
    println!();

    let mut table = create_table();
    table.set_header(vec!["Check", "Status", "Message"]);

    let status = |ok: bool| {
        if ok {
            Cell::new("PASS").fg(Color::Green)
        } else {
            Cell::new("ERROR").fg(Color::Red)
        }
    };

    table.add_row(vec![
        Cell::new("balances"),
        status(report.drift.is_empty()),
        Cell::new(format!(
            "{} of {} accounts drifted",
            report.drift.len(),
            report.accounts_checked
        )),
    ]);
    if verbose {
        for drift in &report.drift {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(""),
                Cell::new(format!(
                    "  - {}: stored {:.2}, expected {:.2}",
                    drift.name, drift.stored, drift.expected
                )),
            ]);
        }
    }

    table.add_row(vec![
        Cell::new("orphans"),
        status(report.orphans.is_empty()),
        Cell::new(format!(
            "{} of {} transactions point at missing accounts",
            report.orphans.len(),
            report.transactions_checked
        )),
    ]);
    if verbose {
        for orphan in &report.orphans {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(""),
                Cell::new(format!("  - {} -> {}", orphan.transaction_id, orphan.account_id)),
            ]);
        }
    }
    println!("{}", table);
    println!();

    if verbose {
        let migrations = ctx.store.applied_migrations()?;
        println!("Schema migrations applied: {}", migrations.len());
        if let Ok(size) = ctx.store.db_size() {
            println!("Database size: {}", format_size(size));
        }
        println!();
    }

    if report.is_healthy() {
        println!("{}", "Ledger is consistent".green());
    } else {
        println!(
            "{}",
            "Problems found. Use `moneta account correct` to fix a drifted balance.".red()
        );
        std::process::exit(1);
    }

    Ok(())
}
