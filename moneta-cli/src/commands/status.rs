//! Status command - show ledger status and summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;

use super::get_context;
use crate::output::{create_table, money_cell, print_json};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status.get_status(ctx.owner())?;

    if json {
        return print_json(&status);
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = create_table();
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    table.add_row(vec!["Credit cards", &status.total_credit_cards.to_string()]);
    table.add_row(vec!["Debts", &status.total_debts.to_string()]);
    table.add_row(vec!["Outstanding debt", &format!("{:.2}", status.outstanding_debt)]);
    println!("{}", table);
    println!();

    if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest) {
        println!("Date range: {} to {}", earliest, latest);
        println!();
    }

    if !status.accounts.is_empty() {
        let mut accounts = create_table();
        accounts.set_header(vec!["ID", "Name", "Kind", "Balance", "Currency"]);
        for account in &status.accounts {
            accounts.add_row(vec![
                Cell::new(&account.id),
                Cell::new(&account.name),
                Cell::new(account.kind.as_str()),
                money_cell(account.balance),
                Cell::new(&account.currency),
            ]);
        }
        println!("{}", accounts);
    }

    Ok(())
}
