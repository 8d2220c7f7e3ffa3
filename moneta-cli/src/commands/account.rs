//! Account commands - create, list, rename, correct and delete accounts

use anyhow::{anyhow, Result};
use clap::Subcommand;
use comfy_table::Cell;
use dialoguer::Confirm;
use moneta_core::AccountKind;
use rust_decimal::Decimal;

use super::{get_context, get_logger, log_failure, parse_amount, parse_id};
use crate::output::{create_table, money_cell, print_json, success};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    New {
        /// Account name
        name: String,
        /// Account kind (wallet, bank)
        #[arg(long, default_value = "bank")]
        kind: String,
        /// Opening balance
        #[arg(long, default_value = "0")]
        opening: String,
        /// ISO currency code (defaults to settings)
        #[arg(long)]
        currency: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename an account
    Rename {
        id: String,
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the balance directly, shifting the opening balance by the same amount
    Correct {
        id: String,
        balance: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an account
    Delete {
        id: String,
        /// Also delete the account's transactions
        #[arg(long)]
        cascade: bool,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: AccountCommands) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let owner = ctx.owner();

    match command {
        AccountCommands::New {
            name,
            kind,
            opening,
            currency,
            json,
        } => {
            let kind: AccountKind = kind.parse().map_err(|e: String| anyhow!(e))?;
            if kind == AccountKind::CreditCard {
                return Err(anyhow!("Use `moneta card new` to create credit card accounts"));
            }
            let opening = parse_amount(&opening)?;
            let currency = currency.unwrap_or_else(|| ctx.config.default_currency.clone());
            let account = ctx
                .accounts
                .create(owner, &name, kind, opening, &currency)
                .map_err(|e| log_failure(&logger, "account_create_failed", "account new", e))?;

            if json {
                return print_json(&account);
            }
            success(&format!("Created account '{}' ({})", account.name, account.id));
        }
        AccountCommands::List { json } => {
            let accounts = ctx.accounts.list(owner)?;
            if json {
                return print_json(&accounts);
            }
            if accounts.is_empty() {
                println!("No accounts yet. Create one with `moneta account new`.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["ID", "Name", "Kind", "Opening", "Balance", "Currency"]);
            let mut total = Decimal::ZERO;
            for account in &accounts {
                total += account.balance;
                table.add_row(vec![
                    Cell::new(account.id),
                    Cell::new(&account.name),
                    Cell::new(account.kind.as_str()),
                    Cell::new(format!("{:.2}", account.opening_balance)),
                    money_cell(account.balance),
                    Cell::new(&account.currency),
                ]);
            }
            println!("{}", table);
            println!("Net balance: {:.2}", total);
        }
        AccountCommands::Rename { id, name, json } => {
            let account = ctx.accounts.rename(owner, parse_id(&id)?, &name)?;
            if json {
                return print_json(&account);
            }
            success(&format!("Renamed account to '{}'", account.name));
        }
        AccountCommands::Correct { id, balance, json } => {
            let account = ctx
                .accounts
                .correct_balance(owner, parse_id(&id)?, parse_amount(&balance)?)
                .map_err(|e| log_failure(&logger, "balance_correction_failed", "account correct", e))?;
            if json {
                return print_json(&account);
            }
            success(&format!(
                "Balance of '{}' set to {:.2} (opening {:.2})",
                account.name, account.balance, account.opening_balance
            ));
        }
        AccountCommands::Delete {
            id,
            cascade,
            force,
            json,
        } => {
            let id = parse_id(&id)?;
            let account = ctx.accounts.get(owner, id)?;
            if !force && !json {
                let prompt = if cascade {
                    format!("Delete account '{}' and all its transactions?", account.name)
                } else {
                    format!("Delete account '{}'?", account.name)
                };
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let removed = ctx
                .accounts
                .delete(owner, id, cascade)
                .map_err(|e| log_failure(&logger, "account_delete_failed", "account delete", e))?;
            if json {
                return print_json(&serde_json::json!({
                    "deleted": id,
                    "transactions_removed": removed,
                }));
            }
            success(&format!(
                "Deleted account '{}' ({} transactions removed)",
                account.name, removed
            ));
        }
    }

    Ok(())
}
