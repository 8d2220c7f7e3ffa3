//! Credit card commands - cards, their paired accounts and monthly invoices

use anyhow::Result;
use chrono::Datelike;
use clap::Subcommand;
use colored::Colorize;
use comfy_table::Cell;
use dialoguer::Confirm;
use moneta_core::services::CreditCardDraft;

use super::{get_context, get_logger, log_failure, parse_amount, parse_id};
use crate::output::{create_table, info, money_cell, print_json, success};

#[derive(Subcommand)]
pub enum CardCommands {
    /// Create a credit card and its paired account
    New {
        /// Card name
        name: String,
        /// Credit limit
        #[arg(long)]
        limit: String,
        /// Day of month the statement closes (1-31)
        #[arg(long)]
        closing_day: u32,
        /// Day of month payment is due (1-31)
        #[arg(long)]
        due_day: u32,
        /// ISO currency code (defaults to settings)
        #[arg(long)]
        currency: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List credit cards
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the invoice closing in a month
    Invoice {
        id: String,
        /// Invoice year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
        /// Invoice month 1-12 (defaults to the current month)
        #[arg(long)]
        month: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a card and its paired account
    Delete {
        id: String,
        /// Also delete the card's transactions
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

pub fn run(command: CardCommands) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let owner = ctx.owner();

    match command {
        CardCommands::New {
            name,
            limit,
            closing_day,
            due_day,
            currency,
            json,
        } => {
            let draft = CreditCardDraft {
                name,
                credit_limit: parse_amount(&limit)?,
                closing_day,
                due_day,
                currency: currency.unwrap_or_else(|| ctx.config.default_currency.clone()),
            };
            let card = ctx
                .accounts
                .create_credit_card(owner, draft)
                .map_err(|e| log_failure(&logger, "card_create_failed", "card new", e))?;
            if json {
                return print_json(&card);
            }
            success(&format!("Created card '{}' ({})", card.name, card.id));
            info(&format!("Paired account: {}", card.account_id));
        }
        CardCommands::List { json } => {
            let cards = ctx.accounts.list_credit_cards(owner)?;
            if json {
                return print_json(&cards);
            }
            if cards.is_empty() {
                println!("No credit cards yet.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["ID", "Name", "Limit", "Closes", "Due", "Account"]);
            for card in &cards {
                table.add_row(vec![
                    Cell::new(card.id),
                    Cell::new(&card.name),
                    Cell::new(format!("{:.2}", card.credit_limit)),
                    Cell::new(card.closing_day),
                    Cell::new(card.due_day),
                    Cell::new(card.account_id),
                ]);
            }
            println!("{}", table);
        }
        CardCommands::Invoice {
            id,
            year,
            month,
            json,
        } => {
            let today = ctx.clock.today();
            let invoice = ctx.invoices.invoice(
                owner,
                parse_id(&id)?,
                year.unwrap_or_else(|| today.year()),
                month.unwrap_or_else(|| today.month()),
            )?;
            if json {
                return print_json(&invoice);
            }

            println!(
                "{} {}-{:02}",
                "Invoice".bold(),
                invoice.year,
                invoice.month
            );
            println!(
                "Period {} to {}, due {}",
                invoice.period_start, invoice.period_end, invoice.due_date
            );
            println!();

            if invoice.transactions.is_empty() {
                println!("No card transactions in this period.");
            } else {
                let mut table = create_table();
                table.set_header(vec!["Date", "Description", "Type", "Amount"]);
                for tx in &invoice.transactions {
                    table.add_row(vec![
                        Cell::new(tx.transaction_date),
                        Cell::new(&tx.description),
                        Cell::new(tx.transaction_type.as_str()),
                        money_cell(tx.effect()),
                    ]);
                }
                println!("{}", table);
            }
            println!("Total: {}", format!("{:.2}", invoice.total).bold());
        }
        CardCommands::Delete {
            id,
            cascade,
            force,
            json,
        } => {
            let id = parse_id(&id)?;
            let card = ctx.accounts.get_credit_card(owner, id)?;
            if !force && !json {
                let prompt = format!("Delete card '{}' and its paired account?", card.name);
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let removed = ctx
                .accounts
                .delete_credit_card(owner, id, cascade)
                .map_err(|e| log_failure(&logger, "card_delete_failed", "card delete", e))?;
            if json {
                return print_json(&serde_json::json!({
                    "deleted": id,
                    "transactions_removed": removed,
                }));
            }
            success(&format!(
                "Deleted card '{}' ({} transactions removed)",
                card.name, removed
            ));
        }
    }

    Ok(())
}
