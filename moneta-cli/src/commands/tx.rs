//! Transaction commands - add, list, edit, remove and split

use anyhow::{anyhow, Result};
use clap::Subcommand;
use comfy_table::Cell;
use dialoguer::Confirm;
use moneta_core::domain::{SplitPart, TransactionDraft, TransactionFilter, TransactionPatch};
use moneta_core::{Transaction, TransactionType};

use super::{get_context, get_logger, log_failure, parse_amount, parse_date, parse_id};
use crate::output::{create_table, money_cell, print_json, success};

#[derive(Subcommand)]
pub enum TxCommands {
    /// Record a transaction
    Add {
        /// Account ID
        #[arg(long)]
        account_id: String,
        /// Positive amount
        amount: String,
        /// Direction: income or expense
        #[arg(long = "type", default_value = "expense")]
        kind: String,
        /// Transaction date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Description
        #[arg(long, short)]
        description: String,
        #[arg(long)]
        category: Option<String>,
        /// Debt this payment goes towards
        #[arg(long)]
        debt_id: Option<String>,
        /// Credit card the purchase was made with
        #[arg(long)]
        card_id: Option<String>,
        /// Repeat monthly this many times in total (at most 360)
        #[arg(long)]
        repeat: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List transactions, newest first
    List {
        #[arg(long)]
        account_id: Option<String>,
        /// Case-insensitive description search
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one transaction
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a transaction; balances are reconciled
    Edit {
        id: String,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        /// Move the transaction to another account
        #[arg(long)]
        account_id: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a transaction and revert its balance effect
    Rm {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Split a transaction into parts summing exactly to its amount
    Split {
        id: String,
        /// Part as AMOUNT[:DESCRIPTION[:CATEGORY]]; repeat for each part
        #[arg(long = "part", required = true)]
        parts: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_type(value: &str) -> Result<TransactionType> {
    value.parse().map_err(|e: String| anyhow!(e))
}

fn parse_part(value: &str) -> Result<SplitPart> {
    let mut fields = value.splitn(3, ':');
    let amount = parse_amount(fields.next().unwrap_or_default())?;
    let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.trim().to_string());
    Ok(SplitPart {
        amount,
        description: fields.next().and_then(non_empty),
        category: fields.next().and_then(non_empty),
    })
}

fn print_transactions(transactions: &[Transaction]) {
    let mut table = create_table();
    table.set_header(vec!["ID", "Date", "Description", "Category", "Amount"]);
    for tx in transactions {
        table.add_row(vec![
            Cell::new(tx.id),
            Cell::new(tx.transaction_date),
            Cell::new(&tx.description),
            Cell::new(tx.category.as_deref().unwrap_or("-")),
            money_cell(tx.effect()),
        ]);
    }
    println!("{}", table);
}

pub fn run(command: TxCommands) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let owner = ctx.owner();

    match command {
        TxCommands::Add {
            account_id,
            amount,
            kind,
            date,
            description,
            category,
            debt_id,
            card_id,
            repeat,
            json,
        } => {
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => ctx.clock.today(),
            };
            let mut draft = TransactionDraft::new(
                parse_id(&account_id)?,
                parse_amount(&amount)?,
                parse_type(&kind)?,
                date,
                description,
            );
            draft.category = category;
            draft.debt_id = debt_id.as_deref().map(parse_id).transpose()?;
            draft.credit_card_id = card_id.as_deref().map(parse_id).transpose()?;
            draft.is_recurring = repeat.is_some();
            draft.repeat_count = repeat;

            let created = ctx
                .ledger
                .create(owner, draft)
                .map_err(|e| log_failure(&logger, "transaction_create_failed", "tx add", e))?;
            if json {
                return print_json(&created);
            }
            if created.len() == 1 {
                success(&format!("Recorded transaction {}", created[0].id));
            } else {
                success(&format!("Recorded {} monthly transactions", created.len()));
                print_transactions(&created);
            }
        }
        TxCommands::List {
            account_id,
            search,
            category,
            from,
            to,
            limit,
            offset,
            json,
        } => {
            let filter = TransactionFilter {
                search,
                account_id: account_id.as_deref().map(parse_id).transpose()?,
                category,
                date_from: from.as_deref().map(parse_date).transpose()?,
                date_to: to.as_deref().map(parse_date).transpose()?,
                offset: Some(offset),
                limit: Some(limit),
                ..Default::default()
            };
            let page = ctx.ledger.list(owner, &filter)?;
            if json {
                return print_json(&page);
            }
            if page.items.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }
            print_transactions(&page.items);
            println!(
                "Showing {}-{} of {}",
                page.offset + 1,
                page.offset + page.items.len(),
                page.total
            );
        }
        TxCommands::Show { id, json } => {
            let tx = ctx.ledger.find_one(owner, parse_id(&id)?)?;
            if json {
                return print_json(&tx);
            }
            let mut table = create_table();
            table.add_row(vec!["ID".to_string(), tx.id.to_string()]);
            table.add_row(vec!["Account".to_string(), tx.account_id.to_string()]);
            table.add_row(vec!["Date".to_string(), tx.transaction_date.to_string()]);
            table.add_row(vec!["Type".to_string(), tx.transaction_type.to_string()]);
            table.add_row(vec!["Amount".to_string(), format!("{:.2}", tx.amount)]);
            table.add_row(vec!["Description".to_string(), tx.description.clone()]);
            if let Some(category) = &tx.category {
                table.add_row(vec!["Category".to_string(), category.clone()]);
            }
            if let Some(debt_id) = tx.debt_id {
                table.add_row(vec!["Debt".to_string(), debt_id.to_string()]);
            }
            if let Some(card_id) = tx.credit_card_id {
                table.add_row(vec!["Card".to_string(), card_id.to_string()]);
            }
            if let Some(batch) = &tx.import_batch_id {
                table.add_row(vec!["Import batch".to_string(), batch.clone()]);
            }
            println!("{}", table);
        }
        TxCommands::Edit {
            id,
            amount,
            kind,
            date,
            description,
            account_id,
            category,
            json,
        } => {
            let patch = TransactionPatch {
                amount: amount.as_deref().map(parse_amount).transpose()?,
                transaction_type: kind.as_deref().map(parse_type).transpose()?,
                date: date.as_deref().map(parse_date).transpose()?,
                description,
                account_id: account_id.as_deref().map(parse_id).transpose()?,
                category,
            };
            if patch.is_empty() {
                return Err(anyhow!("Nothing to change; pass at least one field"));
            }
            let tx = ctx
                .ledger
                .update(owner, parse_id(&id)?, patch)
                .map_err(|e| log_failure(&logger, "transaction_update_failed", "tx edit", e))?;
            if json {
                return print_json(&tx);
            }
            success(&format!("Updated transaction {}", tx.id));
        }
        TxCommands::Rm { id, force, json } => {
            let id = parse_id(&id)?;
            if !force && !json {
                let tx = ctx.ledger.find_one(owner, id)?;
                let prompt = format!(
                    "Remove '{}' ({} {:.2} on {})?",
                    tx.description, tx.transaction_type, tx.amount, tx.transaction_date
                );
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let removed = ctx
                .ledger
                .remove(owner, id)
                .map_err(|e| log_failure(&logger, "transaction_remove_failed", "tx rm", e))?;
            if json {
                return print_json(&removed);
            }
            success(&format!("Removed transaction {}", removed.id));
        }
        TxCommands::Split { id, parts, json } => {
            let parts = parts
                .iter()
                .map(|p| parse_part(p))
                .collect::<Result<Vec<_>>>()?;
            let created = ctx
                .ledger
                .split(owner, parse_id(&id)?, parts)
                .map_err(|e| log_failure(&logger, "transaction_split_failed", "tx split", e))?;
            if json {
                return print_json(&created);
            }
            success(&format!("Split into {} transactions", created.len()));
            print_transactions(&created);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_part() {
        let part = parse_part("12.50:Lunch:food").unwrap();
        assert_eq!(part.amount, Decimal::new(1250, 2));
        assert_eq!(part.description.as_deref(), Some("Lunch"));
        assert_eq!(part.category.as_deref(), Some("food"));

        let bare = parse_part("3").unwrap();
        assert!(bare.description.is_none());
        assert!(bare.category.is_none());

        let no_desc = parse_part("3::fees").unwrap();
        assert!(no_desc.description.is_none());
        assert_eq!(no_desc.category.as_deref(), Some("fees"));

        assert!(parse_part("abc").is_err());
    }
}
