//! Debt commands - track debts and project payoff strategies

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use comfy_table::{Cell, Color};
use dialoguer::Confirm;
use moneta_core::domain::{DebtDraft, DebtPatch};
use moneta_core::services::DebtPlan;
use moneta_core::RepaymentStrategy;

use super::{get_context, get_logger, log_failure, parse_amount, parse_date, parse_id};
use crate::output::{create_table, print_json, success, warning};

#[derive(Subcommand)]
pub enum DebtCommands {
    /// Track a new debt
    Add {
        name: String,
        /// Outstanding balance
        #[arg(long)]
        total: String,
        /// Monthly interest rate in percent
        #[arg(long, default_value = "0")]
        rate: String,
        /// Minimum monthly payment
        #[arg(long)]
        minimum: String,
        /// Amount originally borrowed (defaults to the balance)
        #[arg(long)]
        original: Option<String>,
        #[arg(long)]
        installments: Option<u32>,
        #[arg(long)]
        paid: Option<u32>,
        /// First installment date (YYYY-MM-DD)
        #[arg(long)]
        first_installment: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List debts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a debt; changing paid installments recalculates the balance
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        total: Option<String>,
        #[arg(long)]
        rate: Option<String>,
        #[arg(long)]
        minimum: Option<String>,
        #[arg(long)]
        original: Option<String>,
        #[arg(long)]
        installments: Option<u32>,
        #[arg(long)]
        paid: Option<u32>,
        #[arg(long)]
        first_installment: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a debt
    Rm {
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Project payoff under one strategy
    Plan {
        /// snowball or avalanche
        #[arg(long, default_value = "avalanche")]
        strategy: String,
        /// Extra amount paid each month on top of minimums
        #[arg(long, default_value = "0")]
        extra: String,
        /// Print the month-by-month schedule
        #[arg(long)]
        schedule: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare every strategy side by side
    Compare {
        /// Extra amount paid each month on top of minimums
        #[arg(long, default_value = "0")]
        extra: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_plan(plan: &DebtPlan, schedule: bool) {
    let projection = &plan.projection;
    println!(
        "{} with {:.2} extra per month",
        plan.strategy.as_str().bold(),
        plan.monthly_extra
    );
    if projection.converged {
        println!("  Debt free in {} months", projection.months_to_payoff);
    } else {
        warning(&format!(
            "  Not paid off within {} months",
            projection.months_to_payoff
        ));
    }
    println!("  Total interest: {:.2}", projection.total_interest);
    if !projection.saved_interest.is_zero() {
        println!("  Interest saved: {:.2}", projection.saved_interest);
    }
    println!();

    let mut table = create_table();
    table.set_header(vec!["Order", "Debt", "Paid off", "Interest"]);
    for (position, payoff) in projection.payoffs.iter().enumerate() {
        let paid_off = match payoff.paid_off_month {
            Some(month) => Cell::new(format!("month {}", month)),
            None => Cell::new("never").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(position + 1),
            Cell::new(&payoff.name),
            paid_off,
            Cell::new(format!("{:.2}", payoff.interest_paid)),
        ]);
    }
    println!("{}", table);

    if schedule {
        let mut months = create_table();
        months.set_header(vec!["Month", "Date", "Interest", "Paid", "Remaining"]);
        for snapshot in &projection.schedule {
            months.add_row(vec![
                Cell::new(snapshot.month),
                Cell::new(snapshot.date),
                Cell::new(format!("{:.2}", snapshot.interest)),
                Cell::new(format!("{:.2}", snapshot.paid)),
                Cell::new(format!("{:.2}", snapshot.remaining)),
            ]);
        }
        println!("{}", months);
    }
}

pub fn run(command: DebtCommands) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let owner = ctx.owner();

    match command {
        DebtCommands::Add {
            name,
            total,
            rate,
            minimum,
            original,
            installments,
            paid,
            first_installment,
            json,
        } => {
            let mut draft = DebtDraft::new(
                name,
                parse_amount(&total)?,
                parse_amount(&rate)?,
                parse_amount(&minimum)?,
            );
            draft.original_amount = original.as_deref().map(parse_amount).transpose()?;
            draft.installments_total = installments;
            draft.installments_paid = paid;
            draft.first_installment_date = first_installment.as_deref().map(parse_date).transpose()?;

            let debt = ctx
                .debts
                .create(owner, draft)
                .map_err(|e| log_failure(&logger, "debt_create_failed", "debt add", e))?;
            if json {
                return print_json(&debt);
            }
            success(&format!("Tracking debt '{}' ({})", debt.name, debt.id));
        }
        DebtCommands::List { json } => {
            let debts = ctx.debts.list(owner)?;
            if json {
                return print_json(&debts);
            }
            if debts.is_empty() {
                println!("No debts tracked.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["ID", "Name", "Balance", "Rate %/mo", "Minimum", "Installments"]);
            for debt in &debts {
                let installments = match (debt.installments_paid, debt.installments_total) {
                    (Some(paid), Some(total)) => format!("{}/{}", paid, total),
                    (None, Some(total)) => format!("0/{}", total),
                    _ => "-".to_string(),
                };
                table.add_row(vec![
                    Cell::new(debt.id),
                    Cell::new(&debt.name),
                    Cell::new(format!("{:.2}", debt.total_amount)),
                    Cell::new(debt.interest_rate),
                    Cell::new(format!("{:.2}", debt.minimum_payment)),
                    Cell::new(installments),
                ]);
            }
            println!("{}", table);
        }
        DebtCommands::Edit {
            id,
            name,
            total,
            rate,
            minimum,
            original,
            installments,
            paid,
            first_installment,
            json,
        } => {
            let patch = DebtPatch {
                name,
                total_amount: total.as_deref().map(parse_amount).transpose()?,
                original_amount: original.as_deref().map(parse_amount).transpose()?,
                interest_rate: rate.as_deref().map(parse_amount).transpose()?,
                minimum_payment: minimum.as_deref().map(parse_amount).transpose()?,
                installments_total: installments,
                installments_paid: paid,
                first_installment_date: first_installment.as_deref().map(parse_date).transpose()?,
            };
            let debt = ctx
                .debts
                .update(owner, parse_id(&id)?, patch)
                .map_err(|e| log_failure(&logger, "debt_update_failed", "debt edit", e))?;
            if json {
                return print_json(&debt);
            }
            success(&format!(
                "Updated debt '{}', balance {:.2}",
                debt.name, debt.total_amount
            ));
        }
        DebtCommands::Rm { id, force, json } => {
            let id = parse_id(&id)?;
            let debt = ctx.debts.get(owner, id)?;
            if !force && !json {
                let prompt = format!("Delete debt '{}'?", debt.name);
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            ctx.debts
                .delete(owner, id)
                .map_err(|e| log_failure(&logger, "debt_delete_failed", "debt rm", e))?;
            if json {
                return print_json(&serde_json::json!({ "deleted": id }));
            }
            success(&format!("Deleted debt '{}'", debt.name));
        }
        DebtCommands::Plan {
            strategy,
            extra,
            schedule,
            json,
        } => {
            let strategy: RepaymentStrategy = strategy.parse().map_err(|e: String| anyhow!(e))?;
            let plan = ctx.debts.plan(owner, strategy, parse_amount(&extra)?)?;
            if json {
                return print_json(&plan);
            }
            if plan.order.is_empty() {
                println!("No debts tracked.");
                return Ok(());
            }
            print_plan(&plan, schedule);
        }
        DebtCommands::Compare { extra, json } => {
            let plans = ctx.debts.compare(owner, parse_amount(&extra)?)?;
            if json {
                return print_json(&plans);
            }
            if plans.iter().all(|p| p.order.is_empty()) {
                println!("No debts tracked.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Strategy", "Months", "Total interest", "Interest saved"]);
            for plan in &plans {
                let months = if plan.projection.converged {
                    Cell::new(plan.projection.months_to_payoff)
                } else {
                    Cell::new(format!("> {}", plan.projection.months_to_payoff)).fg(Color::Red)
                };
                table.add_row(vec![
                    Cell::new(plan.strategy.as_str()),
                    months,
                    Cell::new(format!("{:.2}", plan.projection.total_interest)),
                    Cell::new(format!("{:.2}", plan.projection.saved_interest)),
                ]);
            }
            println!("{}", table);

            let best = plans.iter().min_by(|a, b| {
                (a.projection.months_to_payoff, a.projection.total_interest)
                    .cmp(&(b.projection.months_to_payoff, b.projection.total_interest))
            });
            if let Some(best) = best {
                println!("Recommended: {}", best.strategy.as_str().green());
            }
        }
    }

    Ok(())
}
