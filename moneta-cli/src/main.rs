//! Moneta CLI - ledger, debts and statement import in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, card, debt, doctor, import, inbox, logs, status, tx};

/// Moneta - personal finance in your terminal
#[derive(Parser)]
#[command(name = "moneta", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show ledger status and summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Manage credit cards and invoices
    Card {
        #[command(subcommand)]
        command: card::CardCommands,
    },

    /// Record and edit transactions
    Tx {
        #[command(subcommand)]
        command: tx::TxCommands,
    },

    /// Manage debts and payoff plans
    Debt {
        #[command(subcommand)]
        command: debt::DebtCommands,
    },

    /// Import a bank statement (OFX/QFX or CSV)
    Import {
        /// Path to the statement file
        file: Option<PathBuf>,
        /// Account ID to import into
        #[arg(long)]
        account_id: Option<String>,
        /// Statement format (ofx or csv); detected when omitted
        #[arg(long)]
        format: Option<String>,
        /// Preview without importing
        #[arg(long)]
        preview: bool,
        /// Use saved CSV import profile
        #[arg(long)]
        profile: Option<String>,
        /// List saved profiles
        #[arg(long)]
        list_profiles: bool,
        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import every statement in a directory
    ImportInbox {
        /// Directory holding .ofx/.qfx/.csv files
        #[arg(long)]
        dir: PathBuf,
        /// Account ID to import into
        #[arg(long)]
        account_id: String,
        /// Only files modified on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ledger health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MONETA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Account { command } => account::run(command),
        Commands::Card { command } => card::run(command),
        Commands::Tx { command } => tx::run(command),
        Commands::Debt { command } => debt::run(command),
        Commands::Import {
            file,
            account_id,
            format,
            preview,
            profile,
            list_profiles,
            yes,
            json,
        } => import::run(import::ImportArgs {
            file,
            account_id,
            format,
            preview,
            profile,
            list_profiles,
            yes,
            json,
        }),
        Commands::ImportInbox {
            dir,
            account_id,
            since,
            json,
        } => inbox::run(dir, &account_id, since.as_deref(), json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Logs { command } => logs::run(command),
    }
}
