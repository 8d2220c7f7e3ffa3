//! Moneta Core - ledger reconciliation, debt planning and statement import
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, Debt, etc.)
//! - **ports**: Trait definitions for external dependencies (LedgerStore, Clock, StatementSource)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, OFX/CSV parsers, directory inbox)

pub mod adapters;
pub mod config;
pub mod domain;
mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbLedger;
use config::Config;
use ports::{Clock, SystemClock};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Account, AccountKind, CreditCard, Debt, OwnerId, RepaymentStrategy, Transaction,
    TransactionType,
};

pub const DB_FILENAME: &str = "moneta.duckdb";

/// Main context for Moneta operations
///
/// Holds the ledger store, configuration and every service. All services
/// share one store handle, so atomic units are serialized across them.
pub struct MonetaContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub store: Arc<DuckDbLedger>,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<LedgerService<DuckDbLedger>>,
    pub accounts: AccountService<DuckDbLedger>,
    pub debts: DebtService<DuckDbLedger>,
    pub imports: ImportService<DuckDbLedger>,
    pub invoices: InvoiceService<DuckDbLedger>,
    pub doctor: DoctorService<DuckDbLedger>,
    pub status: StatusService<DuckDbLedger>,
}

impl MonetaContext {
    /// Open the ledger in `data_dir`, creating the directory and schema as needed
    pub fn new(data_dir: &Path) -> Result<Self> {
        Self::with_clock(data_dir, Arc::new(SystemClock))
    }

    /// Same as [`new`](Self::new) with an injected clock
    pub fn with_clock(data_dir: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join(DB_FILENAME);
        let store = Arc::new(
            DuckDbLedger::new(&db_path)
                .with_context(|| format!("Failed to open ledger at {}", db_path.display()))?,
        );
        store.ensure_schema().context("Failed to prepare ledger schema")?;

        let ledger = Arc::new(LedgerService::new(Arc::clone(&store), Arc::clone(&clock)));
        let accounts = AccountService::new(Arc::clone(&store), Arc::clone(&clock));
        let debts = DebtService::new(Arc::clone(&store), Arc::clone(&clock));
        let imports = ImportService::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&clock),
            &config,
        );
        let invoices = InvoiceService::new(Arc::clone(&store));
        let doctor = DoctorService::new(Arc::clone(&store));
        let status = StatusService::new(Arc::clone(&store));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            store,
            clock,
            ledger,
            accounts,
            debts,
            imports,
            invoices,
            doctor,
            status,
        })
    }

    /// Owner all CLI operations act for
    pub fn owner(&self) -> &OwnerId {
        &self.config.default_owner
    }
}
