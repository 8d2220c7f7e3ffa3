//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod accounts;
mod debt;
mod doctor;
pub mod import;
mod invoice;
mod ledger;
pub mod logging;
pub mod migration;
pub mod projection;
mod status;

pub use accounts::{AccountService, CreditCardDraft};
pub use debt::DebtService;
pub use doctor::{BalanceDrift, DoctorReport, DoctorService, OrphanTransaction};
pub use import::{ImportOptions, ImportService, SourceImport};
pub use invoice::InvoiceService;
pub use ledger::LedgerService;
pub use logging::{EntryPoint, EventCount, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use projection::{DebtPayoff, DebtPlan, MonthSnapshot, Projection};
pub use status::{AccountSummary, DateRange, StatusService, StatusSummary};
