//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod credit_card;
mod debt;
mod import;
pub mod money;
mod owner;
pub mod result;
pub mod transaction;

pub use account::{Account, AccountKind};
pub use credit_card::{CreditCard, Invoice};
pub use debt::{Debt, DebtDraft, DebtPatch, RepaymentStrategy};
pub use import::{
    ImportCandidate, ImportFailure, ImportPreview, ImportSummary, ParsedStatement,
    StatementFormat, StatementLine,
};
pub use owner::OwnerId;
pub use transaction::{
    SplitPart, Transaction, TransactionDraft, TransactionFilter, TransactionPage,
    TransactionPatch, TransactionType,
};
