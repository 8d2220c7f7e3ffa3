//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod clock;
mod statement_source;
mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use statement_source::{StatementFile, StatementSource};
pub use store::{LedgerReader, LedgerStore, LedgerUnit, WriteOp};
