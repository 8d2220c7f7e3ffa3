//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the LedgerStore port
//! - OFX and CSV statement parsers
//! - Local directory for the StatementSource port

pub mod csv;
pub mod duckdb;
pub mod inbox;
pub mod ofx;
