//! Ledger open/reopen tests
//!
//! Run with: cargo test --test connection_retry_test -- --nocapture

use std::time::Instant;

use rust_decimal_macros::dec;
use tempfile::TempDir;

use moneta_core::adapters::duckdb::DuckDbLedger;
use moneta_core::domain::TransactionDraft;
use moneta_core::{AccountKind, Error, MonetaContext, TransactionType};

/// Opening and closing the same file repeatedly never re-applies migrations
#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_sequential.duckdb");

    for i in 0..5 {
        let start = Instant::now();
        let store = DuckDbLedger::new(&db_path).unwrap();
        let result = store.run_migrations().unwrap();
        if i == 0 {
            assert_eq!(result.applied.len(), 3);
        } else {
            assert!(result.applied.is_empty());
            assert_eq!(result.already_applied, 3);
        }
        println!("Connection {}: opened in {:?}", i, start.elapsed());
    }
}

/// Every context opened on a directory sees what earlier ones committed
#[test]
fn test_context_reopen_sees_committed_writes() {
    let temp_dir = TempDir::new().unwrap();

    let account_id = {
        let ctx = MonetaContext::new(temp_dir.path()).unwrap();
        ctx.accounts
            .create(ctx.owner(), "Checking", AccountKind::Bank, dec!(100), "USD")
            .unwrap()
            .id
    };

    for round in 1..=3 {
        let ctx = MonetaContext::new(temp_dir.path()).unwrap();
        let draft = TransactionDraft::new(
            account_id,
            dec!(10),
            TransactionType::Expense,
            chrono::NaiveDate::from_ymd_opt(2025, 5, round).unwrap(),
            format!("round {}", round),
        );
        ctx.ledger.create(ctx.owner(), draft).unwrap();
        let balance = ctx.accounts.get(ctx.owner(), account_id).unwrap().balance;
        assert_eq!(balance, dec!(100) - dec!(10) * rust_decimal::Decimal::from(round));
    }
}

/// A path that cannot be created fails fast with a non-retryable error
#[test]
fn test_unopenable_path_is_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("missing").join("nested").join("ledger.duckdb");

    let start = Instant::now();
    let result = DuckDbLedger::new(&db_path);
    assert!(matches!(result, Err(Error::Unavailable(_))));
    assert_eq!(result.err().map(|e| e.code()), Some("UNAVAILABLE"));
    // No backoff for errors that are not lock contention
    assert!(start.elapsed().as_millis() < 700);
}
