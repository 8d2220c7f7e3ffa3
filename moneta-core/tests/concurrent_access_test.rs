//! Concurrent ledger access tests
//!
//! Threads share one context (and so one store handle) and hammer the same
//! account. Every balance read-modify-write happens inside an atomic unit,
//! so no update may be lost.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;
use uuid::Uuid;

use moneta_core::domain::{SplitPart, TransactionDraft, TransactionFilter, TransactionPatch};
use moneta_core::{AccountKind, MonetaContext, TransactionType};

/// Number of concurrent threads for stress tests
const THREAD_COUNT: usize = 6;

/// Number of iterations per thread
const ITERATIONS_PER_THREAD: usize = 10;

fn setup(temp_dir: &TempDir, opening: Decimal) -> (Arc<MonetaContext>, Uuid) {
    let ctx = MonetaContext::new(temp_dir.path()).expect("Failed to open context");
    let account = ctx
        .accounts
        .create(ctx.owner(), "Shared", AccountKind::Bank, opening, "USD")
        .expect("Failed to create account");
    (Arc::new(ctx), account.id)
}

fn payday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
}

/// Test: concurrent creates on one account lose no balance updates
#[test]
fn test_concurrent_creates_on_one_account() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, account_id) = setup(&temp_dir, dec!(0));
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|thread_id| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            let success_count = Arc::clone(&success_count);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..ITERATIONS_PER_THREAD {
                    let draft = TransactionDraft::new(
                        account_id,
                        dec!(1.25),
                        TransactionType::Income,
                        payday(),
                        format!("t{} i{}", thread_id, i),
                    );
                    ctx.ledger.create(ctx.owner(), draft).unwrap();
                    success_count.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREAD_COUNT * ITERATIONS_PER_THREAD;
    assert_eq!(success_count.load(Ordering::SeqCst), total);

    let account = ctx.accounts.get(ctx.owner(), account_id).unwrap();
    assert_eq!(account.balance, dec!(1.25) * Decimal::from(total));
    assert!(ctx.doctor.check_balances(ctx.owner()).unwrap().is_healthy());
}

/// Test: interleaved create/update/split/remove from many threads keep the
/// stored balance equal to the opening balance plus transaction effects
#[test]
fn test_concurrent_mixed_operations_keep_invariant() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, account_id) = setup(&temp_dir, dec!(1000));
    let other_id = ctx
        .accounts
        .create(ctx.owner(), "Other", AccountKind::Wallet, dec!(50), "USD")
        .unwrap()
        .id;
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|thread_id| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let owner = ctx.owner().clone();
                barrier.wait();
                for i in 0..ITERATIONS_PER_THREAD {
                    let draft = TransactionDraft::new(
                        account_id,
                        dec!(10),
                        TransactionType::Expense,
                        payday(),
                        format!("t{} i{}", thread_id, i),
                    );
                    let tx = ctx.ledger.create(&owner, draft).unwrap().remove(0);

                    match i % 3 {
                        0 => {
                            ctx.ledger.remove(&owner, tx.id).unwrap();
                        }
                        1 => {
                            let patch = TransactionPatch {
                                account_id: Some(other_id),
                                amount: Some(dec!(4)),
                                ..Default::default()
                            };
                            ctx.ledger.update(&owner, tx.id, patch).unwrap();
                        }
                        _ => {
                            let parts = vec![SplitPart::new(dec!(7)), SplitPart::new(dec!(3))];
                            ctx.ledger.split(&owner, tx.id, parts).unwrap();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Per thread: 4 removed, 3 moved to Other as 4.00, 3 split in place (10.00 each)
    let main = ctx.accounts.get(ctx.owner(), account_id).unwrap();
    let other = ctx.accounts.get(ctx.owner(), other_id).unwrap();
    let threads = Decimal::from(THREAD_COUNT);
    assert_eq!(main.balance, dec!(1000) - dec!(30) * threads);
    assert_eq!(other.balance, dec!(50) - dec!(12) * threads);

    let report = ctx.doctor.check_balances(ctx.owner()).unwrap();
    assert!(report.is_healthy(), "drift: {:?}", report.drift);
    assert_eq!(report.transactions_checked, THREAD_COUNT * 9);
}

/// Test: readers never observe a half-applied split
#[test]
fn test_readers_see_consistent_balances_during_writes() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, account_id) = setup(&temp_dir, dec!(100));
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let owner = ctx.owner().clone();
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD * 3 {
                let draft = TransactionDraft::new(
                    account_id,
                    dec!(2),
                    TransactionType::Expense,
                    payday(),
                    format!("w{}", i),
                );
                let tx = ctx.ledger.create(&owner, draft).unwrap().remove(0);
                let parts = vec![SplitPart::new(dec!(1.5)), SplitPart::new(dec!(0.5))];
                ctx.ledger.split(&owner, tx.id, parts).unwrap();
            }
        })
    };

    let reader = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut checks = 0;
            for _ in 0..ITERATIONS_PER_THREAD * 3 {
                let report = ctx.doctor.check_balances(ctx.owner()).unwrap();
                assert!(report.is_healthy(), "drift: {:?}", report.drift);
                checks += 1;
            }
            checks
        })
    };

    writer.join().unwrap();
    assert_eq!(reader.join().unwrap(), ITERATIONS_PER_THREAD * 3);

    let account = ctx.accounts.get(ctx.owner(), account_id).unwrap();
    assert_eq!(account.balance, dec!(100) - dec!(2) * Decimal::from(ITERATIONS_PER_THREAD * 3));
}

/// Test: an unpaged listing always reports a total equal to the rows it returned
#[test]
fn test_listing_total_matches_items_during_writes() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, account_id) = setup(&temp_dir, dec!(0));
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let owner = ctx.owner().clone();
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD * 3 {
                let draft = TransactionDraft::new(
                    account_id,
                    dec!(1),
                    TransactionType::Income,
                    payday(),
                    format!("w{}", i),
                );
                ctx.ledger.create(&owner, draft).unwrap();
            }
        })
    };

    let reader = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let filter = TransactionFilter::for_account(account_id);
            barrier.wait();
            for _ in 0..ITERATIONS_PER_THREAD * 3 {
                let page = ctx.ledger.list(ctx.owner(), &filter).unwrap();
                assert_eq!(page.items.len(), page.total);
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    let page = ctx.ledger.list(ctx.owner(), &TransactionFilter::for_account(account_id)).unwrap();
    assert_eq!(page.total, ITERATIONS_PER_THREAD * 3);
}
