//! Integration tests for moneta-core services
//!
//! These tests exercise the services against a real DuckDB file in a
//! temporary directory, opened through `MonetaContext`.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::Arc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;
use uuid::Uuid;

use moneta_core::domain::{
    DebtDraft, DebtPatch, ImportCandidate, SplitPart, StatementLine, TransactionDraft,
    TransactionFilter, TransactionPatch,
};
use moneta_core::ports::{Clock, FixedClock};
use moneta_core::services::ImportOptions;
use moneta_core::services::projection::sort_debts;
use moneta_core::{AccountKind, Error, MonetaContext, RepaymentStrategy, TransactionType};

// ============================================================================
// Test Helpers
// ============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Open a context on a fresh directory with the clock pinned to 2025-03-01
fn create_test_context(temp_dir: &TempDir) -> MonetaContext {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(2025, 3, 1)));
    MonetaContext::with_clock(temp_dir.path(), clock).expect("Failed to open context")
}

fn create_account(ctx: &MonetaContext, name: &str, opening: Decimal) -> Uuid {
    ctx.accounts
        .create(ctx.owner(), name, AccountKind::Bank, opening, "USD")
        .expect("Failed to create account")
        .id
}

fn balance(ctx: &MonetaContext, account_id: Uuid) -> Decimal {
    ctx.accounts.get(ctx.owner(), account_id).unwrap().balance
}

fn draft(account_id: Uuid, amount: Decimal, kind: TransactionType, description: &str) -> TransactionDraft {
    TransactionDraft::new(account_id, amount, kind, date(2025, 2, 10), description)
}

fn account_transactions(ctx: &MonetaContext, account_id: Uuid) -> Vec<moneta_core::Transaction> {
    ctx.ledger
        .list(ctx.owner(), &TransactionFilter::for_account(account_id))
        .unwrap()
        .items
}

/// Opening balance plus the effect of every persisted transaction
fn expected_balance(ctx: &MonetaContext, account_id: Uuid) -> Decimal {
    let account = ctx.accounts.get(ctx.owner(), account_id).unwrap();
    let effects: Decimal = account_transactions(ctx, account_id)
        .iter()
        .map(|t| t.effect())
        .sum();
    account.opening_balance + effects
}

// ============================================================================
// Reconciliation
// ============================================================================

#[test]
fn test_end_to_end_balance_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(1000));

    let tx = ctx
        .ledger
        .create(&owner, draft(account, dec!(100), TransactionType::Income, "Salary"))
        .unwrap()
        .remove(0);
    assert_eq!(balance(&ctx, account), dec!(1100));

    let patch = TransactionPatch {
        amount: Some(dec!(50)),
        transaction_type: Some(TransactionType::Expense),
        ..Default::default()
    };
    ctx.ledger.update(&owner, tx.id, patch).unwrap();
    assert_eq!(balance(&ctx, account), dec!(950));

    ctx.ledger.remove(&owner, tx.id).unwrap();
    assert_eq!(balance(&ctx, account), dec!(1000));
}

#[test]
fn test_balances_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let account = {
        let ctx = create_test_context(&temp_dir);
        let account = create_account(&ctx, "Checking", dec!(10));
        ctx.ledger
            .create(ctx.owner(), draft(account, dec!(2.50), TransactionType::Expense, "Bus"))
            .unwrap();
        account
    };

    let ctx = create_test_context(&temp_dir);
    assert_eq!(balance(&ctx, account), dec!(7.50));
    assert_eq!(ctx.store.applied_migrations().unwrap().len(), 3);
}

#[test]
fn test_create_then_remove_restores_balance_exactly() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let account = create_account(&ctx, "Wallet", dec!(0.07));

    for (amount, kind) in [
        (dec!(0.01), TransactionType::Expense),
        (dec!(123456.78), TransactionType::Income),
        (dec!(3.333), TransactionType::Expense),
    ] {
        let tx = ctx
            .ledger
            .create(ctx.owner(), draft(account, amount, kind, "Round trip"))
            .unwrap()
            .remove(0);
        ctx.ledger.remove(ctx.owner(), tx.id).unwrap();
        assert_eq!(balance(&ctx, account), dec!(0.07));
    }
}

#[test]
fn test_split_conservation_and_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(500));

    let tx = ctx
        .ledger
        .create(&owner, draft(account, dec!(90), TransactionType::Expense, "Groceries"))
        .unwrap()
        .remove(0);
    assert_eq!(balance(&ctx, account), dec!(410));

    // Off by one cent either way: nothing changes
    for parts in [
        vec![SplitPart::new(dec!(45)), SplitPart::new(dec!(45.01))],
        vec![SplitPart::new(dec!(45)), SplitPart::new(dec!(44.99))],
    ] {
        let err = ctx.ledger.split(&owner, tx.id, parts).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
    assert_eq!(balance(&ctx, account), dec!(410));
    assert!(ctx.ledger.find_one(&owner, tx.id).is_ok());

    let parts = vec![
        SplitPart {
            amount: dec!(60),
            description: Some("Food".into()),
            category: Some("food".into()),
        },
        SplitPart::new(dec!(30)),
    ];
    let created = ctx.ledger.split(&owner, tx.id, parts).unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].description, "Groceries");
    assert_eq!(balance(&ctx, account), dec!(410));
    assert!(matches!(
        ctx.ledger.find_one(&owner, tx.id),
        Err(Error::NotFound(_))
    ));
    assert_eq!(expected_balance(&ctx, account), dec!(410));
}

#[test]
fn test_update_account_switch() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let x = create_account(&ctx, "X", dec!(100));
    let y = create_account(&ctx, "Y", dec!(100));

    let tx = ctx
        .ledger
        .create(&owner, draft(x, dec!(20), TransactionType::Expense, "Lunch"))
        .unwrap()
        .remove(0);

    // X == X is a no-op for the balance
    let same = TransactionPatch {
        account_id: Some(x),
        ..Default::default()
    };
    ctx.ledger.update(&owner, tx.id, same).unwrap();
    assert_eq!(balance(&ctx, x), dec!(80));

    // Move to Y while flipping type and amount
    let moved = TransactionPatch {
        account_id: Some(y),
        amount: Some(dec!(35)),
        transaction_type: Some(TransactionType::Income),
        ..Default::default()
    };
    ctx.ledger.update(&owner, tx.id, moved).unwrap();
    assert_eq!(balance(&ctx, x), dec!(100));
    assert_eq!(balance(&ctx, y), dec!(135));

    // Unknown target account aborts the whole update
    let bad = TransactionPatch {
        account_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    assert!(matches!(
        ctx.ledger.update(&owner, tx.id, bad),
        Err(Error::NotFound(_))
    ));
    assert_eq!(balance(&ctx, y), dec!(135));
    assert_eq!(ctx.ledger.find_one(&owner, tx.id).unwrap().account_id, y);
}

#[test]
fn test_random_operations_keep_ledger_invariant() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let accounts = [
        create_account(&ctx, "A", dec!(1000)),
        create_account(&ctx, "B", dec!(0)),
        create_account(&ctx, "C", dec!(-50)),
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut live: Vec<Uuid> = Vec::new();

    for step in 0..150 {
        let account = accounts[rng.gen_range(0..accounts.len())];
        let cents = rng.gen_range(2..50_000i64);
        let amount = Decimal::new(cents, 2);
        let kind = if rng.gen_bool(0.5) {
            TransactionType::Income
        } else {
            TransactionType::Expense
        };

        match rng.gen_range(0..4) {
            0 | 1 if live.len() < 40 => {
                let created = ctx
                    .ledger
                    .create(&owner, draft(account, amount, kind, &format!("op {}", step)))
                    .unwrap();
                live.extend(created.iter().map(|t| t.id));
            }
            2 if !live.is_empty() => {
                let id = live[rng.gen_range(0..live.len())];
                let patch = TransactionPatch {
                    amount: Some(amount),
                    transaction_type: Some(kind),
                    account_id: Some(account),
                    ..Default::default()
                };
                ctx.ledger.update(&owner, id, patch).unwrap();
            }
            3 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                let id = live[index];
                if rng.gen_bool(0.5) {
                    ctx.ledger.remove(&owner, id).unwrap();
                    live.swap_remove(index);
                } else {
                    let original = ctx.ledger.find_one(&owner, id).unwrap().amount;
                    let first = (original / dec!(3)).round_dp(2).max(dec!(0.01));
                    let rest = original - first;
                    if rest <= Decimal::ZERO {
                        continue;
                    }
                    let parts = vec![SplitPart::new(first), SplitPart::new(rest)];
                    let created = ctx.ledger.split(&owner, id, parts).unwrap();
                    live.swap_remove(index);
                    live.extend(created.iter().map(|t| t.id));
                }
            }
            _ => {
                let created = ctx
                    .ledger
                    .create(&owner, draft(account, amount, kind, "filler"))
                    .unwrap();
                live.extend(created.iter().map(|t| t.id));
            }
        }

        if step % 25 == 0 {
            for account in accounts {
                assert_eq!(balance(&ctx, account), expected_balance(&ctx, account));
            }
        }
    }

    for account in accounts {
        assert_eq!(balance(&ctx, account), expected_balance(&ctx, account));
    }
    let report = ctx.doctor.check_balances(&owner).unwrap();
    assert!(report.is_healthy(), "drift: {:?}", report.drift);
    assert_eq!(report.transactions_checked, live.len());
}

// ============================================================================
// Debts
// ============================================================================

#[test]
fn test_installment_rule_both_branches() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();

    let mut anchored = DebtDraft::new("Laptop", dec!(1200), dec!(0), dec!(100));
    anchored.installments_total = Some(12);
    anchored.installments_paid = Some(0);
    let anchored = ctx.debts.create(&owner, anchored).unwrap();
    assert_eq!(anchored.original_amount, Some(dec!(1200)));

    let paid = |n| DebtPatch {
        installments_paid: Some(n),
        ..Default::default()
    };
    let updated = ctx.debts.update(&owner, anchored.id, paid(3)).unwrap();
    assert_eq!(updated.total_amount, dec!(900));
    let updated = ctx.debts.update(&owner, anchored.id, paid(15)).unwrap();
    assert_eq!(updated.total_amount, dec!(0));

    // No installment count: differential update by the minimum payment
    let legacy = ctx
        .debts
        .create(&owner, DebtDraft::new("Loan", dec!(500), dec!(1), dec!(80)))
        .unwrap();
    let updated = ctx.debts.update(&owner, legacy.id, paid(2)).unwrap();
    assert_eq!(updated.total_amount, dec!(340));
}

#[test]
fn test_debt_payment_and_strategy_comparison() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(5000));

    let card = ctx
        .debts
        .create(&owner, DebtDraft::new("Card", dec!(2000), dec!(3), dec!(100)))
        .unwrap();
    ctx.debts
        .create(&owner, DebtDraft::new("Car", dec!(800), dec!(1), dec!(80)))
        .unwrap();

    let mut payment = draft(account, dec!(250), TransactionType::Expense, "Card payment");
    payment.debt_id = Some(card.id);
    ctx.ledger.create(&owner, payment).unwrap();
    assert_eq!(ctx.debts.get(&owner, card.id).unwrap().total_amount, dec!(1750));
    assert_eq!(balance(&ctx, account), dec!(4750));

    // Referenced debts cannot be deleted
    assert!(matches!(
        ctx.debts.delete(&owner, card.id),
        Err(Error::Validation(_))
    ));

    let debts = ctx.debts.list(&owner).unwrap();
    let snowball = sort_debts(&debts, RepaymentStrategy::Snowball);
    assert!(snowball.windows(2).all(|w| w[0].total_amount <= w[1].total_amount));
    let avalanche = sort_debts(&debts, RepaymentStrategy::Avalanche);
    assert!(avalanche.windows(2).all(|w| w[0].interest_rate >= w[1].interest_rate));

    let plans = ctx.debts.compare(&owner, dec!(200)).unwrap();
    assert_eq!(plans.len(), 2);
    for plan in &plans {
        assert!(plan.projection.converged);
        assert!(plan.projection.saved_interest > Decimal::ZERO);
        assert_eq!(plan.projection.schedule[0].date, date(2025, 3, 1));
    }
    let avalanche = plans
        .iter()
        .find(|p| p.strategy == RepaymentStrategy::Avalanche)
        .unwrap();
    let snowball = plans
        .iter()
        .find(|p| p.strategy == RepaymentStrategy::Snowball)
        .unwrap();
    assert!(avalanche.projection.total_interest <= snowball.projection.total_interest);
}

// ============================================================================
// Import
// ============================================================================

const SINGLE_ENTRY_OFX: &str = "OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>\n<BANKMSGSRSV1>\n<STMTTRNRS>\n<STMTRS>\n<BANKTRANLIST>\n<STMTTRN>\n<TRNTYPE>DEBIT\n<DTPOSTED>20250215120000[-3:BRT]\n<TRNAMT>-42,90\n<MEMO>PHARMACY\n</STMTTRN>\n</BANKTRANLIST>\n</STMTRS>\n</STMTTRNRS>\n</BANKMSGSRSV1>\n</OFX>\n";

#[test]
fn test_ofx_single_entry_import_and_reimport() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(100));

    let summary = ctx
        .imports
        .import(&owner, account, SINGLE_ENTRY_OFX.as_bytes(), &ImportOptions::default())
        .unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(balance(&ctx, account), dec!(57.10));

    let stored = ctx.ledger.find_all(&owner).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].description, "PHARMACY");
    assert_eq!(stored[0].transaction_date, date(2025, 2, 15));
    assert_eq!(stored[0].transaction_type, TransactionType::Expense);
    assert_eq!(stored[0].import_batch_id.as_deref(), Some("import_20250301_000000"));

    let again = ctx
        .imports
        .import(&owner, account, SINGLE_ENTRY_OFX.as_bytes(), &ImportOptions::default())
        .unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.duplicates, 1);
    assert_eq!(balance(&ctx, account), dec!(57.10));
}

#[test]
fn test_csv_dedup_keeps_one_cent_difference() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(0));

    let mut existing = TransactionDraft::new(
        account,
        dec!(4.50),
        TransactionType::Expense,
        date(2025, 1, 10),
        "Coffee Shop",
    );
    existing.category = Some("food".into());
    ctx.ledger.create(&owner, existing).unwrap();

    let csv = "Date,Amount,Description\n\
               2025-01-10,-4.50,  COFFEE SHOP \n\
               2025-01-10,-4.51,Coffee Shop\n";
    let preview = ctx
        .imports
        .preview(&owner, account, csv.as_bytes(), &ImportOptions::default())
        .unwrap();
    assert_eq!(preview.duplicates, 1);
    assert_eq!(preview.candidates.len(), 1);
    assert_eq!(preview.candidates[0].amount, dec!(4.51));

    // Preview never writes
    assert_eq!(ctx.ledger.find_all(&owner).unwrap().len(), 1);
}

#[test]
fn test_import_partial_failure_commits_the_rest() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(0));

    let line = |amount: Decimal, description: &str| {
        StatementLine::from_signed(amount, date(2025, 2, 1), description)
    };
    let candidates = vec![
        ImportCandidate::from_line(account, line(dec!(10), "first")),
        ImportCandidate::from_line(Uuid::new_v4(), line(dec!(20), "wrong account")),
        ImportCandidate::from_line(account, line(dec!(-5), "third")),
    ];
    let summary = ctx.imports.confirm(&owner, &candidates);

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].index, 1);
    assert_eq!(summary.transaction_ids.len(), 2);
    assert_eq!(balance(&ctx, account), dec!(5));
}

#[test]
fn test_malformed_statement_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();
    let account = create_account(&ctx, "Checking", dec!(0));

    let broken = "<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><BANKTRANLIST><STMTTRN><MEMO>no amount</STMTTRN></BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>";
    let err = ctx
        .imports
        .import(&owner, account, broken.as_bytes(), &ImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(ctx.ledger.find_all(&owner).unwrap().is_empty());
}

// ============================================================================
// Credit cards
// ============================================================================

#[test]
fn test_credit_card_invoice_and_cascade_delete() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    let owner = ctx.owner().clone();

    let card = ctx
        .accounts
        .create_credit_card(
            &owner,
            moneta_core::services::CreditCardDraft {
                name: "Visa".into(),
                credit_limit: dec!(3000),
                closing_day: 5,
                due_day: 15,
                currency: "USD".into(),
            },
        )
        .unwrap();

    for (day, amount, kind) in [
        (6, dec!(100), TransactionType::Expense),
        (20, dec!(40), TransactionType::Expense),
        (25, dec!(15), TransactionType::Income),
    ] {
        let mut purchase = TransactionDraft::new(card.account_id, amount, kind, date(2025, 1, day), "Card");
        purchase.credit_card_id = Some(card.id);
        ctx.ledger.create(&owner, purchase).unwrap();
    }

    let invoice = ctx.invoices.invoice(&owner, card.id, 2025, 2).unwrap();
    assert_eq!(invoice.transactions.len(), 3);
    assert_eq!(invoice.total, dec!(125));
    assert!(invoice.transactions.windows(2).all(|w| w[0].transaction_date <= w[1].transaction_date));

    assert!(matches!(
        ctx.accounts.delete_credit_card(&owner, card.id, false),
        Err(Error::Validation(_))
    ));
    let removed = ctx.accounts.delete_credit_card(&owner, card.id, true).unwrap();
    assert_eq!(removed, 3);
    assert!(ctx.accounts.list(&owner).unwrap().is_empty());
}
