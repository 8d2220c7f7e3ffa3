//! Ledger service - balance reconciliation
//!
//! Keeps every account balance equal to its opening balance plus the effects
//! of the transactions persisted against it. Each create occurrence, update,
//! remove and split runs inside one atomic unit of the store.

use std::sync::Arc;

use chrono::Months;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    OwnerId, SplitPart, Transaction, TransactionDraft, TransactionFilter, TransactionPage,
    TransactionPatch, TransactionType,
};
use crate::ports::{Clock, LedgerStore, LedgerUnit, WriteOp};

/// Reconciliation engine over a ledger store
pub struct LedgerService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a transaction, or one per month for a recurring draft.
    ///
    /// Every occurrence is its own atomic unit. When a later occurrence fails the
    /// earlier ones stay committed and the error is returned.
    pub fn create(&self, owner: &OwnerId, draft: TransactionDraft) -> Result<Vec<Transaction>> {
        require_owner(owner)?;
        draft.validate().map_err(Error::Validation)?;

        let occurrences = draft.occurrences();
        let mut created = Vec::new();

        for i in 0..occurrences {
            let date = draft
                .date
                .checked_add_months(Months::new(i))
                .ok_or_else(|| Error::validation("recurring date out of range"))?;
            let now = self.clock.now();
            let tx = Transaction {
                id: Uuid::new_v4(),
                owner_id: owner.clone(),
                account_id: draft.account_id,
                amount: draft.amount,
                transaction_type: draft.transaction_type,
                transaction_date: date,
                description: draft.description.clone(),
                category: draft.category.clone(),
                debt_id: draft.debt_id,
                credit_card_id: draft.credit_card_id,
                created_at: now,
                updated_at: now,
                import_fingerprint: draft.import_fingerprint.clone(),
                import_batch_id: draft.import_batch_id.clone(),
            };

            let result = self.store.with_atomic_unit(|unit| {
                insert_applied(unit, owner, &tx)?;
                if let Some(debt_id) = tx.debt_id {
                    let mut debt = unit
                        .debt(owner, debt_id)?
                        .ok_or_else(|| Error::not_found(format!("debt {}", debt_id)))?;
                    if tx.transaction_type == TransactionType::Expense {
                        // Overpaying may take the debt below zero
                        debt.total_amount -= tx.amount;
                        debt.updated_at = now;
                        unit.apply(WriteOp::UpdateDebt(debt))?;
                    }
                }
                Ok(())
            });

            match result {
                Ok(()) => created.push(tx),
                Err(e) => {
                    if !created.is_empty() {
                        tracing::warn!(
                            committed = created.len(),
                            requested = occurrences,
                            code = e.code(),
                            "recurring batch interrupted; earlier occurrences remain"
                        );
                    }
                    return Err(e);
                }
            }
        }

        Ok(created)
    }

    pub fn find_one(&self, owner: &OwnerId, id: Uuid) -> Result<Transaction> {
        self.store
            .transaction(owner, id)?
            .ok_or_else(|| Error::not_found(format!("transaction {}", id)))
    }

    /// Every transaction of the owner, newest first
    pub fn find_all(&self, owner: &OwnerId) -> Result<Vec<Transaction>> {
        self.store.transactions(owner, &TransactionFilter::default())
    }

    /// One filtered page plus the total number of matches
    pub fn list(&self, owner: &OwnerId, filter: &TransactionFilter) -> Result<TransactionPage> {
        let (items, total) = self.store.with_atomic_unit(|unit| {
            Ok((
                unit.transactions(owner, filter)?,
                unit.count_transactions(owner, &filter.unpaged())?,
            ))
        })?;
        Ok(TransactionPage {
            items,
            total,
            offset: filter.offset.unwrap_or(0),
            limit: filter.limit,
        })
    }

    /// Patch a transaction: revert its effect on the old account, persist the
    /// patch, then apply the new effect to the (re-read) target account.
    pub fn update(&self, owner: &OwnerId, id: Uuid, patch: TransactionPatch) -> Result<Transaction> {
        patch.validate().map_err(Error::Validation)?;
        let now = self.clock.now();

        self.store.with_atomic_unit(|unit| {
            let existing = load_transaction(unit, owner, id)?;
            shift_balance(unit, owner, existing.account_id, -existing.effect())?;

            let updated = patch.apply_to(&existing, now);
            unit.apply(WriteOp::UpdateTransaction(updated.clone()))?;

            // Re-read: the target may be the account reverted above
            shift_balance(unit, owner, updated.account_id, updated.effect())?;
            Ok(updated)
        })
    }

    /// Revert a transaction's effect and delete it
    pub fn remove(&self, owner: &OwnerId, id: Uuid) -> Result<Transaction> {
        self.store.with_atomic_unit(|unit| {
            let existing = load_transaction(unit, owner, id)?;
            shift_balance(unit, owner, existing.account_id, -existing.effect())?;
            unit.apply(WriteOp::DeleteTransaction {
                owner_id: owner.clone(),
                id,
            })?;
            Ok(existing)
        })
    }

    /// Replace a transaction with parts whose amounts sum exactly to the original.
    ///
    /// Parts share the original's account, date, type and references. The net
    /// balance change is zero.
    pub fn split(&self, owner: &OwnerId, id: Uuid, parts: Vec<SplitPart>) -> Result<Vec<Transaction>> {
        if parts.is_empty() {
            return Err(Error::validation("split needs at least one part"));
        }
        for part in &parts {
            crate::domain::transaction::validate_amount(part.amount).map_err(Error::Validation)?;
        }
        let now = self.clock.now();

        self.store.with_atomic_unit(|unit| {
            let original = load_transaction(unit, owner, id)?;

            let sum: Decimal = parts.iter().map(|p| p.amount).sum();
            if sum != original.amount {
                return Err(Error::validation(format!(
                    "split parts sum to {} but the transaction amount is {}",
                    sum, original.amount
                )));
            }

            shift_balance(unit, owner, original.account_id, -original.effect())?;

            let mut created = Vec::with_capacity(parts.len());
            for part in &parts {
                let tx = Transaction {
                    id: Uuid::new_v4(),
                    amount: part.amount,
                    description: part
                        .description
                        .clone()
                        .unwrap_or_else(|| original.description.clone()),
                    category: part.category.clone().or_else(|| original.category.clone()),
                    created_at: now,
                    updated_at: now,
                    import_fingerprint: None,
                    ..original.clone()
                };
                insert_applied(unit, owner, &tx)?;
                created.push(tx);
            }

            unit.apply(WriteOp::DeleteTransaction {
                owner_id: owner.clone(),
                id,
            })?;
            Ok(created)
        })
    }
}

fn require_owner(owner: &OwnerId) -> Result<()> {
    if owner.is_empty() {
        return Err(Error::validation("owner id is required"));
    }
    Ok(())
}

fn load_transaction(unit: &dyn LedgerUnit, owner: &OwnerId, id: Uuid) -> Result<Transaction> {
    unit.transaction(owner, id)?
        .ok_or_else(|| Error::not_found(format!("transaction {}", id)))
}

/// Add `delta` to an account's current balance within the unit
fn shift_balance(unit: &mut dyn LedgerUnit, owner: &OwnerId, account_id: Uuid, delta: Decimal) -> Result<Decimal> {
    let account = unit
        .account(owner, account_id)?
        .ok_or_else(|| Error::not_found(format!("account {}", account_id)))?;
    let balance = account
        .balance
        .checked_add(delta)
        .ok_or_else(|| Error::validation("account balance out of range"))?;
    unit.apply(WriteOp::SetAccountBalance {
        owner_id: owner.clone(),
        account_id,
        balance,
    })?;
    Ok(balance)
}

/// Insert a transaction and apply its effect; references must exist
fn insert_applied(unit: &mut dyn LedgerUnit, owner: &OwnerId, tx: &Transaction) -> Result<()> {
    if unit.account(owner, tx.account_id)?.is_none() {
        return Err(Error::not_found(format!("account {}", tx.account_id)));
    }
    if let Some(card_id) = tx.credit_card_id {
        if unit.credit_card(owner, card_id)?.is_none() {
            return Err(Error::not_found(format!("credit card {}", card_id)));
        }
    }
    if let Some(debt_id) = tx.debt_id {
        if unit.debt(owner, debt_id)?.is_none() {
            return Err(Error::not_found(format!("debt {}", debt_id)));
        }
    }
    unit.apply(WriteOp::InsertTransaction(tx.clone()))?;
    shift_balance(unit, owner, tx.account_id, tx.effect())?;
    Ok(())
}
