//! Doctor service - ledger health checks

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{OwnerId, TransactionFilter};
use crate::ports::LedgerStore;

/// One account whose stored balance disagrees with its transactions
#[derive(Debug, Clone, Serialize)]
pub struct BalanceDrift {
    pub account_id: Uuid,
    pub name: String,
    pub stored: Decimal,
    pub expected: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanTransaction {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub accounts_checked: usize,
    pub transactions_checked: usize,
    pub drift: Vec<BalanceDrift>,
    pub orphans: Vec<OrphanTransaction>,
}

impl DoctorReport {
    pub fn is_healthy(&self) -> bool {
        self.drift.is_empty() && self.orphans.is_empty()
    }
}

pub struct DoctorService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> DoctorService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compare each balance with opening balance plus transaction effects,
    /// and find transactions whose account is gone
    pub fn check_balances(&self, owner: &OwnerId) -> Result<DoctorReport> {
        // One unit so both reads see the same committed state
        let (accounts, transactions) = self.store.with_atomic_unit(|unit| {
            Ok((
                unit.accounts(owner)?,
                unit.transactions(owner, &TransactionFilter::default())?,
            ))
        })?;

        let mut effects: HashMap<Uuid, Decimal> = HashMap::new();
        for tx in &transactions {
            *effects.entry(tx.account_id).or_default() += tx.effect();
        }

        let drift: Vec<BalanceDrift> = accounts
            .iter()
            .filter_map(|a| {
                let expected = a.opening_balance + effects.get(&a.id).copied().unwrap_or_default();
                (expected != a.balance).then(|| BalanceDrift {
                    account_id: a.id,
                    name: a.name.clone(),
                    stored: a.balance,
                    expected,
                    difference: a.balance - expected,
                })
            })
            .collect();

        let known: HashSet<Uuid> = accounts.iter().map(|a| a.id).collect();
        let orphans: Vec<OrphanTransaction> = transactions
            .iter()
            .filter(|t| !known.contains(&t.account_id))
            .map(|t| OrphanTransaction {
                transaction_id: t.id,
                account_id: t.account_id,
            })
            .collect();

        if !drift.is_empty() || !orphans.is_empty() {
            tracing::warn!(drift = drift.len(), orphans = orphans.len(), "ledger check found problems");
        }

        Ok(DoctorReport {
            accounts_checked: accounts.len(),
            transactions_checked: transactions.len(),
            drift,
            orphans,
        })
    }
}
