//! Status service - ledger summary for one owner

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{AccountKind, OwnerId, TransactionFilter};
use crate::ports::LedgerStore;

pub struct StatusService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> StatusService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get_status(&self, owner: &OwnerId) -> Result<StatusSummary> {
        let accounts = self.store.accounts(owner)?;
        let total_transactions = self.store.count_transactions(owner, &TransactionFilter::default())?;
        let debts = self.store.debts(owner)?;
        let cards = self.store.credit_cards(owner)?;

        // Oldest and newest via single-row pages of the newest-first listing
        let newest = self.store.transactions(
            owner,
            &TransactionFilter {
                limit: Some(1),
                ..Default::default()
            },
        )?;
        let oldest = if total_transactions > 0 {
            self.store.transactions(
                owner,
                &TransactionFilter {
                    offset: Some(total_transactions - 1),
                    limit: Some(1),
                    ..Default::default()
                },
            )?
        } else {
            Vec::new()
        };

        Ok(StatusSummary {
            total_accounts: accounts.len(),
            total_transactions,
            total_debts: debts.len(),
            total_credit_cards: cards.len(),
            outstanding_debt: debts.iter().map(|d| d.total_amount).sum(),
            accounts: accounts
                .into_iter()
                .map(|a| AccountSummary {
                    id: a.id.to_string(),
                    name: a.name,
                    kind: a.kind,
                    balance: a.balance,
                    currency: a.currency,
                })
                .collect(),
            date_range: DateRange {
                earliest: oldest.first().map(|t| t.transaction_date.to_string()),
                latest: newest.first().map(|t| t.transaction_date.to_string()),
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: usize,
    pub total_transactions: usize,
    pub total_debts: usize,
    pub total_credit_cards: usize,
    pub outstanding_debt: Decimal,
    pub accounts: Vec<AccountSummary>,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbLedger;
    use crate::domain::{TransactionDraft, TransactionType};
    use crate::ports::{Clock, FixedClock};
    use crate::services::{AccountService, LedgerService};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_summary() {
        let store = Arc::new(DuckDbLedger::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        let owner = OwnerId::from("alice");
        let account = AccountService::new(Arc::clone(&store), Arc::clone(&clock))
            .create(&owner, "Checking", AccountKind::Bank, dec!(10), "USD")
            .unwrap();
        let ledger = LedgerService::new(Arc::clone(&store), clock);
        for day in [3, 1, 2] {
            let draft = TransactionDraft::new(
                account.id,
                dec!(1),
                TransactionType::Income,
                NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
                "Tip",
            );
            ledger.create(&owner, draft).unwrap();
        }

        let status = StatusService::new(store).get_status(&owner).unwrap();
        assert_eq!(status.total_accounts, 1);
        assert_eq!(status.total_transactions, 3);
        assert_eq!(status.accounts[0].balance, dec!(13));
        assert_eq!(status.date_range.earliest.as_deref(), Some("2025-01-01"));
        assert_eq!(status.date_range.latest.as_deref(), Some("2025-01-03"));
    }
}
