//! Invoice service - credit card statement totals

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Invoice, OwnerId, TransactionFilter, TransactionType};
use crate::ports::LedgerStore;

pub struct InvoiceService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> InvoiceService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Invoice closing in `year`/`month`: card-tagged expenses minus refunds
    /// dated inside the billing period
    pub fn invoice(&self, owner: &OwnerId, card_id: Uuid, year: i32, month: u32) -> Result<Invoice> {
        let card = self
            .store
            .credit_card(owner, card_id)?
            .ok_or_else(|| Error::not_found(format!("credit card {}", card_id)))?;

        let invalid = || Error::validation(format!("invalid invoice month {}-{:02}", year, month));
        let (period_start, period_end) = card.billing_period(year, month).ok_or_else(invalid)?;
        let due_date = card.due_date(year, month).ok_or_else(invalid)?;

        let filter = TransactionFilter {
            credit_card_id: Some(card_id),
            ..Default::default()
        }
        .between(period_start, period_end);
        let mut transactions = self.store.transactions(owner, &filter)?;
        transactions.reverse();

        let total = transactions
            .iter()
            .map(|t| match t.transaction_type {
                TransactionType::Expense => t.amount,
                TransactionType::Income => -t.amount,
            })
            .sum::<Decimal>();

        Ok(Invoice {
            credit_card_id: card_id,
            year,
            month,
            period_start,
            period_end,
            due_date,
            total,
            transactions,
        })
    }
}
