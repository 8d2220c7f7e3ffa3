//! Debt service - debt records and payoff planning

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Debt, DebtDraft, DebtPatch, OwnerId, RepaymentStrategy, TransactionFilter};
use crate::ports::{Clock, LedgerStore, WriteOp};
use crate::services::projection::{self, DebtPlan};

pub struct DebtService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> DebtService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a debt. The original amount defaults to the current total.
    pub fn create(&self, owner: &OwnerId, draft: DebtDraft) -> Result<Debt> {
        if owner.is_empty() {
            return Err(Error::validation("owner id is required"));
        }
        draft.validate().map_err(Error::Validation)?;

        let now = self.clock.now();
        let debt = Debt {
            id: Uuid::new_v4(),
            owner_id: owner.clone(),
            name: draft.name.trim().to_string(),
            total_amount: draft.total_amount,
            original_amount: Some(draft.original_amount.unwrap_or(draft.total_amount)),
            interest_rate: draft.interest_rate,
            minimum_payment: draft.minimum_payment,
            installments_total: draft.installments_total,
            installments_paid: draft.installments_paid,
            first_installment_date: draft.first_installment_date,
            created_at: now,
            updated_at: now,
        };
        self.store.write_atomic(vec![WriteOp::InsertDebt(debt.clone())])?;
        Ok(debt)
    }

    pub fn get(&self, owner: &OwnerId, id: Uuid) -> Result<Debt> {
        self.store
            .debt(owner, id)?
            .ok_or_else(|| Error::not_found(format!("debt {}", id)))
    }

    pub fn list(&self, owner: &OwnerId) -> Result<Vec<Debt>> {
        self.store.debts(owner)
    }

    /// Apply a patch; a changed installment count recomputes the total
    pub fn update(&self, owner: &OwnerId, id: Uuid, patch: DebtPatch) -> Result<Debt> {
        let now = self.clock.now();
        self.store.with_atomic_unit(|unit| {
            let current = unit
                .debt(owner, id)?
                .ok_or_else(|| Error::not_found(format!("debt {}", id)))?;
            let next = patch.apply_to(&current, now).map_err(Error::Validation)?;
            unit.apply(WriteOp::UpdateDebt(next.clone()))?;
            Ok(next)
        })
    }

    /// Delete a debt no transaction refers to
    pub fn delete(&self, owner: &OwnerId, id: Uuid) -> Result<()> {
        self.store.with_atomic_unit(|unit| {
            if unit.debt(owner, id)?.is_none() {
                return Err(Error::not_found(format!("debt {}", id)));
            }
            let filter = TransactionFilter {
                debt_id: Some(id),
                ..Default::default()
            };
            let referencing = unit.count_transactions(owner, &filter)?;
            if referencing > 0 {
                return Err(Error::validation(format!(
                    "debt is referenced by {} transaction(s)",
                    referencing
                )));
            }
            unit.apply(WriteOp::DeleteDebt {
                owner_id: owner.clone(),
                id,
            })
        })
    }

    /// Project the owner's debts under one strategy, starting today
    pub fn plan(&self, owner: &OwnerId, strategy: RepaymentStrategy, monthly_extra: Decimal) -> Result<DebtPlan> {
        if monthly_extra < Decimal::ZERO {
            return Err(Error::validation("monthly extra payment cannot be negative"));
        }
        let debts = self.store.debts(owner)?;
        Ok(projection::plan(&debts, strategy, monthly_extra, self.clock.today()))
    }

    /// Every strategy side by side
    pub fn compare(&self, owner: &OwnerId, monthly_extra: Decimal) -> Result<Vec<DebtPlan>> {
        if monthly_extra < Decimal::ZERO {
            return Err(Error::validation("monthly extra payment cannot be negative"));
        }
        let debts = self.store.debts(owner)?;
        let today = self.clock.today();
        Ok(RepaymentStrategy::ALL
            .iter()
            .map(|s| projection::plan(&debts, *s, monthly_extra, today))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbLedger;
    use crate::domain::{Account, AccountKind, TransactionDraft, TransactionType};
    use crate::ports::FixedClock;
    use crate::services::LedgerService;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<DuckDbLedger>, DebtService<DuckDbLedger>, OwnerId) {
        let store = Arc::new(DuckDbLedger::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        let service = DebtService::new(Arc::clone(&store), clock);
        (store, service, OwnerId::from("alice"))
    }

    #[test]
    fn test_create_defaults_original_amount() {
        let (_, service, owner) = setup();
        let debt = service
            .create(&owner, DebtDraft::new("Card", dec!(1500), dec!(2.5), dec!(75)))
            .unwrap();
        assert_eq!(debt.original_amount, Some(dec!(1500)));
        assert_eq!(service.get(&owner, debt.id).unwrap().total_amount, dec!(1500));
    }

    #[test]
    fn test_update_installments_linear() {
        let (_, service, owner) = setup();
        let mut draft = DebtDraft::new("Laptop", dec!(1200), dec!(0), dec!(100));
        draft.installments_total = Some(12);
        let debt = service.create(&owner, draft).unwrap();

        let patch = DebtPatch {
            installments_paid: Some(3),
            ..Default::default()
        };
        let updated = service.update(&owner, debt.id, patch).unwrap();
        assert_eq!(updated.total_amount, dec!(900));
        assert_eq!(updated.installments_paid, Some(3));
    }

    #[test]
    fn test_update_rejects_negative_rate() {
        let (_, service, owner) = setup();
        let debt = service
            .create(&owner, DebtDraft::new("Card", dec!(100), dec!(1), dec!(10)))
            .unwrap();
        let patch = DebtPatch {
            interest_rate: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(matches!(service.update(&owner, debt.id, patch), Err(Error::Validation(_))));
    }

    #[test]
    fn test_delete_refuses_referenced_debt() {
        let (store, service, owner) = setup();
        let debt = service
            .create(&owner, DebtDraft::new("Loan", dec!(100), dec!(1), dec!(10)))
            .unwrap();

        let account = Account::new(
            Uuid::new_v4(),
            owner.clone(),
            "Checking",
            AccountKind::Bank,
            dec!(100),
            "USD",
            chrono::Utc::now(),
        );
        let account_id = account.id;
        store.write_atomic(vec![WriteOp::InsertAccount(account)]).unwrap();

        let clock = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        let ledger = LedgerService::new(Arc::clone(&store), clock);
        let mut payment = TransactionDraft::new(
            account_id,
            dec!(10),
            TransactionType::Expense,
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            "Loan payment",
        );
        payment.debt_id = Some(debt.id);
        let tx = ledger.create(&owner, payment).unwrap().remove(0);

        assert!(matches!(service.delete(&owner, debt.id), Err(Error::Validation(_))));
        ledger.remove(&owner, tx.id).unwrap();
        service.delete(&owner, debt.id).unwrap();
        assert!(matches!(service.get(&owner, debt.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_compare_runs_every_strategy() {
        let (_, service, owner) = setup();
        service
            .create(&owner, DebtDraft::new("Card", dec!(2000), dec!(4), dec!(120)))
            .unwrap();
        service
            .create(&owner, DebtDraft::new("Loan", dec!(800), dec!(1), dec!(50)))
            .unwrap();

        let plans = service.compare(&owner, dec!(100)).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].strategy, RepaymentStrategy::Snowball);
        assert!(plans.iter().all(|p| p.projection.converged));
        assert!(service.plan(&owner, RepaymentStrategy::Snowball, dec!(-1)).is_err());
    }
}
