//! Account service - accounts and credit cards

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountKind, CreditCard, OwnerId, TransactionFilter};
use crate::ports::{Clock, LedgerStore, LedgerUnit, WriteOp};

/// Input for creating a credit card and its paired account
#[derive(Debug, Clone)]
pub struct CreditCardDraft {
    pub name: String,
    pub credit_limit: Decimal,
    pub closing_day: u32,
    pub due_day: u32,
    pub currency: String,
}

pub struct AccountService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> AccountService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create(
        &self,
        owner: &OwnerId,
        name: &str,
        kind: AccountKind,
        opening_balance: Decimal,
        currency: &str,
    ) -> Result<Account> {
        if owner.is_empty() {
            return Err(Error::validation("owner id is required"));
        }
        let account = Account::new(
            Uuid::new_v4(),
            owner.clone(),
            name,
            kind,
            opening_balance,
            currency,
            self.clock.now(),
        );
        account.validate().map_err(Error::validation)?;
        self.store.write_atomic(vec![WriteOp::InsertAccount(account.clone())])?;
        Ok(account)
    }

    pub fn get(&self, owner: &OwnerId, id: Uuid) -> Result<Account> {
        self.store
            .account(owner, id)?
            .ok_or_else(|| Error::not_found(format!("account {}", id)))
    }

    pub fn list(&self, owner: &OwnerId) -> Result<Vec<Account>> {
        self.store.accounts(owner)
    }

    pub fn rename(&self, owner: &OwnerId, id: Uuid, name: &str) -> Result<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("account name cannot be empty"));
        }
        let now = self.clock.now();
        self.store.with_atomic_unit(|unit| {
            let mut account = load_account(unit, owner, id)?;
            account.name = name.to_string();
            account.updated_at = now;
            unit.apply(WriteOp::UpdateAccount(account.clone()))?;
            Ok(account)
        })
    }

    /// Administrative correction: set the balance directly. The opening balance
    /// moves by the same delta so the ledger check still holds.
    pub fn correct_balance(&self, owner: &OwnerId, id: Uuid, balance: Decimal) -> Result<Account> {
        let now = self.clock.now();
        self.store.with_atomic_unit(|unit| {
            let mut account = load_account(unit, owner, id)?;
            let delta = balance - account.balance;
            account.balance = balance;
            account.opening_balance += delta;
            account.updated_at = now;
            account.validate().map_err(Error::validation)?;
            unit.apply(WriteOp::UpdateAccount(account.clone()))?;
            tracing::debug!(account = %id, "account balance corrected");
            Ok(account)
        })
    }

    /// Delete an account. With transactions present this is refused unless
    /// `cascade` is set, in which case they go in the same unit. Returns the
    /// number of transactions removed.
    pub fn delete(&self, owner: &OwnerId, id: Uuid, cascade: bool) -> Result<usize> {
        self.store.with_atomic_unit(|unit| {
            load_account(unit, owner, id)?;
            if unit.credit_cards(owner)?.iter().any(|c| c.account_id == id) {
                return Err(Error::validation(
                    "account belongs to a credit card; delete the card instead",
                ));
            }
            let removed = delete_account_transactions(unit, owner, id, cascade)?;
            unit.apply(WriteOp::DeleteAccount {
                owner_id: owner.clone(),
                id,
            })?;
            Ok(removed)
        })
    }

    /// Create a card together with its paired credit-card account
    pub fn create_credit_card(&self, owner: &OwnerId, draft: CreditCardDraft) -> Result<CreditCard> {
        if owner.is_empty() {
            return Err(Error::validation("owner id is required"));
        }
        let now = self.clock.now();
        let account = Account::new(
            Uuid::new_v4(),
            owner.clone(),
            &draft.name,
            AccountKind::CreditCard,
            Decimal::ZERO,
            &draft.currency,
            now,
        );
        let card = CreditCard {
            id: Uuid::new_v4(),
            owner_id: owner.clone(),
            name: draft.name.trim().to_string(),
            credit_limit: draft.credit_limit,
            closing_day: draft.closing_day,
            due_day: draft.due_day,
            account_id: account.id,
            created_at: now,
        };
        account.validate().map_err(Error::validation)?;
        card.validate().map_err(Error::Validation)?;

        self.store.write_atomic(vec![
            WriteOp::InsertAccount(account),
            WriteOp::InsertCreditCard(card.clone()),
        ])?;
        Ok(card)
    }

    pub fn get_credit_card(&self, owner: &OwnerId, id: Uuid) -> Result<CreditCard> {
        self.store
            .credit_card(owner, id)?
            .ok_or_else(|| Error::not_found(format!("credit card {}", id)))
    }

    pub fn list_credit_cards(&self, owner: &OwnerId) -> Result<Vec<CreditCard>> {
        self.store.credit_cards(owner)
    }

    /// Delete a card and its paired account under the same cascade rule as
    /// accounts. Card-tagged transactions on other accounts are reverted too.
    pub fn delete_credit_card(&self, owner: &OwnerId, id: Uuid, cascade: bool) -> Result<usize> {
        self.store.with_atomic_unit(|unit| {
            let card = unit
                .credit_card(owner, id)?
                .ok_or_else(|| Error::not_found(format!("credit card {}", id)))?;

            let tagged = unit.transactions(
                owner,
                &TransactionFilter {
                    credit_card_id: Some(id),
                    ..Default::default()
                },
            )?;
            let elsewhere: Vec<_> = tagged
                .into_iter()
                .filter(|t| t.account_id != card.account_id)
                .collect();
            if !elsewhere.is_empty() && !cascade {
                return Err(Error::validation(format!(
                    "credit card is referenced by {} transaction(s)",
                    elsewhere.len()
                )));
            }
            for tx in &elsewhere {
                let mut account = load_account(unit, owner, tx.account_id)?;
                account.balance -= tx.effect();
                unit.apply(WriteOp::SetAccountBalance {
                    owner_id: owner.clone(),
                    account_id: account.id,
                    balance: account.balance,
                })?;
                unit.apply(WriteOp::DeleteTransaction {
                    owner_id: owner.clone(),
                    id: tx.id,
                })?;
            }

            let removed = delete_account_transactions(unit, owner, card.account_id, cascade)?;
            unit.apply(WriteOp::DeleteCreditCard {
                owner_id: owner.clone(),
                id,
            })?;
            unit.apply(WriteOp::DeleteAccount {
                owner_id: owner.clone(),
                id: card.account_id,
            })?;
            Ok(removed + elsewhere.len())
        })
    }
}

fn load_account(unit: &dyn LedgerUnit, owner: &OwnerId, id: Uuid) -> Result<Account> {
    unit.account(owner, id)?
        .ok_or_else(|| Error::not_found(format!("account {}", id)))
}

/// Remove every transaction of an account that is itself going away
fn delete_account_transactions(
    unit: &mut dyn LedgerUnit,
    owner: &OwnerId,
    account_id: Uuid,
    cascade: bool,
) -> Result<usize> {
    let transactions = unit.transactions(owner, &TransactionFilter::for_account(account_id))?;
    if !transactions.is_empty() && !cascade {
        return Err(Error::validation(format!(
            "account has {} transaction(s); pass cascade to delete them",
            transactions.len()
        )));
    }
    for tx in &transactions {
        unit.apply(WriteOp::DeleteTransaction {
            owner_id: owner.clone(),
            id: tx.id,
        })?;
    }
    Ok(transactions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbLedger;
    use crate::domain::{TransactionDraft, TransactionType};
    use crate::ports::{FixedClock, LedgerReader};
    use crate::services::LedgerService;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<DuckDbLedger>,
        accounts: AccountService<DuckDbLedger>,
        ledger: LedgerService<DuckDbLedger>,
        owner: OwnerId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(DuckDbLedger::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()));
        Fixture {
            accounts: AccountService::new(Arc::clone(&store), Arc::clone(&clock)),
            ledger: LedgerService::new(Arc::clone(&store), clock),
            store,
            owner: OwnerId::from("alice"),
        }
    }

    fn spend(f: &Fixture, account_id: Uuid, amount: Decimal, card: Option<Uuid>) {
        let mut draft = TransactionDraft::new(
            account_id,
            amount,
            TransactionType::Expense,
            NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            "Lunch",
        );
        draft.credit_card_id = card;
        f.ledger.create(&f.owner, draft).unwrap();
    }

    #[test]
    fn test_create_and_rename() {
        let f = fixture();
        let account = f
            .accounts
            .create(&f.owner, " Wallet ", AccountKind::Wallet, dec!(20), "brl")
            .unwrap();
        assert_eq!(account.name, "Wallet");
        assert_eq!(account.currency, "BRL");

        let renamed = f.accounts.rename(&f.owner, account.id, "Pocket").unwrap();
        assert_eq!(renamed.name, "Pocket");
        assert_eq!(f.accounts.list(&f.owner).unwrap().len(), 1);
        assert!(f.accounts.rename(&f.owner, account.id, "  ").is_err());
    }

    #[test]
    fn test_correct_balance_moves_opening_anchor() {
        let f = fixture();
        let account = f
            .accounts
            .create(&f.owner, "Checking", AccountKind::Bank, dec!(100), "USD")
            .unwrap();
        spend(&f, account.id, dec!(30), None);

        let corrected = f.accounts.correct_balance(&f.owner, account.id, dec!(50)).unwrap();
        assert_eq!(corrected.balance, dec!(50));
        assert_eq!(corrected.opening_balance, dec!(80));
    }

    #[test]
    fn test_delete_requires_cascade() {
        let f = fixture();
        let account = f
            .accounts
            .create(&f.owner, "Checking", AccountKind::Bank, dec!(100), "USD")
            .unwrap();
        spend(&f, account.id, dec!(5), None);

        assert!(matches!(
            f.accounts.delete(&f.owner, account.id, false),
            Err(Error::Validation(_))
        ));
        assert_eq!(f.accounts.delete(&f.owner, account.id, true).unwrap(), 1);
        assert!(f.store.account(&f.owner, account.id).unwrap().is_none());
        assert!(f.ledger.find_all(&f.owner).unwrap().is_empty());
    }

    #[test]
    fn test_credit_card_pairs_account() {
        let f = fixture();
        let card = f
            .accounts
            .create_credit_card(
                &f.owner,
                CreditCardDraft {
                    name: "Visa".to_string(),
                    credit_limit: dec!(5000),
                    closing_day: 10,
                    due_day: 20,
                    currency: "USD".to_string(),
                },
            )
            .unwrap();
        let paired = f.accounts.get(&f.owner, card.account_id).unwrap();
        assert_eq!(paired.kind, AccountKind::CreditCard);

        // The paired account can only go away with its card
        assert!(f.accounts.delete(&f.owner, paired.id, true).is_err());

        spend(&f, card.account_id, dec!(40), Some(card.id));
        assert!(f.accounts.delete_credit_card(&f.owner, card.id, false).is_err());
        assert_eq!(f.accounts.delete_credit_card(&f.owner, card.id, true).unwrap(), 1);
        assert!(f.accounts.list_credit_cards(&f.owner).unwrap().is_empty());
        assert!(f.accounts.list(&f.owner).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_card_days_write_nothing() {
        let f = fixture();
        let result = f.accounts.create_credit_card(
            &f.owner,
            CreditCardDraft {
                name: "Broken".to_string(),
                credit_limit: dec!(100),
                closing_day: 0,
                due_day: 40,
                currency: "USD".to_string(),
            },
        );
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(f.accounts.list(&f.owner).unwrap().is_empty());
    }
}
