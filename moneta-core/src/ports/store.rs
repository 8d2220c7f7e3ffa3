//! Ledger store port - durable record storage with atomic units

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{
    Account, CreditCard, Debt, OwnerId, Transaction, TransactionFilter,
};

/// Read access to the ledger, scoped to one owner per call.
///
/// Reads of another owner's record behave exactly like reads of a missing one.
pub trait LedgerReader {
    fn account(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Account>>;

    /// All accounts, ordered by name
    fn accounts(&self, owner: &OwnerId) -> Result<Vec<Account>>;

    fn transaction(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Transaction>>;

    /// Matching transactions, newest first, honoring the filter's pagination
    fn transactions(&self, owner: &OwnerId, filter: &TransactionFilter) -> Result<Vec<Transaction>>;

    /// Number of matching transactions, ignoring pagination
    fn count_transactions(&self, owner: &OwnerId, filter: &TransactionFilter) -> Result<usize>;

    fn debt(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Debt>>;

    fn debts(&self, owner: &OwnerId) -> Result<Vec<Debt>>;

    fn credit_card(&self, owner: &OwnerId, id: Uuid) -> Result<Option<CreditCard>>;

    fn credit_cards(&self, owner: &OwnerId) -> Result<Vec<CreditCard>>;
}

/// One write inside an atomic unit
#[derive(Debug, Clone)]
pub enum WriteOp {
    InsertAccount(Account),
    /// Replaces name, kind, currency, balance and opening balance
    UpdateAccount(Account),
    DeleteAccount { owner_id: OwnerId, id: Uuid },
    SetAccountBalance {
        owner_id: OwnerId,
        account_id: Uuid,
        balance: rust_decimal::Decimal,
    },
    InsertTransaction(Transaction),
    UpdateTransaction(Transaction),
    DeleteTransaction { owner_id: OwnerId, id: Uuid },
    InsertDebt(Debt),
    UpdateDebt(Debt),
    DeleteDebt { owner_id: OwnerId, id: Uuid },
    InsertCreditCard(CreditCard),
    DeleteCreditCard { owner_id: OwnerId, id: Uuid },
}

impl WriteOp {
    /// Short label for diagnostics; never includes amounts or descriptions
    pub fn label(&self) -> &'static str {
        match self {
            WriteOp::InsertAccount(_) => "insert_account",
            WriteOp::UpdateAccount(_) => "update_account",
            WriteOp::DeleteAccount { .. } => "delete_account",
            WriteOp::SetAccountBalance { .. } => "set_account_balance",
            WriteOp::InsertTransaction(_) => "insert_transaction",
            WriteOp::UpdateTransaction(_) => "update_transaction",
            WriteOp::DeleteTransaction { .. } => "delete_transaction",
            WriteOp::InsertDebt(_) => "insert_debt",
            WriteOp::UpdateDebt(_) => "update_debt",
            WriteOp::DeleteDebt { .. } => "delete_debt",
            WriteOp::InsertCreditCard(_) => "insert_credit_card",
            WriteOp::DeleteCreditCard { .. } => "delete_credit_card",
        }
    }
}

/// An open atomic unit. Reads observe the unit's own earlier writes.
///
/// A write that targets a missing row fails with `NotFound`, which aborts the unit.
pub trait LedgerUnit: LedgerReader {
    fn apply(&mut self, op: WriteOp) -> Result<()>;

    fn apply_all(&mut self, ops: Vec<WriteOp>) -> Result<()> {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }
}

/// Ledger store capability: reads plus commit-or-abort multi-record writes
pub trait LedgerStore: LedgerReader + Send + Sync {
    /// Run `f` inside one atomic unit. Commits when `f` returns `Ok`, rolls
    /// back every write of the unit otherwise and returns the error unchanged.
    ///
    /// `f` must only touch the store through the unit it is given.
    fn with_atomic_unit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerUnit) -> Result<T>;

    /// Execute an ordered list of writes as one unit
    fn write_atomic(&self, ops: Vec<WriteOp>) -> Result<()> {
        self.with_atomic_unit(|unit| unit.apply_all(ops))
    }
}
