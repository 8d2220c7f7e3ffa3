//! DuckDB ledger store implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use duckdb::{params, Connection, ToSql};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountKind, CreditCard, Debt, OwnerId, Transaction, TransactionFilter,
    TransactionType,
};
use crate::ports::{LedgerReader, LedgerStore, LedgerUnit, WriteOp};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock")
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Unavailable(format!("database error: {}", e))
    }
}

/// DuckDB-backed ledger store
///
/// One connection guarded by a mutex. An atomic unit holds the lock for its
/// whole lifetime, so units on the same store handle never interleave.
pub struct DuckDbLedger {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbLedger {
    /// Open (or create) the ledger database file.
    ///
    /// Retries with exponential backoff when another process holds the file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            "database busy, retrying: {}",
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.map(Error::from).unwrap_or_else(|| {
            Error::unavailable(format!("failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Private in-memory ledger, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Autoloading stays off: cached extensions in ~/.duckdb may be signed differently
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::debug!(applied = ?result.applied, "ledger schema upgraded");
        }
        Ok(())
    }

    /// Migrations recorded as applied
    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        MigrationService::new(&conn).get_applied()
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Size of the database file in bytes, 0 for in-memory ledgers
    pub fn db_size(&self) -> Result<u64> {
        match &self.db_path {
            Some(path) => Ok(std::fs::metadata(path)?.len()),
            None => Ok(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::unavailable(format!("ledger lock poisoned: {}", e)))
    }
}

/// An open DuckDB transaction; reads go through it and see its own writes
pub struct DuckDbUnit<'conn> {
    tx: duckdb::Transaction<'conn>,
}

impl DuckDbUnit<'_> {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&self.tx)
    }
}

impl DuckDbLedger {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&conn)
    }
}

/// Both the store and an open unit answer reads from the same queries
macro_rules! ledger_reader_via_conn {
    ($ty:ty) => {
        impl LedgerReader for $ty {
            fn account(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Account>> {
                self.with_conn(|conn| query_account(conn, owner, id))
            }

            fn accounts(&self, owner: &OwnerId) -> Result<Vec<Account>> {
                self.with_conn(|conn| query_accounts(conn, owner))
            }

            fn transaction(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Transaction>> {
                self.with_conn(|conn| query_transaction(conn, owner, id))
            }

            fn transactions(
                &self,
                owner: &OwnerId,
                filter: &TransactionFilter,
            ) -> Result<Vec<Transaction>> {
                self.with_conn(|conn| query_transactions(conn, owner, filter))
            }

            fn count_transactions(&self, owner: &OwnerId, filter: &TransactionFilter) -> Result<usize> {
                self.with_conn(|conn| count_transactions(conn, owner, filter))
            }

            fn debt(&self, owner: &OwnerId, id: Uuid) -> Result<Option<Debt>> {
                self.with_conn(|conn| query_debt(conn, owner, id))
            }

            fn debts(&self, owner: &OwnerId) -> Result<Vec<Debt>> {
                self.with_conn(|conn| query_debts(conn, owner))
            }

            fn credit_card(&self, owner: &OwnerId, id: Uuid) -> Result<Option<CreditCard>> {
                self.with_conn(|conn| query_credit_card(conn, owner, id))
            }

            fn credit_cards(&self, owner: &OwnerId) -> Result<Vec<CreditCard>> {
                self.with_conn(|conn| query_credit_cards(conn, owner))
            }
        }
    };
}

ledger_reader_via_conn!(DuckDbLedger);
ledger_reader_via_conn!(DuckDbUnit<'_>);

impl LedgerUnit for DuckDbUnit<'_> {
    fn apply(&mut self, op: WriteOp) -> Result<()> {
        tracing::debug!(op = op.label(), "applying ledger write");
        apply_op(&self.tx, op)
    }
}

impl LedgerStore for DuckDbLedger {
    fn with_atomic_unit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn LedgerUnit) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let mut unit = DuckDbUnit {
            tx: conn.transaction()?,
        };
        match f(&mut unit) {
            Ok(value) => {
                unit.tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = unit.tx.rollback() {
                    tracing::warn!("rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

// =============================================================================
// Value conversion
// =============================================================================

fn corrupt(what: &str, value: &str) -> Error {
    Error::unavailable(format!("corrupt {} in ledger store: '{}'", what, value))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| corrupt("id", s))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim())
        .map(|d| d.normalize())
        .map_err(|_| corrupt("decimal", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| corrupt("date", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt("timestamp", s))
}

fn fmt_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn opt_u32(value: Option<i64>, what: &str) -> Result<Option<u32>> {
    value
        .map(|v| u32::try_from(v).map_err(|_| corrupt(what, &v.to_string())))
        .transpose()
}

// =============================================================================
// Accounts
// =============================================================================

const ACCOUNT_COLUMNS: &str = "account_id, owner_id, name, kind, balance::VARCHAR, \
     opening_balance::VARCHAR, currency, created_at, updated_at";

struct AccountRow {
    id: String,
    owner_id: String,
    name: String,
    kind: String,
    balance: String,
    opening_balance: String,
    currency: String,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            balance: row.get(4)?,
            opening_balance: row.get(5)?,
            currency: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_domain(self) -> Result<Account> {
        Ok(Account {
            id: parse_uuid(&self.id)?,
            owner_id: OwnerId::new(self.owner_id),
            name: self.name,
            kind: AccountKind::from_str(&self.kind).map_err(|_| corrupt("account kind", &self.kind))?,
            balance: parse_decimal(&self.balance)?,
            opening_balance: parse_decimal(&self.opening_balance)?,
            currency: self.currency,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn query_account(conn: &Connection, owner: &OwnerId, id: Uuid) -> Result<Option<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM accounts WHERE owner_id = ? AND account_id = ?",
        ACCOUNT_COLUMNS
    ))?;
    let row = stmt
        .query_map(params![owner.as_str(), id.to_string()], AccountRow::read)?
        .next()
        .transpose()?;
    row.map(AccountRow::into_domain).transpose()
}

fn query_accounts(conn: &Connection, owner: &OwnerId) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM accounts WHERE owner_id = ? ORDER BY name, created_at",
        ACCOUNT_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![owner.as_str()], AccountRow::read)?
        .collect::<duckdb::Result<Vec<_>>>()?;
    rows.into_iter().map(AccountRow::into_domain).collect()
}

// =============================================================================
// Transactions
// =============================================================================

const TRANSACTION_COLUMNS: &str = "transaction_id, owner_id, account_id, amount::VARCHAR, \
     transaction_type, transaction_date::VARCHAR, description, category, debt_id, \
     credit_card_id, import_fingerprint, import_batch_id, created_at, updated_at";

struct TransactionRow {
    id: String,
    owner_id: String,
    account_id: String,
    amount: String,
    transaction_type: String,
    transaction_date: String,
    description: String,
    category: Option<String>,
    debt_id: Option<String>,
    credit_card_id: Option<String>,
    import_fingerprint: Option<String>,
    import_batch_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TransactionRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            account_id: row.get(2)?,
            amount: row.get(3)?,
            transaction_type: row.get(4)?,
            transaction_date: row.get(5)?,
            description: row.get(6)?,
            category: row.get(7)?,
            debt_id: row.get(8)?,
            credit_card_id: row.get(9)?,
            import_fingerprint: row.get(10)?,
            import_batch_id: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_domain(self) -> Result<Transaction> {
        Ok(Transaction {
            id: parse_uuid(&self.id)?,
            owner_id: OwnerId::new(self.owner_id),
            account_id: parse_uuid(&self.account_id)?,
            amount: parse_decimal(&self.amount)?,
            transaction_type: TransactionType::from_str(&self.transaction_type)
                .map_err(|_| corrupt("transaction type", &self.transaction_type))?,
            transaction_date: parse_date(&self.transaction_date)?,
            description: self.description,
            category: self.category,
            debt_id: parse_opt_uuid(self.debt_id)?,
            credit_card_id: parse_opt_uuid(self.credit_card_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            import_fingerprint: self.import_fingerprint,
            import_batch_id: self.import_batch_id,
        })
    }
}

fn query_transaction(conn: &Connection, owner: &OwnerId, id: Uuid) -> Result<Option<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions WHERE owner_id = ? AND transaction_id = ?",
        TRANSACTION_COLUMNS
    ))?;
    let row = stmt
        .query_map(params![owner.as_str(), id.to_string()], TransactionRow::read)?
        .next()
        .transpose()?;
    row.map(TransactionRow::into_domain).transpose()
}

/// WHERE clause and parameters for a listing filter, pagination excluded
fn filter_clause(owner: &OwnerId, filter: &TransactionFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clause = String::from("WHERE owner_id = ?");
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(owner.as_str().to_string())];

    if let Some(search) = filter.search.as_ref().filter(|s| !s.is_empty()) {
        // contains() is case-sensitive
        clause.push_str(" AND contains(description, ?)");
        values.push(Box::new(search.clone()));
    }
    if let Some(account_id) = filter.account_id {
        clause.push_str(" AND account_id = ?");
        values.push(Box::new(account_id.to_string()));
    }
    if let Some(category) = &filter.category {
        clause.push_str(" AND category = ?");
        values.push(Box::new(category.clone()));
    }
    if let Some(debt_id) = filter.debt_id {
        clause.push_str(" AND debt_id = ?");
        values.push(Box::new(debt_id.to_string()));
    }
    if let Some(card_id) = filter.credit_card_id {
        clause.push_str(" AND credit_card_id = ?");
        values.push(Box::new(card_id.to_string()));
    }
    if let Some(from) = filter.date_from {
        clause.push_str(" AND transaction_date >= CAST(? AS DATE)");
        values.push(Box::new(fmt_date(from)));
    }
    if let Some(to) = filter.date_to {
        clause.push_str(" AND transaction_date <= CAST(? AS DATE)");
        values.push(Box::new(fmt_date(to)));
    }

    (clause, values)
}

fn query_transactions(
    conn: &Connection,
    owner: &OwnerId,
    filter: &TransactionFilter,
) -> Result<Vec<Transaction>> {
    let (clause, values) = filter_clause(owner, filter);
    let mut sql = format!(
        "SELECT {} FROM transactions {} ORDER BY transaction_date DESC, created_at DESC, transaction_id",
        TRANSACTION_COLUMNS, clause
    );
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = filter.offset.filter(|o| *o > 0) {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    let param_refs: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(param_refs.as_slice(), TransactionRow::read)?
        .collect::<duckdb::Result<Vec<_>>>()?;
    rows.into_iter().map(TransactionRow::into_domain).collect()
}

fn count_transactions(conn: &Connection, owner: &OwnerId, filter: &TransactionFilter) -> Result<usize> {
    let (clause, values) = filter_clause(owner, filter);
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM transactions {}", clause),
        param_refs.as_slice(),
        |row| row.get(0),
    )?;
    Ok(count.max(0) as usize)
}

// =============================================================================
// Debts
// =============================================================================

const DEBT_COLUMNS: &str = "debt_id, owner_id, name, total_amount::VARCHAR, \
     original_amount::VARCHAR, interest_rate::VARCHAR, minimum_payment::VARCHAR, \
     installments_total::BIGINT, installments_paid::BIGINT, first_installment_date::VARCHAR, \
     created_at, updated_at";

struct DebtRow {
    id: String,
    owner_id: String,
    name: String,
    total_amount: String,
    original_amount: Option<String>,
    interest_rate: String,
    minimum_payment: String,
    installments_total: Option<i64>,
    installments_paid: Option<i64>,
    first_installment_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DebtRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            total_amount: row.get(3)?,
            original_amount: row.get(4)?,
            interest_rate: row.get(5)?,
            minimum_payment: row.get(6)?,
            installments_total: row.get(7)?,
            installments_paid: row.get(8)?,
            first_installment_date: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_domain(self) -> Result<Debt> {
        Ok(Debt {
            id: parse_uuid(&self.id)?,
            owner_id: OwnerId::new(self.owner_id),
            name: self.name,
            total_amount: parse_decimal(&self.total_amount)?,
            original_amount: self.original_amount.as_deref().map(parse_decimal).transpose()?,
            interest_rate: parse_decimal(&self.interest_rate)?,
            minimum_payment: parse_decimal(&self.minimum_payment)?,
            installments_total: opt_u32(self.installments_total, "installments total")?,
            installments_paid: opt_u32(self.installments_paid, "installments paid")?,
            first_installment_date: self
                .first_installment_date
                .as_deref()
                .map(parse_date)
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn query_debt(conn: &Connection, owner: &OwnerId, id: Uuid) -> Result<Option<Debt>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM debts WHERE owner_id = ? AND debt_id = ?",
        DEBT_COLUMNS
    ))?;
    let row = stmt
        .query_map(params![owner.as_str(), id.to_string()], DebtRow::read)?
        .next()
        .transpose()?;
    row.map(DebtRow::into_domain).transpose()
}

fn query_debts(conn: &Connection, owner: &OwnerId) -> Result<Vec<Debt>> {
    // Creation order is the tie-break order the projector preserves
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM debts WHERE owner_id = ? ORDER BY created_at, debt_id",
        DEBT_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![owner.as_str()], DebtRow::read)?
        .collect::<duckdb::Result<Vec<_>>>()?;
    rows.into_iter().map(DebtRow::into_domain).collect()
}

// =============================================================================
// Credit cards
// =============================================================================

const CARD_COLUMNS: &str = "credit_card_id, owner_id, name, credit_limit::VARCHAR, \
     closing_day::BIGINT, due_day::BIGINT, account_id, created_at";

struct CardRow {
    id: String,
    owner_id: String,
    name: String,
    credit_limit: String,
    closing_day: i64,
    due_day: i64,
    account_id: String,
    created_at: String,
}

impl CardRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            credit_limit: row.get(3)?,
            closing_day: row.get(4)?,
            due_day: row.get(5)?,
            account_id: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_domain(self) -> Result<CreditCard> {
        let day = |v: i64, what: &str| opt_u32(Some(v), what).map(|d| d.unwrap_or_default());
        Ok(CreditCard {
            id: parse_uuid(&self.id)?,
            owner_id: OwnerId::new(self.owner_id),
            name: self.name,
            credit_limit: parse_decimal(&self.credit_limit)?,
            closing_day: day(self.closing_day, "closing day")?,
            due_day: day(self.due_day, "due day")?,
            account_id: parse_uuid(&self.account_id)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn query_credit_card(conn: &Connection, owner: &OwnerId, id: Uuid) -> Result<Option<CreditCard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM credit_cards WHERE owner_id = ? AND credit_card_id = ?",
        CARD_COLUMNS
    ))?;
    let row = stmt
        .query_map(params![owner.as_str(), id.to_string()], CardRow::read)?
        .next()
        .transpose()?;
    row.map(CardRow::into_domain).transpose()
}

fn query_credit_cards(conn: &Connection, owner: &OwnerId) -> Result<Vec<CreditCard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM credit_cards WHERE owner_id = ? ORDER BY name, created_at",
        CARD_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![owner.as_str()], CardRow::read)?
        .collect::<duckdb::Result<Vec<_>>>()?;
    rows.into_iter().map(CardRow::into_domain).collect()
}

// =============================================================================
// Writes
// =============================================================================

/// Fail the unit when a targeted write touched nothing
fn expect_row(affected: usize, what: &str, id: Uuid) -> Result<()> {
    if affected == 0 {
        return Err(Error::not_found(format!("{} {}", what, id)));
    }
    Ok(())
}

fn apply_op(conn: &Connection, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::InsertAccount(a) => {
            conn.execute(
                "INSERT INTO accounts (account_id, owner_id, name, kind, balance, opening_balance,
                                       currency, created_at, updated_at)
                 VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18,4)), CAST(? AS DECIMAL(18,4)), ?, ?, ?)",
                params![
                    a.id.to_string(),
                    a.owner_id.as_str(),
                    a.name,
                    a.kind.as_str(),
                    a.balance.to_string(),
                    a.opening_balance.to_string(),
                    a.currency,
                    fmt_timestamp(&a.created_at),
                    fmt_timestamp(&a.updated_at),
                ],
            )?;
        }
        WriteOp::UpdateAccount(a) => {
            let affected = conn.execute(
                "UPDATE accounts SET name = ?, kind = ?, balance = CAST(? AS DECIMAL(18,4)),
                        opening_balance = CAST(? AS DECIMAL(18,4)), currency = ?, updated_at = ?
                 WHERE owner_id = ? AND account_id = ?",
                params![
                    a.name,
                    a.kind.as_str(),
                    a.balance.to_string(),
                    a.opening_balance.to_string(),
                    a.currency,
                    fmt_timestamp(&a.updated_at),
                    a.owner_id.as_str(),
                    a.id.to_string(),
                ],
            )?;
            expect_row(affected, "account", a.id)?;
        }
        WriteOp::DeleteAccount { owner_id, id } => {
            let affected = conn.execute(
                "DELETE FROM accounts WHERE owner_id = ? AND account_id = ?",
                params![owner_id.as_str(), id.to_string()],
            )?;
            expect_row(affected, "account", id)?;
        }
        WriteOp::SetAccountBalance {
            owner_id,
            account_id,
            balance,
        } => {
            let affected = conn.execute(
                "UPDATE accounts SET balance = CAST(? AS DECIMAL(18,4)), updated_at = ?
                 WHERE owner_id = ? AND account_id = ?",
                params![
                    balance.to_string(),
                    fmt_timestamp(&Utc::now()),
                    owner_id.as_str(),
                    account_id.to_string(),
                ],
            )?;
            expect_row(affected, "account", account_id)?;
        }
        WriteOp::InsertTransaction(t) => {
            conn.execute(
                "INSERT INTO transactions (transaction_id, owner_id, account_id, amount, transaction_type,
                                           transaction_date, description, category, debt_id, credit_card_id,
                                           import_fingerprint, import_batch_id, created_at, updated_at)
                 VALUES (?, ?, ?, CAST(? AS DECIMAL(18,4)), ?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    t.id.to_string(),
                    t.owner_id.as_str(),
                    t.account_id.to_string(),
                    t.amount.to_string(),
                    t.transaction_type.as_str(),
                    fmt_date(t.transaction_date),
                    t.description,
                    t.category,
                    t.debt_id.map(|id| id.to_string()),
                    t.credit_card_id.map(|id| id.to_string()),
                    t.import_fingerprint,
                    t.import_batch_id,
                    fmt_timestamp(&t.created_at),
                    fmt_timestamp(&t.updated_at),
                ],
            )?;
        }
        WriteOp::UpdateTransaction(t) => {
            let affected = conn.execute(
                "UPDATE transactions SET account_id = ?, amount = CAST(? AS DECIMAL(18,4)),
                        transaction_type = ?, transaction_date = CAST(? AS DATE), description = ?,
                        category = ?, debt_id = ?, credit_card_id = ?, updated_at = ?
                 WHERE owner_id = ? AND transaction_id = ?",
                params![
                    t.account_id.to_string(),
                    t.amount.to_string(),
                    t.transaction_type.as_str(),
                    fmt_date(t.transaction_date),
                    t.description,
                    t.category,
                    t.debt_id.map(|id| id.to_string()),
                    t.credit_card_id.map(|id| id.to_string()),
                    fmt_timestamp(&t.updated_at),
                    t.owner_id.as_str(),
                    t.id.to_string(),
                ],
            )?;
            expect_row(affected, "transaction", t.id)?;
        }
        WriteOp::DeleteTransaction { owner_id, id } => {
            let affected = conn.execute(
                "DELETE FROM transactions WHERE owner_id = ? AND transaction_id = ?",
                params![owner_id.as_str(), id.to_string()],
            )?;
            expect_row(affected, "transaction", id)?;
        }
        WriteOp::InsertDebt(d) => {
            conn.execute(
                "INSERT INTO debts (debt_id, owner_id, name, total_amount, original_amount, interest_rate,
                                    minimum_payment, installments_total, installments_paid,
                                    first_installment_date, created_at, updated_at)
                 VALUES (?, ?, ?, CAST(? AS DECIMAL(18,4)), CAST(? AS DECIMAL(18,4)), CAST(? AS DECIMAL(18,4)),
                         CAST(? AS DECIMAL(18,4)), ?, ?, CAST(? AS DATE), ?, ?)",
                params![
                    d.id.to_string(),
                    d.owner_id.as_str(),
                    d.name,
                    d.total_amount.to_string(),
                    d.original_amount.map(|v| v.to_string()),
                    d.interest_rate.to_string(),
                    d.minimum_payment.to_string(),
                    d.installments_total.map(i64::from),
                    d.installments_paid.map(i64::from),
                    d.first_installment_date.map(fmt_date),
                    fmt_timestamp(&d.created_at),
                    fmt_timestamp(&d.updated_at),
                ],
            )?;
        }
        WriteOp::UpdateDebt(d) => {
            let affected = conn.execute(
                "UPDATE debts SET name = ?, total_amount = CAST(? AS DECIMAL(18,4)),
                        original_amount = CAST(? AS DECIMAL(18,4)), interest_rate = CAST(? AS DECIMAL(18,4)),
                        minimum_payment = CAST(? AS DECIMAL(18,4)), installments_total = ?,
                        installments_paid = ?, first_installment_date = CAST(? AS DATE), updated_at = ?
                 WHERE owner_id = ? AND debt_id = ?",
                params![
                    d.name,
                    d.total_amount.to_string(),
                    d.original_amount.map(|v| v.to_string()),
                    d.interest_rate.to_string(),
                    d.minimum_payment.to_string(),
                    d.installments_total.map(i64::from),
                    d.installments_paid.map(i64::from),
                    d.first_installment_date.map(fmt_date),
                    fmt_timestamp(&d.updated_at),
                    d.owner_id.as_str(),
                    d.id.to_string(),
                ],
            )?;
            expect_row(affected, "debt", d.id)?;
        }
        WriteOp::DeleteDebt { owner_id, id } => {
            let affected = conn.execute(
                "DELETE FROM debts WHERE owner_id = ? AND debt_id = ?",
                params![owner_id.as_str(), id.to_string()],
            )?;
            expect_row(affected, "debt", id)?;
        }
        WriteOp::InsertCreditCard(c) => {
            conn.execute(
                "INSERT INTO credit_cards (credit_card_id, owner_id, name, credit_limit, closing_day,
                                           due_day, account_id, created_at)
                 VALUES (?, ?, ?, CAST(? AS DECIMAL(18,4)), ?, ?, ?, ?)",
                params![
                    c.id.to_string(),
                    c.owner_id.as_str(),
                    c.name,
                    c.credit_limit.to_string(),
                    i64::from(c.closing_day),
                    i64::from(c.due_day),
                    c.account_id.to_string(),
                    fmt_timestamp(&c.created_at),
                ],
            )?;
        }
        WriteOp::DeleteCreditCard { owner_id, id } => {
            let affected = conn.execute(
                "DELETE FROM credit_cards WHERE owner_id = ? AND credit_card_id = ?",
                params![owner_id.as_str(), id.to_string()],
            )?;
            expect_row(affected, "credit card", id)?;
        }
    }
    Ok(())
}
