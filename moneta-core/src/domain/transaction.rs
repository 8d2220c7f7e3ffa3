//! Transaction domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::money;
use super::owner::OwnerId;

/// Direction of a transaction. Amounts are always stored positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }

    /// Signed balance delta of `amount` moving in this direction
    pub fn effect(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

/// A single financial transaction belonging to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub account_id: Uuid,
    /// Always positive; direction lives in `transaction_type`
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub transaction_date: NaiveDate,
    pub description: String,
    pub category: Option<String>,
    pub debt_id: Option<Uuid>,
    pub credit_card_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // =========================================================================
    // Statement import tracking
    // =========================================================================
    /// Hash of the import signature, set on confirmed import candidates
    pub import_fingerprint: Option<String>,
    /// Which import batch this transaction belongs to
    pub import_batch_id: Option<String>,
}

impl Transaction {
    /// Signed balance delta this transaction contributes to its account
    pub fn effect(&self) -> Decimal {
        self.transaction_type.effect(self.amount)
    }

    /// Dedup signature of this transaction
    pub fn signature(&self) -> String {
        signature(self.transaction_date, self.amount, &self.description)
    }
}

/// Dedup key: `YYYY-MM-DD|amount with 2 decimals|lowercased trimmed description`
pub fn signature(date: NaiveDate, amount: Decimal, description: &str) -> String {
    format!(
        "{}|{}|{}",
        date.format("%Y-%m-%d"),
        money::fixed2(amount),
        description.trim().to_lowercase()
    )
}

/// Stable import fingerprint: first 8 bytes of SHA-256 over account and signature, hex encoded
pub fn fingerprint(account_id: Uuid, signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(signature.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Validate a transaction amount: strictly positive and storable
pub fn validate_amount(amount: Decimal) -> Result<(), String> {
    if amount <= Decimal::ZERO {
        return Err(format!("amount must be greater than zero, got {}", amount));
    }
    if !money::fits_scale(amount) {
        return Err(format!(
            "amount {} has more than {} decimal places",
            amount,
            money::MAX_SCALE
        ));
    }
    Ok(())
}

/// Upper bound on monthly occurrences of a recurring draft (30 years)
pub const MAX_REPEAT_COUNT: u32 = 360;

/// Input for creating one or more transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub debt_id: Option<Uuid>,
    #[serde(default)]
    pub credit_card_id: Option<Uuid>,
    /// Repeat the draft `repeat_count` times, one calendar month apart
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub repeat_count: Option<u32>,
    #[serde(default)]
    pub import_fingerprint: Option<String>,
    #[serde(default)]
    pub import_batch_id: Option<String>,
}

impl TransactionDraft {
    pub fn new(
        account_id: Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            amount,
            transaction_type,
            date,
            description: description.into(),
            category: None,
            debt_id: None,
            credit_card_id: None,
            is_recurring: false,
            repeat_count: None,
            import_fingerprint: None,
            import_batch_id: None,
        }
    }

    /// Number of occurrences this draft expands into
    pub fn occurrences(&self) -> u32 {
        if self.is_recurring {
            self.repeat_count.unwrap_or(1)
        } else {
            1
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_amount(self.amount)?;
        if self.is_recurring {
            match self.repeat_count {
                Some(0) => return Err("repeat count must be at least 1".to_string()),
                Some(n) if n > MAX_REPEAT_COUNT => {
                    return Err(format!("repeat count cannot exceed {}", MAX_REPEAT_COUNT));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Partial update of a transaction; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub transaction_type: Option<TransactionType>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.transaction_type.is_none()
            && self.date.is_none()
            && self.description.is_none()
            && self.account_id.is_none()
            && self.category.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        Ok(())
    }

    /// Apply the patch onto a copy of `current`
    pub fn apply_to(&self, current: &Transaction, now: DateTime<Utc>) -> Transaction {
        let mut next = current.clone();
        if let Some(amount) = self.amount {
            next.amount = amount;
        }
        if let Some(kind) = self.transaction_type {
            next.transaction_type = kind;
        }
        if let Some(date) = self.date {
            next.transaction_date = date;
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(account_id) = self.account_id {
            next.account_id = account_id;
        }
        if let Some(category) = &self.category {
            next.category = Some(category.clone());
        }
        next.updated_at = now;
        next
    }
}

/// One part of a split; missing fields fall back to the original transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPart {
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl SplitPart {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount,
            description: None,
            category: None,
        }
    }
}

/// Listing filter. All criteria are combined with AND
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Case-sensitive substring of the description
    pub search: Option<String>,
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub debt_id: Option<Uuid>,
    pub credit_card_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn for_account(account_id: Uuid) -> Self {
        Self {
            account_id: Some(account_id),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    /// Same criteria without pagination, for counting
    pub fn unpaged(&self) -> Self {
        Self {
            offset: None,
            limit: None,
            ..self.clone()
        }
    }
}

/// One page of a transaction listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Transaction {
        let now = Utc::now();
        Transaction {
            id: Uuid::new_v4(),
            owner_id: OwnerId::from("owner"),
            account_id: Uuid::new_v4(),
            amount: dec!(50.00),
            transaction_type: TransactionType::Expense,
            transaction_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            description: "  ACME Store ".to_string(),
            category: None,
            debt_id: None,
            credit_card_id: None,
            created_at: now,
            updated_at: now,
            import_fingerprint: None,
            import_batch_id: None,
        }
    }

    #[test]
    fn test_effect_sign() {
        assert_eq!(TransactionType::Income.effect(dec!(10)), dec!(10));
        assert_eq!(TransactionType::Expense.effect(dec!(10)), dec!(-10));
        assert_eq!(sample().effect(), dec!(-50));
    }

    #[test]
    fn test_signature_format() {
        assert_eq!(sample().signature(), "2025-01-15|50.00|acme store");
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_ne!(
            signature(date, dec!(50.00), "acme store"),
            signature(date, dec!(50.01), "acme store")
        );
    }

    #[test]
    fn test_fingerprint_generation() {
        let account_id = Uuid::parse_str("12345678-1234-1234-1234-123456789abc").unwrap();
        let fp = fingerprint(account_id, "2025-01-15|50.00|acme store");
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, fingerprint(account_id, "2025-01-15|50.00|acme store"));
        assert_ne!(fp, fingerprint(Uuid::new_v4(), "2025-01-15|50.00|acme store"));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec!(0.01)).is_ok());
        assert!(validate_amount(dec!(0)).is_err());
        assert!(validate_amount(dec!(-5)).is_err());
        assert!(validate_amount(dec!(1.00001)).is_err());
    }

    #[test]
    fn test_recurring_occurrences() {
        let mut draft = TransactionDraft::new(
            Uuid::new_v4(),
            dec!(10),
            TransactionType::Expense,
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            "Rent",
        );
        assert_eq!(draft.occurrences(), 1);
        draft.repeat_count = Some(3);
        assert_eq!(draft.occurrences(), 1);
        draft.is_recurring = true;
        assert_eq!(draft.occurrences(), 3);
        draft.repeat_count = Some(0);
        assert!(draft.validate().is_err());
        draft.repeat_count = Some(MAX_REPEAT_COUNT);
        assert!(draft.validate().is_ok());
        draft.repeat_count = Some(MAX_REPEAT_COUNT + 1);
        assert!(draft.validate().is_err());
        draft.repeat_count = Some(u32::MAX);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let current = sample();
        let patch = TransactionPatch {
            amount: Some(dec!(75)),
            ..Default::default()
        };
        let next = patch.apply_to(&current, Utc::now());
        assert_eq!(next.amount, dec!(75));
        assert_eq!(next.transaction_type, TransactionType::Expense);
        assert_eq!(next.account_id, current.account_id);
        assert_eq!(next.description, current.description);
    }
}
