//! Statement import domain model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::{self, TransactionType};

/// Statement formats the import pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Ofx,
    Csv,
}

impl StatementFormat {
    /// OFX when the `<OFX>` root tag is present anywhere in the buffer, else CSV
    pub fn detect(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        if text.to_uppercase().contains("<OFX>") {
            StatementFormat::Ofx
        } else {
            StatementFormat::Csv
        }
    }
}

impl std::str::FromStr for StatementFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ofx" | "qfx" => Ok(StatementFormat::Ofx),
            "csv" => Ok(StatementFormat::Csv),
            other => Err(format!("unknown statement format '{}'", other)),
        }
    }
}

/// One parsed statement entry, before it is bound to an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    /// Absolute value of the raw amount
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    pub description: String,
}

impl StatementLine {
    /// Build a line from a signed raw amount: positive is income, anything else expense
    pub fn from_signed(amount: Decimal, date: NaiveDate, description: impl Into<String>) -> Self {
        let transaction_type = if amount > Decimal::ZERO {
            TransactionType::Income
        } else {
            TransactionType::Expense
        };
        Self {
            amount: amount.abs(),
            transaction_type,
            date,
            description: description.into(),
        }
    }
}

/// A parsed-but-unconfirmed transaction targeting an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    pub description: String,
    pub signature: String,
}

impl ImportCandidate {
    pub fn from_line(account_id: Uuid, line: StatementLine) -> Self {
        let signature = transaction::signature(line.date, line.amount, &line.description);
        Self {
            account_id,
            amount: line.amount,
            transaction_type: line.transaction_type,
            date: line.date,
            description: line.description,
            signature,
        }
    }

    pub fn fingerprint(&self) -> String {
        transaction::fingerprint(self.account_id, &self.signature)
    }
}

/// Parser output: lines plus how many input rows were unusable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub lines: Vec<StatementLine>,
    pub skipped_rows: usize,
}

/// Result of dry-running an import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub format: StatementFormat,
    /// Candidates that survived deduplication, in statement order
    pub candidates: Vec<ImportCandidate>,
    pub duplicates: usize,
    pub skipped_rows: usize,
}

/// Per-candidate failure recorded during confirm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFailure {
    /// Position of the candidate in the confirmed list
    pub index: usize,
    pub message: String,
}

/// Outcome of confirming candidates. Partial success is expected
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batch_id: String,
    pub imported: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub skipped_rows: usize,
    pub errors: Vec<ImportFailure>,
    pub transaction_ids: Vec<Uuid>,
}

impl ImportSummary {
    /// Fold another summary into this one, re-basing failure indexes
    pub fn absorb(&mut self, other: ImportSummary) {
        let base = self.imported + self.failed;
        self.imported += other.imported;
        self.failed += other.failed;
        self.duplicates += other.duplicates;
        self.skipped_rows += other.skipped_rows;
        self.errors.extend(other.errors.into_iter().map(|e| ImportFailure {
            index: base + e.index,
            message: e.message,
        }));
        self.transaction_ids.extend(other.transaction_ids);
    }
}
