//! CSV statement parser driven by named column mappings

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{ColumnMappings, ImportOptions, ImportProfile};
use crate::domain::result::{Error, Result};
use crate::domain::{ParsedStatement, StatementLine};

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
];

/// Parses CSV statement buffers into statement lines
#[derive(Debug, Clone)]
pub struct CsvParser {
    mappings: ColumnMappings,
    options: ImportOptions,
    date_format: Option<String>,
    skip_rows: usize,
    fallback_description: String,
}

impl CsvParser {
    pub fn new(mappings: ColumnMappings, options: ImportOptions, fallback_description: impl Into<String>) -> Self {
        Self {
            mappings,
            options,
            date_format: None,
            skip_rows: 0,
            fallback_description: fallback_description.into(),
        }
    }

    pub fn from_profile(profile: &ImportProfile, fallback_description: impl Into<String>) -> Self {
        Self {
            mappings: profile.column_mappings.clone(),
            options: profile.options.clone(),
            date_format: profile.date_format.clone(),
            skip_rows: profile.skip_rows,
            fallback_description: fallback_description.into(),
        }
    }

    /// Parse a raw CSV buffer.
    ///
    /// Missing mapped columns fail the whole file. Rows with an unusable date or
    /// amount are skipped and counted.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedStatement> {
        let text = String::from_utf8_lossy(bytes);
        let body: String = text
            .lines()
            .skip(self.skip_rows)
            .collect::<Vec<_>>()
            .join("\n");

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| Error::validation(format!("Failed to read CSV header: {}", e)))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let date_idx = column(&self.mappings.date)
            .ok_or_else(|| Error::validation(format!("Date column '{}' not found", self.mappings.date)))?;

        // Debit/credit columns take precedence over a single amount column
        let debit_idx = self.mappings.debit.as_deref().and_then(column);
        let credit_idx = self.mappings.credit.as_deref().and_then(column);
        let amount_idx = if debit_idx.is_some() || credit_idx.is_some() {
            None
        } else {
            Some(column(&self.mappings.amount).ok_or_else(|| {
                Error::validation(format!("Amount column '{}' not found", self.mappings.amount))
            })?)
        };
        let desc_idx = self.mappings.description.as_deref().and_then(column);

        let mut statement = ParsedStatement::default();
        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(_) => {
                    statement.skipped_rows += 1;
                    continue;
                }
            };

            let Some(date) = record.get(date_idx).and_then(|s| self.parse_date(s)) else {
                statement.skipped_rows += 1;
                continue;
            };

            let amount = match amount_idx {
                Some(i) => record.get(i).and_then(parse_amount),
                None => {
                    let field = |idx: Option<usize>| {
                        idx.and_then(|i| record.get(i))
                            .filter(|s| !s.is_empty())
                            .and_then(parse_amount)
                    };
                    self.combine_debit_credit(field(debit_idx), field(credit_idx))
                }
            };
            let Some(mut amount) = amount.filter(|a| !a.is_zero()) else {
                statement.skipped_rows += 1;
                continue;
            };
            if self.options.flip_signs {
                amount = -amount;
            }

            let description = desc_idx
                .and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .unwrap_or(self.fallback_description.as_str());

            statement
                .lines
                .push(StatementLine::from_signed(amount, date, description));
        }

        tracing::debug!(
            entries = statement.lines.len(),
            skipped = statement.skipped_rows,
            "parsed CSV statement"
        );
        Ok(statement)
    }

    /// Debits keep their CSV sign unless `debit_negative` is set; with both
    /// columns filled the larger absolute value wins
    fn combine_debit_credit(&self, debit: Option<Decimal>, credit: Option<Decimal>) -> Option<Decimal> {
        let signed_debit = |d: Decimal| {
            if self.options.debit_negative && d > Decimal::ZERO {
                -d
            } else {
                d
            }
        };
        match (debit, credit) {
            (Some(d), None) => Some(signed_debit(d)),
            (None, Some(c)) => Some(c),
            (Some(d), Some(c)) if d.abs() >= c.abs() => Some(signed_debit(d)),
            (Some(_), Some(c)) => Some(c),
            (None, None) => None,
        }
    }

    fn parse_date(&self, s: &str) -> Option<NaiveDate> {
        let s = s.trim();
        self.date_format
            .iter()
            .map(String::as_str)
            .chain(DATE_FORMATS)
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    }
}

fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();

    // (100.00) -> -100.00
    let (is_negative, s) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    // Drop currency symbols, thousands separators and whitespace
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let amount: Decimal = cleaned.parse().ok()?;
    if is_negative && amount > Decimal::ZERO {
        Some(-amount)
    } else {
        Some(amount)
    }
}

/// Result of column auto-detection
#[derive(Debug, Default, Serialize)]
pub struct DetectedColumns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
}

impl DetectedColumns {
    /// Mappings usable by [`CsvParser`], if at least a date and an amount source were found
    pub fn into_mappings(self) -> Option<ColumnMappings> {
        let date = self.date?;
        if self.amount.is_none() && self.debit.is_none() && self.credit.is_none() {
            return None;
        }
        Some(ColumnMappings {
            date,
            amount: self.amount.unwrap_or_default(),
            description: self.description,
            credit: self.credit,
            debit: self.debit,
        })
    }
}

/// Best-guess column mapping from the header row
pub fn detect_columns(bytes: &[u8]) -> Result<DetectedColumns> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::validation(format!("Failed to read CSV header: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let date_patterns = ["date", "data", "posted", "dt"];
    let desc_patterns = ["description", "desc", "memo", "payee", "merchant", "details", "historico"];
    let amount_patterns = ["amount", "amt", "valor", "total"];
    let debit_patterns = ["debit", "withdrawal", "saida"];
    let credit_patterns = ["credit", "deposit", "entrada"];

    let matches = |header: &str, patterns: &[&str]| {
        let lower = header.to_lowercase();
        patterns.iter().any(|p| lower.contains(p))
    };

    let mut detected = DetectedColumns {
        date: headers.iter().find(|h| matches(h, &date_patterns)).cloned(),
        amount: headers.iter().find(|h| matches(h, &amount_patterns)).cloned(),
        ..Default::default()
    };

    if detected.amount.is_none() {
        detected.debit = headers.iter().find(|h| matches(h, &debit_patterns)).cloned();
        detected.credit = headers.iter().find(|h| matches(h, &credit_patterns)).cloned();
    }

    detected.description = headers
        .iter()
        .filter(|h| detected.date.as_ref() != Some(*h))
        .find(|h| matches(h, &desc_patterns))
        .or_else(|| {
            headers
                .iter()
                .filter(|h| detected.date.as_ref() != Some(*h))
                .find(|h| matches(h, &["name", "reference", "category"]))
        })
        .cloned();

    Ok(detected)
}
