//! Credit card and invoice domain model

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money;
use super::owner::OwnerId;
use super::transaction::Transaction;

/// A credit card. Its spending is tracked on a paired account of kind credit card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub name: String,
    pub credit_limit: Decimal,
    /// Day of month the statement closes, clamped to the month length
    pub closing_day: u32,
    /// Day of month the invoice is due
    pub due_day: u32,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CreditCard {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("card name cannot be empty".to_string());
        }
        if self.credit_limit < Decimal::ZERO || !money::fits_scale(self.credit_limit) {
            return Err(format!("invalid credit limit {}", self.credit_limit));
        }
        for (label, day) in [("closing day", self.closing_day), ("due day", self.due_day)] {
            if !(1..=31).contains(&day) {
                return Err(format!("{} must be between 1 and 31, got {}", label, day));
            }
        }
        Ok(())
    }

    /// Closing date within the given month
    pub fn closing_date(&self, year: i32, month: u32) -> Option<NaiveDate> {
        day_in_month(year, month, self.closing_day)
    }

    /// Billing period of the invoice closing in `year`/`month`:
    /// the day after the previous closing date through this month's closing date
    pub fn billing_period(&self, year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
        let end = self.closing_date(year, month)?;
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let previous = first.checked_sub_months(Months::new(1))?;
        let previous_close = self.closing_date(previous.year(), previous.month())?;
        Some((previous_close.succ_opt()?, end))
    }

    /// Due date of the invoice closing in `year`/`month`. When the due day is
    /// not after the closing day the invoice is due the following month
    pub fn due_date(&self, year: i32, month: u32) -> Option<NaiveDate> {
        if self.due_day > self.closing_day {
            day_in_month(year, month, self.due_day)
        } else {
            let next = NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_months(Months::new(1))?;
            day_in_month(next.year(), next.month(), self.due_day)
        }
    }
}

/// `day` of the month, clamped to the month's last day
fn day_in_month(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    NaiveDate::from_ymd_opt(year, month, day.min(last.day()))
}

/// Computed invoice for one billing period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub credit_card_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub due_date: NaiveDate,
    /// Expenses minus income (refunds) in the period
    pub total: Decimal,
    pub transactions: Vec<Transaction>,
}
