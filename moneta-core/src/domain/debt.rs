//! Debt domain model and installment recalculation rule

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money;
use super::owner::OwnerId;

/// A debt tracked for payoff planning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debt {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub name: String,
    /// Current outstanding balance
    pub total_amount: Decimal,
    /// Anchor for installment-based recalculation. Absent on legacy debts
    pub original_amount: Option<Decimal>,
    /// Monthly interest rate, in percent
    pub interest_rate: Decimal,
    pub minimum_payment: Decimal,
    pub installments_total: Option<u32>,
    pub installments_paid: Option<u32>,
    /// No interest or payment is simulated before this date
    pub first_installment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debt {
    /// Recompute `total_amount` after `installments_paid` changed to `new_paid`.
    ///
    /// With a known original amount and a positive installment count the
    /// balance is strictly linear and floored at zero, computed exactly. Legacy debts fall back
    /// to a differential update using the minimum payment per installment,
    /// which is not floored.
    pub fn recalculate_for_installments(&self, new_paid: u32) -> Decimal {
        match (self.original_amount, self.installments_total) {
            (Some(original), Some(total)) if total > 0 => {
                let per_installment = original / Decimal::from(total);
                let remaining = original - per_installment * Decimal::from(new_paid);
                remaining.max(Decimal::ZERO)
            }
            _ => {
                let old_paid = self.installments_paid.unwrap_or(0);
                let delta = i64::from(new_paid) - i64::from(old_paid);
                self.total_amount - Decimal::from(delta) * self.minimum_payment
            }
        }
    }

    /// Whether the debt takes part in the simulated month starting on `date`
    pub fn has_started(&self, date: NaiveDate) -> bool {
        match self.first_installment_date {
            Some(first) => date >= first,
            None => true,
        }
    }
}

/// Input for creating a debt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtDraft {
    pub name: String,
    pub total_amount: Decimal,
    #[serde(default)]
    pub original_amount: Option<Decimal>,
    pub interest_rate: Decimal,
    pub minimum_payment: Decimal,
    #[serde(default)]
    pub installments_total: Option<u32>,
    #[serde(default)]
    pub installments_paid: Option<u32>,
    #[serde(default)]
    pub first_installment_date: Option<NaiveDate>,
}

impl DebtDraft {
    pub fn new(
        name: impl Into<String>,
        total_amount: Decimal,
        interest_rate: Decimal,
        minimum_payment: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            total_amount,
            original_amount: None,
            interest_rate,
            minimum_payment,
            installments_total: None,
            installments_paid: None,
            first_installment_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("debt name cannot be empty".to_string());
        }
        validate_debt_numbers(
            Some(self.total_amount),
            self.original_amount,
            Some(self.interest_rate),
            Some(self.minimum_payment),
        )
    }
}

/// Partial update of a debt; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebtPatch {
    pub name: Option<String>,
    pub total_amount: Option<Decimal>,
    pub original_amount: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub installments_total: Option<u32>,
    pub installments_paid: Option<u32>,
    pub first_installment_date: Option<NaiveDate>,
}

impl DebtPatch {
    /// Apply the patch onto a copy of `current`, running the installment
    /// rule when `installments_paid` changes
    pub fn apply_to(&self, current: &Debt, now: DateTime<Utc>) -> Result<Debt, String> {
        validate_debt_numbers(
            self.total_amount,
            self.original_amount,
            self.interest_rate,
            self.minimum_payment,
        )?;
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = name.trim().to_string();
        }
        if let Some(total) = self.total_amount {
            next.total_amount = total;
        }
        if let Some(original) = self.original_amount {
            next.original_amount = Some(original);
        }
        if let Some(rate) = self.interest_rate {
            next.interest_rate = rate;
        }
        if let Some(minimum) = self.minimum_payment {
            next.minimum_payment = minimum;
        }
        if let Some(total) = self.installments_total {
            next.installments_total = Some(total);
        }
        if let Some(first) = self.first_installment_date {
            next.first_installment_date = Some(first);
        }
        if let Some(paid) = self.installments_paid {
            if current.installments_paid != Some(paid) {
                // Rule runs against the other patched fields but the old paid count
                next.total_amount = money::to_store_scale(next.recalculate_for_installments(paid));
            }
            next.installments_paid = Some(paid);
        }

        if next.name.is_empty() {
            return Err("debt name cannot be empty".to_string());
        }
        next.updated_at = now;
        Ok(next)
    }
}

/// Checks the supplied money fields. Computed balances are not checked here:
/// expense payments and the legacy installment rule may drive them negative
fn validate_debt_numbers(
    total: Option<Decimal>,
    original: Option<Decimal>,
    rate: Option<Decimal>,
    minimum: Option<Decimal>,
) -> Result<(), String> {
    let fields = [
        ("total amount", total),
        ("original amount", original),
        ("interest rate", rate),
        ("minimum payment", minimum),
    ];
    for (label, value) in fields {
        let Some(value) = value else { continue };
        if value < Decimal::ZERO {
            return Err(format!("{} cannot be negative", label));
        }
        if !money::fits_scale(value) {
            return Err(format!(
                "{} {} has more than {} decimal places",
                label,
                value,
                money::MAX_SCALE
            ));
        }
    }
    Ok(())
}

/// Ordering policy for extra-payment allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentStrategy {
    /// Smallest balance first
    Snowball,
    /// Highest interest rate first
    Avalanche,
}

impl RepaymentStrategy {
    pub const ALL: [RepaymentStrategy; 2] = [RepaymentStrategy::Snowball, RepaymentStrategy::Avalanche];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentStrategy::Snowball => "SNOWBALL",
            RepaymentStrategy::Avalanche => "AVALANCHE",
        }
    }
}

impl fmt::Display for RepaymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SNOWBALL" => Ok(RepaymentStrategy::Snowball),
            "AVALANCHE" => Ok(RepaymentStrategy::Avalanche),
            other => Err(format!("unknown repayment strategy '{}'", other)),
        }
    }
}
