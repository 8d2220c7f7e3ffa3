//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money;
use super::owner::OwnerId;

/// Kind of account. Credit-card accounts are created alongside a `CreditCard`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Wallet,
    Bank,
    CreditCard,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Wallet => "wallet",
            AccountKind::Bank => "bank",
            AccountKind::CreditCard => "credit_card",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "wallet" => Ok(AccountKind::Wallet),
            "bank" => Ok(AccountKind::Bank),
            "credit_card" | "card" => Ok(AccountKind::CreditCard),
            other => Err(format!("unknown account kind '{}'", other)),
        }
    }
}

/// A financial account owned by one user
///
/// `balance` is the running balance: the opening balance plus the effect of
/// every transaction currently persisted against the account. It is only
/// mutated through the ledger service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    /// Anchor the ledger doctor checks `balance` against
    pub opening_balance: Decimal,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with required fields
    pub fn new(
        id: Uuid,
        owner_id: OwnerId,
        name: impl Into<String>,
        kind: AccountKind,
        opening_balance: Decimal,
        currency: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            name: name.into().trim().to_string(),
            kind,
            balance: opening_balance,
            opening_balance,
            currency: Self::normalize_currency(currency),
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.currency.trim().is_empty() {
            return Err("currency cannot be empty");
        }
        if !money::fits_scale(self.balance) || !money::fits_scale(self.opening_balance) {
            return Err("balance supports at most 4 decimal places");
        }
        Ok(())
    }
}
