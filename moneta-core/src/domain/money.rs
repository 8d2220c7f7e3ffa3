//! Decimal money helpers shared by the domain types

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits the ledger store keeps for every money column
pub const MAX_SCALE: u32 = 4;

/// True when the value can be stored without losing fractional digits
pub fn fits_scale(value: Decimal) -> bool {
    value.normalize().scale() <= MAX_SCALE
}

/// Round to cents, half away from zero
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to the ledger store's scale, half away from zero
pub fn to_store_scale(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MAX_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Fixed two-decimal rendering used by signatures and fingerprints
pub fn fixed2(value: Decimal) -> String {
    format!("{:.2}", round_cents(value))
}
