//! Commission policy: affiliate tier to payout rate.
//!
//! Pure and total; the only arithmetic the ledger does outside of balance
//! credits and debits.

use rust_decimal::{Decimal, RoundingStrategy, dec};

/// Affiliate tier, derived from historical activity by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl TryFrom<u8> for Tier {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::One),
            2 => Ok(Tier::Two),
            3 => Ok(Tier::Three),
            other => Err(other),
        }
    }
}

/// Commission rate for a tier: 50% / 60% / 70%.
pub fn rate_for(tier: Tier) -> Decimal {
    match tier {
        Tier::One => dec!(0.50),
        Tier::Two => dec!(0.60),
        Tier::Three => dec!(0.70),
    }
}

/// The affiliate's cut of a sale, rounded to currency minor units with
/// banker's rounding.
pub fn payout(price: Decimal, tier: Tier) -> Decimal {
    (price * rate_for(tier)).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
