//! Commission policy
//!
//! The platform keeps `round_half_up(total * rate)` minor units of every payment and the payee receives the rest. The
//! split is computed once, when the payment intent is created, and the rate is stored on the intent so that later
//! changes to the platform rate never touch existing payments.
use std::{fmt::Display, str::FromStr};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use settle_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommissionError {
    #[error("The amount must be positive, but was {0}")]
    InvalidAmount(Money),
    #[error("Commission rate must be in the range [0, 1), but was {0}")]
    RateOutOfRange(Decimal),
    #[error("'{0}' is not a valid commission rate")]
    InvalidRate(String),
    #[error("The commission on {0} cannot be represented")]
    Overflow(Money),
}

//--------------------------------------   CommissionRate    ---------------------------------------------------------
/// A commission rate, expressed as a fraction of the total. Always in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub fn new(rate: Decimal) -> Result<Self, CommissionError> {
        if rate.is_sign_negative() || rate >= Decimal::ONE {
            return Err(CommissionError::RateOutOfRange(rate));
        }
        Ok(Self(rate.normalize()))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = CommissionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

impl FromStr for CommissionRate {
    type Err = CommissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rate = Decimal::from_str(s.trim()).map_err(|_| CommissionError::InvalidRate(s.to_string()))?;
        Self::new(rate)
    }
}

// Used when reading the stored rate back out of the ledger
impl TryFrom<String> for CommissionRate {
    type Error = CommissionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Split         ---------------------------------------------------------
/// The result of applying a commission rate to a payment total. `payee_amount + commission == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub total: Money,
    pub payee_amount: Money,
    pub commission: Money,
    pub rate: CommissionRate,
}

/// Splits `total` into the payee share and the platform commission.
///
/// The commission is `total * rate` rounded half-up to a whole minor unit, and the payee gets whatever is left, so the
/// two parts always add back up to the total.
pub fn compute_split(total: Money, rate: CommissionRate) -> Result<Split, CommissionError> {
    if !total.is_positive() {
        return Err(CommissionError::InvalidAmount(total));
    }
    let commission = total
        .as_decimal()
        .checked_mul(rate.as_decimal())
        .ok_or(CommissionError::Overflow(total))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .map(Money::from)
        .ok_or(CommissionError::Overflow(total))?;
    let payee_amount = total.checked_sub(commission).ok_or(CommissionError::Overflow(total))?;
    Ok(Split { total, payee_amount, commission, rate })
}
