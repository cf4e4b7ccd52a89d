use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------        Money         ---------------------------------------------------------
/// An amount of money, expressed as an integer number of the currency's minor units (cents, centimes, or whole francs
/// for zero-decimal currencies). All ledger arithmetic happens on this type; floating point never touches money.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(Money => binary [Add::add, Sub::sub] assign [AddAssign::add_assign, SubAssign::sub_assign] unary [Neg::neg]);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MoneyConversionError(format!("{value} is too large to store as a money amount")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// The amount as a decimal number of minor units. Exact.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Parses a human-entered decimal amount (e.g. `"15.50"`) in major units into minor units, given the number of
    /// decimals the currency uses.
    ///
    /// Amounts that carry more precision than the currency's minor unit are rejected rather than rounded.
    pub fn from_major_units(amount: &str, decimals: u32) -> Result<Self, MoneyConversionError> {
        let trimmed = amount.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|e| MoneyConversionError(format!("'{amount}' is not a number. {e}")))?;
        let scale = 10i64
            .checked_pow(decimals)
            .ok_or_else(|| MoneyConversionError(format!("{decimals} decimals is not supported")))?;
        let minor = value
            .checked_mul(Decimal::from(scale))
            .ok_or_else(|| MoneyConversionError(format!("'{amount}' is too large")))?;
        if !minor.fract().is_zero() {
            return Err(MoneyConversionError(format!(
                "'{amount}' has more precision than the currency's {decimals} decimal places"
            )));
        }
        minor.to_i64().map(Self).ok_or_else(|| MoneyConversionError(format!("'{amount}' is too large")))
    }

    /// The mean of `count` amounts summing to `total`, rounded half-up to a whole minor unit. Returns zero when
    /// `count` is not positive.
    pub fn average_half_up(total: Money, count: i64) -> Money {
        if count <= 0 {
            return Money::ZERO;
        }
        let total = i128::from(total.0);
        let count = i128::from(count);
        let twice = 2 * total;
        let avg = if twice >= 0 { (twice + count) / (2 * count) } else { -((-twice + count - 1) / (2 * count)) };
        // An average can never exceed the largest input, so this cannot overflow an i64
        Money(avg as i64)
    }
}
