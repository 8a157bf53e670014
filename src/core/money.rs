//! Money value object.
//!
//! An amount is always non-negative and held at two decimal places, including
//! values deserialized from JSON, which go through [`Money::new`]. Arithmetic
//! is only defined between values of the same currency. The operator forms
//! panic on a currency mismatch and `-` also panics when the result would be
//! negative; the `try_*` forms report both for code paths fed by external
//! input.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use super::currency::Currency;

/// Errors raised while constructing or combining money values
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount cannot be negative")]
    Negative,

    #[error("Currency mismatch: {left} and {right}")]
    CurrencyMismatch { left: Currency, right: Currency },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MoneyParts")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

/// Unvalidated wire form of [`Money`]
#[derive(Deserialize)]
struct MoneyParts {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<MoneyParts> for Money {
    type Error = MoneyError;

    fn try_from(parts: MoneyParts) -> Result<Self, Self::Error> {
        Money::new(parts.amount, parts.currency)
    }
}

impl Money {
    /// Create a money value, rounding to two decimal places
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount < Decimal::ZERO {
            return Err(MoneyError::Negative);
        }

        let mut amount = currency.round(amount);
        amount.rescale(currency.scale());

        Ok(Self { amount, currency })
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    pub fn try_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount + other.amount, self.currency)
    }

    /// Subtract, failing if the result would drop below zero
    pub fn try_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Money::new(self.amount - other.amount, self.currency)
    }

    /// `percentage` of this value, e.g. `percentage(20)` of 30.00 is 6.00
    pub fn percentage(&self, percentage: Decimal) -> Result<Money, MoneyError> {
        Money::new(self.amount * percentage / Decimal::ONE_HUNDRED, self.currency)
    }

    pub fn multiply(&self, factor: Decimal) -> Result<Money, MoneyError> {
        Money::new(self.amount * factor, self.currency)
    }

    pub fn try_cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Human readable form with the currency symbol, e.g. `$13.99`
    pub fn display_amount(&self) -> String {
        self.currency.format_amount(self.amount)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        match self.try_add(&rhs) {
            Ok(sum) => sum,
            Err(e) => panic!("invalid money addition: {}", e),
        }
    }
}

/// Panics on a currency mismatch or a negative result. Use
/// [`Money::try_sub`] when either is possible.
impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        match self.try_sub(&rhs) {
            Ok(diff) => diff,
            Err(e) => panic!("invalid money subtraction: {}", e),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}
