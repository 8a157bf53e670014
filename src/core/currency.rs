use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies with their decimal precision rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR(3)", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// Pound Sterling
    GBP,
    /// Egyptian Pound
    EGP,
    /// Saudi Riyal
    SAR,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::EGP,
        Currency::SAR,
    ];

    /// Returns the decimal scale for this currency.
    ///
    /// Every currency sold on the platform is priced in hundredths.
    pub fn scale(&self) -> u32 {
        2
    }

    /// Rounds a decimal value to the appropriate scale for this currency
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.scale())
    }

    /// Validates that a decimal value has the correct scale for this currency
    pub fn validate_amount(&self, amount: Decimal) -> Result<(), String> {
        let scale = amount.normalize().scale();
        let expected_scale = self.scale();

        if scale > expected_scale {
            return Err(format!(
                "{} amounts must have at most {} decimal places, got {}",
                self, expected_scale, scale
            ));
        }

        if amount < Decimal::ZERO {
            return Err(format!("{} amount cannot be negative", self));
        }

        Ok(())
    }

    /// Returns the smallest unit for this currency
    pub fn smallest_unit(&self) -> Decimal {
        Decimal::new(1, self.scale())
    }

    /// Converts an amount to the provider's integer minor units (cents, piasters)
    pub fn to_minor_units(&self, amount: Decimal) -> i64 {
        use rust_decimal::prelude::ToPrimitive;

        (self.round(amount) * Decimal::from(100))
            .trunc()
            .to_i64()
            .unwrap_or_default()
    }

    /// Converts provider minor units back into a decimal amount
    pub fn from_minor_units(&self, minor: i64) -> Decimal {
        Decimal::new(minor, self.scale())
    }

    /// Currency symbol used for display, if the currency has a short one
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Currency::USD => Some("$"),
            Currency::EUR => Some("€"),
            Currency::GBP => Some("£"),
            Currency::EGP | Currency::SAR => None,
        }
    }

    /// Formats an amount for display with the correct decimal places
    pub fn format_amount(&self, amount: Decimal) -> String {
        let width = self.scale() as usize;
        let rounded = self.round(amount);
        match self.symbol() {
            Some(symbol) => format!("{}{:.width$}", symbol, rounded, width = width),
            None => format!("{:.width$} {}", rounded, self, width = width),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::USD => write!(f, "USD"),
            Currency::EUR => write!(f, "EUR"),
            Currency::GBP => write!(f, "GBP"),
            Currency::EGP => write!(f, "EGP"),
            Currency::SAR => write!(f, "SAR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "EGP" => Ok(Currency::EGP),
            "SAR" => Ok(Currency::SAR),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&str> for Currency {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}
