//! Currency Table
//!
//! Static exchange rates (units of the currency per 1 USD) and display
//! symbols. USD is the canonical currency: every amount on the wire is a
//! USD minor-unit count, whatever the user typed in.
//!
//! Lookups by code never fail. An unknown code resolves to USD
//! (rate 1, symbol "$").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported display currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Currency {
    #[default]
    USD,
    INR,
    GBP,
}

impl Currency {
    /// All supported currencies, in the order they are offered to the user
    pub const ALL: [Currency; 3] = [Currency::USD, Currency::INR, Currency::GBP];

    /// The canonical (wire) currency
    pub const CANONICAL: Currency = Currency::USD;

    /// ISO-style code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::INR => "INR",
            Currency::GBP => "GBP",
        }
    }

    /// Units of this currency per 1 USD. Always > 0.
    pub fn rate(&self) -> Decimal {
        match self {
            Currency::USD => Decimal::ONE,
            Currency::INR => Decimal::new(8559, 2), // 85.59
            Currency::GBP => Decimal::new(74, 2),   // 0.74
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::INR => "₹",
            Currency::GBP => "£",
        }
    }

    /// Strict lookup (case-insensitive, surrounding whitespace ignored)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }

    /// Lenient lookup: unknown codes fall back to USD
    pub fn from_code_or_default(code: &str) -> Self {
        Self::from_code(code).unwrap_or_default()
    }
}

/// Exchange rate for a currency code (USD for unknown codes)
pub fn rate_of(code: &str) -> Decimal {
    Currency::from_code_or_default(code).rate()
}

/// Display symbol for a currency code ("$" for unknown codes)
pub fn symbol_of(code: &str) -> &'static str {
    Currency::from_code_or_default(code).symbol()
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Unsupported currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_code(s).ok_or_else(|| UnknownCurrency(s.to_string()))
    }
}

impl Serialize for Currency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Server-side preference may hold anything; never fail a profile on it
        let code = Option::<String>::deserialize(deserializer)?;
        Ok(code
            .as_deref()
            .map(Currency::from_code_or_default)
            .unwrap_or_default())
    }
}
