//! Money Conversion Module
//!
//! Conversion between what the user types (a decimal in their display
//! currency) and what crosses the wire (a `u64` count of USD cents).
//! Every amount that leaves the client MUST go through
//! [`to_canonical_minor_units`].
//!
//! ## Internal Representation
//! - Wire amounts are `u64` minor units of [`Currency::CANONICAL`]
//! - User amounts are `rust_decimal::Decimal` in the display currency
//! - Conversion rounds half away from zero to a whole minor unit
//!
//! ## Usage
//! ```rust
//! use pocketpay::currency::Currency;
//! use pocketpay::money::{to_canonical_minor_units, from_canonical_minor_units};
//! use rust_decimal::Decimal;
//!
//! // User types ₹855.90 → 1000 USD cents
//! let cents = to_canonical_minor_units(Decimal::new(85590, 2), Currency::INR).unwrap();
//! assert_eq!(cents, 1000);
//!
//! let shown = from_canonical_minor_units(1000, Currency::INR);
//! assert_eq!(shown.to_string(), "₹855.90");
//! ```

use crate::currency::Currency;
use rust_decimal::prelude::*;
use std::fmt;
use thiserror::Error;

/// Decimal places of the canonical minor unit (cents)
pub const MINOR_UNIT_DECIMALS: u32 = 2;

/// Decimal places used when showing an amount to the user
pub const DISPLAY_DECIMALS: u32 = 2;

/// Preset amounts offered next to the amount field
pub const QUICK_AMOUNTS: [u32; 6] = [10, 25, 50, 100, 200, 500];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MoneyError {
    #[error("Amount must be greater than zero")]
    NotPositive,

    #[error("Amount cannot be negative")]
    Negative,

    #[error("Amount too large, would overflow")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Amount Normalizer: free text → Decimal
// ============================================================================

/// Whether `text` is an acceptable state for the amount field.
///
/// Matches `^\d*\.?\d*$`: digits, at most one dot, digits. The empty string
/// is accepted and means "no amount yet".
pub fn is_amount_text(text: &str) -> bool {
    let mut seen_dot = false;
    for c in text.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    true
}

/// Parse amount-field text into a non-negative decimal.
///
/// Returns `Ok(None)` while there is no number yet ("" or ".").
/// A bare leading or trailing dot is tolerated (".5" → 0.5, "5." → 5)
/// because the field accepts those as intermediate keystrokes.
pub fn parse_amount_text(text: &str) -> Result<Option<Decimal>, MoneyError> {
    if !is_amount_text(text) {
        return Err(MoneyError::InvalidFormat(text.to_string()));
    }

    let trimmed = text.strip_suffix('.').unwrap_or(text);
    if trimmed.is_empty() {
        return Ok(None);
    }

    let normalized = if trimmed.starts_with('.') {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };

    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|_| MoneyError::Overflow)
}

/// Amount input field state.
///
/// Edits that do not match the unsigned decimal pattern are refused: the
/// stored text is left untouched and `apply_edit` returns `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmountInput {
    raw: String,
}

impl AmountInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a candidate field value. Returns whether it was accepted.
    pub fn apply_edit(&mut self, candidate: &str) -> bool {
        if is_amount_text(candidate) {
            self.raw.clear();
            self.raw.push_str(candidate);
            true
        } else {
            false
        }
    }

    /// Fill the field with one of the [`QUICK_AMOUNTS`]
    pub fn set_quick_amount(&mut self, amount: u32) {
        self.raw = amount.to_string();
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed value, `None` while empty or unparsable
    pub fn value(&self) -> Option<Decimal> {
        parse_amount_text(&self.raw).ok().flatten()
    }

    /// Submission gate: parsed value > 0
    pub fn is_positive(&self) -> bool {
        self.value().is_some_and(|v| v > Decimal::ZERO)
    }

    /// Parsed value, required to be > 0
    pub fn positive_value(&self) -> Result<Decimal, MoneyError> {
        match self.value() {
            Some(v) if v > Decimal::ZERO => Ok(v),
            _ => Err(MoneyError::NotPositive),
        }
    }
}

// ============================================================================
// Convert: user currency → canonical minor units (wire)
// ============================================================================

/// Convert a user-currency amount to USD cents.
///
/// `amount / rate * 100`, rounded half away from zero.
pub fn to_canonical_minor_units(amount: Decimal, currency: Currency) -> Result<u64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative);
    }

    let canonical = amount
        .checked_div(currency.rate())
        .ok_or(MoneyError::Overflow)?;
    let minor = canonical
        .checked_mul(Decimal::from(10u64.pow(MINOR_UNIT_DECIMALS)))
        .ok_or(MoneyError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    minor.to_u64().ok_or(MoneyError::Overflow)
}

/// Submission amount: like [`to_canonical_minor_units`], but an amount that
/// rounds to zero cents is rejected.
pub fn to_submission_minor_units(amount: Decimal, currency: Currency) -> Result<u64, MoneyError> {
    match to_canonical_minor_units(amount, currency)? {
        0 => Err(MoneyError::NotPositive),
        minor => Ok(minor),
    }
}

// ============================================================================
// Convert: canonical minor units → user currency (display only)
// ============================================================================

/// An amount converted for display. Never re-enters a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAmount {
    pub amount: Decimal,
    pub currency: Currency,
}

impl DisplayAmount {
    pub fn symbol(&self) -> &'static str {
        self.currency.symbol()
    }

    /// Amount rounded to [`DISPLAY_DECIMALS`], without symbol
    pub fn formatted(&self) -> String {
        format_decimal(self.amount, DISPLAY_DECIMALS)
    }
}

impl fmt::Display for DisplayAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.symbol(), self.formatted())
    }
}

/// Convert USD cents into the display currency: `minor / 100 * rate`
pub fn from_canonical_minor_units(minor_units: u64, currency: Currency) -> DisplayAmount {
    let canonical = Decimal::from(minor_units) / Decimal::from(10u64.pow(MINOR_UNIT_DECIMALS));
    DisplayAmount {
        amount: canonical * currency.rate(),
        currency,
    }
}

// ============================================================================
// Format
// ============================================================================

/// Round half away from zero and render with exactly `decimals` places
pub fn format_decimal(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.prec$}", rounded, prec = decimals as usize)
}

/// "{symbol}{amount:.2}" for a user-currency amount
pub fn format_user_amount(amount: Decimal, currency: Currency) -> String {
    format!(
        "{}{}",
        currency.symbol(),
        format_decimal(amount, DISPLAY_DECIMALS)
    )
}
