//! Fee calculation utilities
//!
//! All fee rates use 10^6 precision: 14_000 = 1.40%
//!
//! Fees are quoted on the user-currency amount, before conversion to
//! minor units. Only card-funded top-ups are charged.

use rust_decimal::Decimal;

use crate::currency::Currency;
use crate::models::TopUpMethod;
use crate::money::{DISPLAY_DECIMALS, format_decimal};

/// Fee rate precision (10^6 = 1,000,000)
pub const FEE_PRECISION: u64 = 1_000_000;

/// Card processing fee rate (14_000 = 1.40%)
pub const CARD_FEE_RATE: u64 = 14_000;

/// UPI top-ups are free
pub const UPI_FEE_RATE: u64 = 0;

/// Fee rate for a top-up funding method
#[inline]
pub fn fee_rate(method: TopUpMethod) -> u64 {
    match method {
        TopUpMethod::Card => CARD_FEE_RATE,
        TopUpMethod::Upi => UPI_FEE_RATE,
    }
}

/// Calculate fee from amount and rate.
///
/// Exact decimal arithmetic, no rounding. Rounding happens only for
/// display and when the final request is built.
///
/// # Example
/// ```
/// use pocketpay::fee::{calculate_fee, CARD_FEE_RATE};
/// use rust_decimal::Decimal;
/// // 100.00 * 1.40% = 1.40
/// let fee = calculate_fee(Decimal::new(10000, 2), CARD_FEE_RATE);
/// assert_eq!(fee, Decimal::new(140, 2));
/// ```
#[inline]
pub fn calculate_fee(amount: Decimal, rate: u64) -> Decimal {
    amount * Decimal::from(rate) / Decimal::from(FEE_PRECISION)
}

/// Amount, fee and total for a top-up, all in the user's currency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub amount: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
    pub currency: Currency,
}

impl FeeQuote {
    pub fn fee_display(&self) -> String {
        format!(
            "{}{}",
            self.currency.symbol(),
            format_decimal(self.fee, DISPLAY_DECIMALS)
        )
    }

    pub fn total_display(&self) -> String {
        format!(
            "{}{}",
            self.currency.symbol(),
            format_decimal(self.total, DISPLAY_DECIMALS)
        )
    }

    pub fn is_free(&self) -> bool {
        self.fee.is_zero()
    }
}

/// Quote a top-up of `amount` (user currency) funded by `method`
pub fn quote(amount: Decimal, currency: Currency, method: TopUpMethod) -> FeeQuote {
    let fee = calculate_fee(amount, fee_rate(method));
    FeeQuote {
        amount,
        fee,
        total: amount + fee,
        currency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_card_fee_on_hundred() {
        let q = quote(dec("100.00"), Currency::USD, TopUpMethod::Card);
        assert_eq!(q.fee, dec("1.40"));
        assert_eq!(q.total, dec("101.40"));
        assert_eq!(q.fee_display(), "$1.40");
        assert_eq!(q.total_display(), "$101.40");
    }

    #[test]
    fn test_fee_is_not_rounded_until_display() {
        // 12.34 * 1.4% = 0.17276
        let q = quote(dec("12.34"), Currency::INR, TopUpMethod::Card);
        assert_eq!(q.fee, dec("0.17276"));
        assert_eq!(q.fee_display(), "₹0.17");
        assert_eq!(q.total_display(), "₹12.51");
    }

    #[test]
    fn test_upi_is_free() {
        let q = quote(dec("250"), Currency::GBP, TopUpMethod::Upi);
        assert!(q.is_free());
        assert_eq!(q.total, dec("250"));
        assert_eq!(q.fee_display(), "£0.00");
    }

    #[test]
    fn test_calculate_fee_zero() {
        assert_eq!(calculate_fee(Decimal::ZERO, CARD_FEE_RATE), Decimal::ZERO);
        assert_eq!(calculate_fee(dec("100"), 0), Decimal::ZERO);
    }
}
