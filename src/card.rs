//! Payment card input handling
//!
//! - `CardType` detection from the leading digits (cosmetic only)
//! - `NewCardForm`: keystroke filters for the "new card" form
//! - `CardDetails`: the validated wire shape sent as `card_data`

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Longest PAN the form accepts
pub const MAX_CARD_DIGITS: usize = 19;

// ============================================================================
// Card Type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    #[serde(rename = "VISA")]
    Visa,
    #[serde(rename = "MC")]
    MasterCard,
    #[serde(rename = "AMEX")]
    Amex,
    #[serde(rename = "DISC")]
    Discover,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "VISA",
            CardType::MasterCard => "MC",
            CardType::Amex => "AMEX",
            CardType::Discover => "DISC",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a card number by prefix. Whitespace is ignored.
///
/// 4 → VISA; 51–55 or 22–27 → MC; 34/37 → AMEX; 6011 or 65 → DISC.
pub fn detect_card_type(number: &str) -> Option<CardType> {
    let digits = strip_whitespace(number);
    let two: Option<u8> = digits.get(..2).and_then(|p| p.parse().ok());

    if digits.starts_with('4') {
        return Some(CardType::Visa);
    }
    match two {
        Some(51..=55) | Some(22..=27) => Some(CardType::MasterCard),
        Some(34) | Some(37) => Some(CardType::Amex),
        Some(65) => Some(CardType::Discover),
        _ if digits.starts_with("6011") => Some(CardType::Discover),
        _ => None,
    }
}

/// Group digits in blocks of four: "4111111111111111" → "4111 1111 1111 1111"
pub fn format_card_number(number: &str) -> String {
    let digits = strip_whitespace(number);
    let chars: Vec<char> = digits.chars().collect();
    chars
        .chunks(4)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn all_digits(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// Validated card details (wire shape)
// ============================================================================

/// Full card details as sent to `POST /api/cards` or as `card_data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CardDetails {
    #[validate(length(min = 13, max = 19, message = "card number must be 13-19 digits"))]
    pub card_number: String,

    pub expiry_month: String,

    pub expiry_year: String,

    #[validate(length(min = 3, max = 4, message = "cvv must be 3-4 digits"))]
    pub cvv: String,

    #[validate(length(min = 2, message = "holder name needs at least 2 characters"))]
    pub holder_name: String,
}

impl CardDetails {
    /// Length rules from the derive plus digit and expiry-range rules
    pub fn check(&self) -> Result<(), CardError> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if !all_digits(&self.card_number) {
            errors.add("card_number", ValidationError::new("digits_only"));
        }
        if !all_digits(&self.cvv) {
            errors.add("cvv", ValidationError::new("digits_only"));
        }
        if !in_two_digit_range(&self.expiry_month, 1, 12) {
            errors.add("expiry_month", ValidationError::new("expiry_month_range"));
        }
        if !in_two_digit_range(&self.expiry_year, 0, 99) {
            errors.add("expiry_year", ValidationError::new("expiry_year_range"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}

fn in_two_digit_range(value: &str, min: u8, max: u8) -> bool {
    !value.is_empty()
        && value.len() <= 2
        && all_digits(value)
        && value.parse::<u8>().is_ok_and(|v| (min..=max).contains(&v))
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CardError {
    #[error("Invalid card details: {}", fields.join(", "))]
    Invalid { fields: Vec<String> },

    #[error("Card details are incomplete")]
    Incomplete,
}

impl From<validator::ValidationErrors> for CardError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        CardError::Invalid { fields }
    }
}

// ============================================================================
// New card form
// ============================================================================

/// Editable "new card" form.
///
/// Every setter is a keystroke filter: a non-conforming value is refused
/// (returns `false`) and the field keeps its previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCardForm {
    card_number: String,
    expiry_month: String,
    expiry_year: String,
    cvv: String,
    holder_name: String,
}

impl NewCardForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digits only (spaces ignored), at most 19. Stored grouped by four.
    pub fn set_card_number(&mut self, value: &str) -> bool {
        let digits = strip_whitespace(value);
        if digits.len() > MAX_CARD_DIGITS || !all_digits(&digits) {
            return false;
        }
        self.card_number = format_card_number(&digits);
        true
    }

    /// "" or 1–12, at most two digits. A lone non-zero digit is zero-padded.
    pub fn set_expiry_month(&mut self, value: &str) -> bool {
        if !all_digits(value) || value.len() > 2 {
            return false;
        }
        if value.is_empty() {
            self.expiry_month.clear();
            return true;
        }
        match value.parse::<u8>() {
            Ok(1..=12) => {
                self.expiry_month = if value.len() == 1 {
                    format!("0{}", value)
                } else {
                    value.to_string()
                };
                true
            }
            _ => false,
        }
    }

    pub fn set_expiry_year(&mut self, value: &str) -> bool {
        if !all_digits(value) || value.len() > 2 {
            return false;
        }
        self.expiry_year = value.to_string();
        true
    }

    pub fn set_cvv(&mut self, value: &str) -> bool {
        if !all_digits(value) || value.len() > 4 {
            return false;
        }
        self.cvv = value.to_string();
        true
    }

    pub fn set_holder_name(&mut self, value: &str) {
        self.holder_name = value.to_string();
    }

    /// Card number as displayed (grouped)
    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    pub fn expiry_month(&self) -> &str {
        &self.expiry_month
    }

    pub fn expiry_year(&self) -> &str {
        &self.expiry_year
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn detected_type(&self) -> Option<CardType> {
        detect_card_type(&self.card_number)
    }

    /// True once the user has typed anything into the form
    pub fn is_touched(&self) -> bool {
        !(self.card_number.is_empty()
            && self.expiry_month.is_empty()
            && self.expiry_year.is_empty()
            && self.cvv.is_empty()
            && self.holder_name.trim().is_empty())
    }

    /// Normalize to the wire shape: digits only, zero-padded expiry,
    /// trimmed holder name.
    pub fn to_details(&self) -> CardDetails {
        CardDetails {
            card_number: strip_whitespace(&self.card_number),
            expiry_month: pad2(&self.expiry_month),
            expiry_year: pad2(&self.expiry_year),
            cvv: self.cvv.clone(),
            holder_name: self.holder_name.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<CardDetails, CardError> {
        if self.expiry_month.is_empty() || self.expiry_year.is_empty() {
            return Err(CardError::Incomplete);
        }
        let details = self.to_details();
        details.check()?;
        Ok(details)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn pad2(value: &str) -> String {
    if value.len() == 1 {
        format!("0{}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(number: &str, month: &str, year: &str, cvv: &str, holder: &str) -> NewCardForm {
        let mut form = NewCardForm::new();
        assert!(form.set_card_number(number));
        assert!(form.set_expiry_month(month));
        assert!(form.set_expiry_year(year));
        assert!(form.set_cvv(cvv));
        form.set_holder_name(holder);
        form
    }

    #[test]
    fn test_detect_card_type() {
        assert_eq!(detect_card_type("4111 1111"), Some(CardType::Visa));
        assert_eq!(detect_card_type("5105"), Some(CardType::MasterCard));
        assert_eq!(detect_card_type("2221"), Some(CardType::MasterCard));
        assert_eq!(detect_card_type("2720"), Some(CardType::MasterCard));
        assert_eq!(detect_card_type("3400"), Some(CardType::Amex));
        assert_eq!(detect_card_type("3782"), Some(CardType::Amex));
        assert_eq!(detect_card_type("6011 0000"), Some(CardType::Discover));
        assert_eq!(detect_card_type("6500"), Some(CardType::Discover));

        assert_eq!(detect_card_type("5600"), None);
        assert_eq!(detect_card_type("2800"), None);
        assert_eq!(detect_card_type("6012"), None);
        assert_eq!(detect_card_type(""), None);
    }

    #[test]
    fn test_valid_card() {
        let form = filled("4111111111111111", "12", "25", "123", "A B");
        let details = form.validate().unwrap();
        assert_eq!(details.card_number, "4111111111111111");
        assert_eq!(details.expiry_month, "12");
        assert_eq!(details.expiry_year, "25");
        assert_eq!(details.holder_name, "A B");
        assert_eq!(form.detected_type(), Some(CardType::Visa));
        assert_eq!(form.card_number(), "4111 1111 1111 1111");
    }

    #[test]
    fn test_short_pan_is_invalid() {
        let form = filled("123", "12", "25", "123", "A B");
        match form.validate() {
            Err(CardError::Invalid { fields }) => assert_eq!(fields, vec!["card_number"]),
            other => panic!("expected invalid card number, got {:?}", other),
        }
    }

    #[test]
    fn test_month_thirteen_is_invalid() {
        // The form refuses "13" as a keystroke ...
        let mut form = filled("4111111111111111", "12", "25", "123", "A B");
        assert!(!form.set_expiry_month("13"));
        assert_eq!(form.expiry_month(), "12");

        // ... and the wire shape rejects it too
        let mut details = form.to_details();
        details.expiry_month = "13".into();
        assert!(details.check().is_err());
    }

    #[test]
    fn test_holder_name_is_trimmed() {
        let form = filled("4111111111111111", "1", "5", "1234", "  J  ");
        assert!(!form.is_valid());

        let form = filled("4111111111111111", "1", "5", "1234", "  Jo  ");
        let details = form.validate().unwrap();
        assert_eq!(details.holder_name, "Jo");
        assert_eq!(details.expiry_month, "01");
        assert_eq!(details.expiry_year, "05");
    }

    #[test]
    fn test_card_number_filter() {
        let mut form = NewCardForm::new();
        assert!(form.set_card_number("4111 1111 1111 1111 111"));
        assert!(!form.set_card_number("41111111111111111111")); // 20 digits
        assert!(!form.set_card_number("4111-1111"));
        assert_eq!(form.card_number(), "4111 1111 1111 1111 111");
    }

    #[test]
    fn test_cvv_and_year_filters() {
        let mut form = NewCardForm::new();
        assert!(form.set_cvv("12"));
        assert!(!form.set_cvv("12345"));
        assert!(!form.set_cvv("12a"));
        assert!(form.set_expiry_year("99"));
        assert!(!form.set_expiry_year("100"));
        assert!(form.set_expiry_month(""));
        assert!(!form.set_expiry_month("0"));
        assert!(form.set_expiry_month("7"));
        assert_eq!(form.expiry_month(), "07");
    }

    #[test]
    fn test_incomplete_form() {
        let mut form = NewCardForm::new();
        assert!(!form.is_touched());
        form.set_card_number("4111111111111111");
        assert!(form.is_touched());
        assert_eq!(form.validate(), Err(CardError::Incomplete));
    }
}
