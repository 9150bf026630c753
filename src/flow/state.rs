use std::fmt;

/// Top-up flow steps
///
/// AmountEntry -> MethodSelection -> CardSelection -> Submitted. A UPI
/// top-up is submitted straight from MethodSelection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopUpStep {
    #[default]
    AmountEntry,
    MethodSelection,
    CardSelection,
    /// Network call in flight, every control is locked
    Submitted,
}

impl TopUpStep {
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, TopUpStep::Submitted)
    }

    /// Step the back control leads to
    pub fn previous(&self) -> Option<TopUpStep> {
        match self {
            TopUpStep::AmountEntry | TopUpStep::Submitted => None,
            TopUpStep::MethodSelection => Some(TopUpStep::AmountEntry),
            TopUpStep::CardSelection => Some(TopUpStep::MethodSelection),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopUpStep::AmountEntry => "AMOUNT_ENTRY",
            TopUpStep::MethodSelection => "METHOD_SELECTION",
            TopUpStep::CardSelection => "CARD_SELECTION",
            TopUpStep::Submitted => "SUBMITTED",
        }
    }
}

impl fmt::Display for TopUpStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_navigation() {
        assert_eq!(TopUpStep::CardSelection.previous(), Some(TopUpStep::MethodSelection));
        assert_eq!(TopUpStep::MethodSelection.previous(), Some(TopUpStep::AmountEntry));
        assert_eq!(TopUpStep::AmountEntry.previous(), None);
        assert_eq!(TopUpStep::Submitted.previous(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(TopUpStep::default().to_string(), "AMOUNT_ENTRY");
        assert_eq!(TopUpStep::Submitted.to_string(), "SUBMITTED");
        assert!(TopUpStep::Submitted.is_pending());
    }
}
