//! Add-money flow
//!
//! Drives a top-up from the typed amount to the submitted request. The
//! flow owns only local input state; the network call goes through
//! [`Wallet::execute_top_up`].
//!
//! Submission is split in two so a caller that cannot hold `&mut` across
//! the await can still use the flow: [`TopUpFlow::begin_submit`] locks the
//! flow and hands out the request, [`TopUpFlow::complete`] unlocks it with
//! the result. [`TopUpFlow::submit`] does both around the wallet call.

use rust_decimal::Decimal;
use tracing::debug;

use super::state::TopUpStep;
use crate::card::NewCardForm;
use crate::currency::Currency;
use crate::error::ClientError;
use crate::fee::{FeeQuote, quote};
use crate::models::{CardId, PaymentMethod, TopUpMethod, TopUpRequest};
use crate::money::{AmountInput, format_user_amount, to_submission_minor_units};
use crate::wallet::{TopUpOutcome, Wallet};

/// Card picked on the card-selection step. Stored and new are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardChoice {
    #[default]
    Unselected,
    Stored(CardId),
    New,
}

#[derive(Debug, Clone, Default)]
pub struct TopUpFlow {
    step: TopUpStep,
    currency: Currency,
    amount: AmountInput,
    method: TopUpMethod,
    card: CardChoice,
    new_card: NewCardForm,
    /// Step to fall back to if the pending submission fails
    resume_step: TopUpStep,
    last_error: Option<ClientError>,
}

impl TopUpFlow {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            ..Self::default()
        }
    }

    pub fn step(&self) -> TopUpStep {
        self.step
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn amount(&self) -> &AmountInput {
        &self.amount
    }

    pub fn method(&self) -> TopUpMethod {
        self.method
    }

    pub fn card_choice(&self) -> CardChoice {
        self.card
    }

    pub fn new_card(&self) -> &NewCardForm {
        &self.new_card
    }

    /// Error of the last failed submission, cleared by the next attempt
    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    fn goto(&mut self, next: TopUpStep) {
        debug!(from = %self.step, to = %next, "[top-up] step");
        self.step = next;
    }

    fn expect_step(&self, expected: TopUpStep) -> Result<(), ClientError> {
        if self.step == expected {
            Ok(())
        } else if self.step.is_pending() {
            Err(ClientError::SubmissionPending)
        } else {
            Err(ClientError::InvalidState(format!(
                "expected {}, flow is at {}",
                expected, self.step
            )))
        }
    }

    // === Amount entry ===

    /// Keystroke filter for the amount field. Refused edits return false.
    pub fn edit_amount(&mut self, text: &str) -> bool {
        self.step == TopUpStep::AmountEntry && self.amount.apply_edit(text)
    }

    pub fn quick_amount(&mut self, amount: u32) -> bool {
        if self.step != TopUpStep::AmountEntry {
            return false;
        }
        self.amount.set_quick_amount(amount);
        true
    }

    pub fn continue_to_methods(&mut self) -> Result<(), ClientError> {
        self.expect_step(TopUpStep::AmountEntry)?;
        self.amount.positive_value()?;
        self.goto(TopUpStep::MethodSelection);
        Ok(())
    }

    // === Method selection ===

    pub fn select_method(&mut self, method: TopUpMethod) -> Result<(), ClientError> {
        self.expect_step(TopUpStep::MethodSelection)?;
        self.method = method;
        Ok(())
    }

    /// Card method only; UPI is submitted from method selection
    pub fn continue_to_cards(&mut self) -> Result<(), ClientError> {
        self.expect_step(TopUpStep::MethodSelection)?;
        if self.method != TopUpMethod::Card {
            return Err(ClientError::InvalidState(
                "UPI top-ups are submitted without card selection".to_string(),
            ));
        }
        self.goto(TopUpStep::CardSelection);
        Ok(())
    }

    pub fn back(&mut self) -> bool {
        match self.step.previous() {
            Some(prev) => {
                self.goto(prev);
                true
            }
            None => false,
        }
    }

    // === Card selection ===

    pub fn select_stored_card(&mut self, card_id: CardId) -> Result<(), ClientError> {
        self.expect_step(TopUpStep::CardSelection)?;
        self.card = CardChoice::Stored(card_id);
        Ok(())
    }

    pub fn use_new_card(&mut self) -> Result<(), ClientError> {
        self.expect_step(TopUpStep::CardSelection)?;
        self.card = CardChoice::New;
        Ok(())
    }

    /// Editing the new-card form selects it
    pub fn new_card_mut(&mut self) -> Result<&mut NewCardForm, ClientError> {
        self.use_new_card()?;
        Ok(&mut self.new_card)
    }

    // === Derived values ===

    /// Fee preview in the user's currency; `None` until the amount parses
    pub fn fee_quote(&self) -> Option<FeeQuote> {
        self.amount
            .value()
            .map(|amount| quote(amount, self.currency, self.method))
    }

    /// The one payment method a submission would use, if it is complete
    pub fn payment_method(&self) -> Option<PaymentMethod> {
        match self.method {
            TopUpMethod::Upi => Some(PaymentMethod::Upi),
            TopUpMethod::Card => match self.card {
                CardChoice::Unselected => None,
                CardChoice::Stored(id) => Some(PaymentMethod::StoredCard(id)),
                CardChoice::New => self.new_card.validate().ok().map(PaymentMethod::NewCard),
            },
        }
    }

    /// Submit control state
    pub fn can_submit(&self) -> bool {
        let at_submit_step = match self.method {
            TopUpMethod::Upi => self.step == TopUpStep::MethodSelection,
            TopUpMethod::Card => self.step == TopUpStep::CardSelection,
        };
        at_submit_step && self.amount.is_positive() && self.payment_method().is_some()
    }

    /// Request for the current input, or the first reason it cannot be built
    pub fn build_request(&self) -> Result<TopUpRequest, ClientError> {
        let amount = self.amount.positive_value()?;
        let method = match (self.method, self.card) {
            (TopUpMethod::Upi, _) => PaymentMethod::Upi,
            (TopUpMethod::Card, CardChoice::Unselected) => return Err(ClientError::NoPaymentMethod),
            (TopUpMethod::Card, CardChoice::Stored(id)) => PaymentMethod::StoredCard(id),
            (TopUpMethod::Card, CardChoice::New) => PaymentMethod::NewCard(self.new_card.validate()?),
        };

        Ok(TopUpRequest {
            amount: to_submission_minor_units(amount, self.currency)?,
            description: describe(amount, self.currency, &method),
            method,
        })
    }

    // === Submission ===

    /// Lock the flow and produce the request. Fails without a state change
    /// if the input is incomplete or a submission is already pending.
    pub fn begin_submit(&mut self) -> Result<TopUpRequest, ClientError> {
        if self.step.is_pending() {
            return Err(ClientError::SubmissionPending);
        }
        let req = self.build_request()?;
        if !self.can_submit() {
            return Err(ClientError::InvalidState(format!(
                "{} top-up cannot be submitted from {}",
                self.method, self.step
            )));
        }
        self.resume_step = self.step;
        self.last_error = None;
        self.goto(TopUpStep::Submitted);
        Ok(req)
    }

    /// Unlock after the call resolved. Success resets the flow; failure
    /// returns to the step the submission came from, input kept.
    pub fn complete<T>(&mut self, result: &Result<T, ClientError>) {
        if !self.step.is_pending() {
            return;
        }
        match result {
            Ok(_) => self.reset(),
            Err(e) => {
                self.last_error = Some(e.clone());
                self.goto(self.resume_step);
            }
        }
    }

    pub async fn submit(&mut self, wallet: &Wallet) -> Result<TopUpOutcome, ClientError> {
        let req = self.begin_submit()?;
        let submission = InFlight(self);
        let result = wallet.execute_top_up(req).await;
        submission.0.complete(&result);
        result
    }

    /// Unlock without a result, input kept
    fn abandon(&mut self) {
        if self.step.is_pending() {
            debug!(resume = %self.resume_step, "[top-up] submission abandoned");
            self.goto(self.resume_step);
        }
    }

    /// Back to a blank amount entry, currency kept
    pub fn reset(&mut self) {
        *self = Self::new(self.currency);
    }
}

/// A submission whose future may be dropped before the call resolves
struct InFlight<'a>(&'a mut TopUpFlow);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// "Added {symbol}{amount} via {method}"
fn describe(amount: Decimal, currency: Currency, method: &PaymentMethod) -> String {
    format!(
        "Added {} via {}",
        format_user_amount(amount, currency),
        method.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_at_cards(amount: &str) -> TopUpFlow {
        let mut flow = TopUpFlow::new(Currency::USD);
        assert!(flow.edit_amount(amount));
        flow.continue_to_methods().unwrap();
        flow.select_method(TopUpMethod::Card).unwrap();
        flow.continue_to_cards().unwrap();
        flow
    }

    fn fill_valid_card(form: &mut NewCardForm) {
        assert!(form.set_card_number("4111111111111111"));
        assert!(form.set_expiry_month("12"));
        assert!(form.set_expiry_year("25"));
        assert!(form.set_cvv("123"));
        form.set_holder_name("A B");
    }

    #[test]
    fn test_amount_gate() {
        let mut flow = TopUpFlow::new(Currency::USD);
        assert!(!flow.edit_amount("abc"));
        assert!(flow.edit_amount("0"));
        assert!(matches!(
            flow.continue_to_methods(),
            Err(ClientError::Amount(_))
        ));
        assert_eq!(flow.step(), TopUpStep::AmountEntry);

        assert!(flow.quick_amount(25));
        flow.continue_to_methods().unwrap();
        assert_eq!(flow.step(), TopUpStep::MethodSelection);
        assert!(!flow.edit_amount("30"));
    }

    #[test]
    fn test_submit_disabled_until_card_chosen() {
        let mut flow = flow_at_cards("50");
        assert!(!flow.can_submit());
        assert_eq!(flow.build_request(), Err(ClientError::NoPaymentMethod));

        flow.select_stored_card(7).unwrap();
        assert!(flow.can_submit());
        let req = flow.build_request().unwrap();
        assert_eq!(req.amount, 5000);
        assert_eq!(req.method, PaymentMethod::StoredCard(7));
        assert_eq!(req.description, "Added $50.00 via saved card");
    }

    #[test]
    fn test_new_card_replaces_stored_selection() {
        let mut flow = flow_at_cards("10");
        flow.select_stored_card(7).unwrap();

        let form = flow.new_card_mut().unwrap();
        assert!(form.set_card_number("4111"));
        assert_eq!(flow.card_choice(), CardChoice::New);
        assert!(!flow.can_submit());
        assert!(matches!(flow.build_request(), Err(ClientError::Card(_))));

        let form = flow.new_card_mut().unwrap();
        fill_valid_card(form);
        assert!(flow.can_submit());
        let req = flow.build_request().unwrap();
        assert!(matches!(req.method, PaymentMethod::NewCard(_)));
        assert_eq!(req.description, "Added $10.00 via new card");
    }

    #[test]
    fn test_upi_submits_from_method_selection() {
        let mut flow = TopUpFlow::new(Currency::INR);
        flow.edit_amount("855.90");
        flow.continue_to_methods().unwrap();
        flow.select_method(TopUpMethod::Upi).unwrap();
        assert!(flow.continue_to_cards().is_err());
        assert!(flow.can_submit());

        let req = flow.build_request().unwrap();
        assert_eq!(req.amount, 1000);
        assert_eq!(req.description, "Added ₹855.90 via UPI");
        assert!(flow.fee_quote().unwrap().is_free());
    }

    #[test]
    fn test_card_fee_quote() {
        let flow = flow_at_cards("100.00");
        let q = flow.fee_quote().unwrap();
        assert_eq!(q.fee_display(), "$1.40");
        assert_eq!(q.total_display(), "$101.40");
    }

    #[test]
    fn test_single_submission_in_flight() {
        let mut flow = flow_at_cards("50");
        flow.select_stored_card(1).unwrap();

        flow.begin_submit().unwrap();
        assert_eq!(flow.step(), TopUpStep::Submitted);
        assert!(!flow.can_submit());
        assert_eq!(flow.begin_submit(), Err(ClientError::SubmissionPending));
        assert_eq!(flow.select_stored_card(2), Err(ClientError::SubmissionPending));
        assert!(!flow.back());
    }

    #[test]
    fn test_failure_returns_to_card_selection() {
        let mut flow = flow_at_cards("50");
        flow.select_stored_card(1).unwrap();
        flow.begin_submit().unwrap();

        let failed: Result<(), ClientError> = Err(ClientError::Network("timeout".into()));
        flow.complete(&failed);

        assert_eq!(flow.step(), TopUpStep::CardSelection);
        assert_eq!(flow.card_choice(), CardChoice::Stored(1));
        assert_eq!(flow.amount().as_str(), "50");
        assert!(flow.last_error().is_some());
        assert!(flow.can_submit());
    }

    #[test]
    fn test_success_resets_flow() {
        let mut flow = flow_at_cards("50");
        flow.select_stored_card(1).unwrap();
        flow.begin_submit().unwrap();
        flow.complete(&Ok::<(), ClientError>(()));

        assert_eq!(flow.step(), TopUpStep::AmountEntry);
        assert_eq!(flow.amount().as_str(), "");
        assert_eq!(flow.card_choice(), CardChoice::Unselected);
        assert_eq!(flow.currency(), Currency::USD);
    }

    #[test]
    fn test_back_navigation_keeps_input() {
        let mut flow = flow_at_cards("42");
        assert!(flow.back());
        assert_eq!(flow.step(), TopUpStep::MethodSelection);
        assert!(flow.back());
        assert_eq!(flow.step(), TopUpStep::AmountEntry);
        assert_eq!(flow.amount().as_str(), "42");
        assert!(!flow.back());
    }

    #[test]
    fn test_sub_cent_amount_cannot_be_submitted() {
        let mut flow = TopUpFlow::new(Currency::USD);
        flow.edit_amount("0.001");
        flow.continue_to_methods().unwrap();
        flow.select_method(TopUpMethod::Upi).unwrap();

        assert_eq!(
            flow.begin_submit(),
            Err(ClientError::Amount(crate::money::MoneyError::NotPositive))
        );
        assert_eq!(flow.step(), TopUpStep::MethodSelection);
    }

    #[test]
    fn test_dropped_submission_unlocks_flow() {
        let mut flow = flow_at_cards("50");
        flow.select_stored_card(1).unwrap();
        flow.begin_submit().unwrap();

        drop(InFlight(&mut flow));
        assert_eq!(flow.step(), TopUpStep::CardSelection);
        assert!(flow.can_submit());
    }
}
