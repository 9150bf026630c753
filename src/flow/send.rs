//! Send-money flow
//!
//! Recipient search, amount and note. The recipient must be picked from
//! search results (or preselected); typing over its name drops it.

use tracing::debug;

use crate::currency::Currency;
use crate::error::ClientError;
use crate::models::{Transaction, TransferRequest, UserSummary};
use crate::money::{AmountInput, to_submission_minor_units};
use crate::wallet::Wallet;

#[derive(Debug, Clone, Default)]
pub struct SendFlow {
    currency: Currency,
    search: String,
    recipient: Option<UserSummary>,
    amount: AmountInput,
    note: String,
    pending: bool,
    last_error: Option<ClientError>,
}

impl SendFlow {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            ..Self::default()
        }
    }

    /// Opened from a friend entry: recipient already chosen
    pub fn with_recipient(currency: Currency, recipient: UserSummary) -> Self {
        let mut flow = Self::new(currency);
        flow.select_recipient(recipient);
        flow
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn search_text(&self) -> &str {
        &self.search
    }

    pub fn recipient(&self) -> Option<&UserSummary> {
        self.recipient.as_ref()
    }

    pub fn amount(&self) -> &AmountInput {
        &self.amount
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_string();
        if let Some(r) = &self.recipient
            && !self.search.contains(&r.name)
        {
            debug!(recipient_id = r.id, "[send] search edited, recipient dropped");
            self.recipient = None;
        }
    }

    pub fn select_recipient(&mut self, user: UserSummary) {
        self.search = user.name.clone();
        self.recipient = Some(user);
    }

    pub fn edit_amount(&mut self, text: &str) -> bool {
        !self.pending && self.amount.apply_edit(text)
    }

    pub fn quick_amount(&mut self, amount: u32) {
        if !self.pending {
            self.amount.set_quick_amount(amount);
        }
    }

    pub fn set_note(&mut self, note: &str) {
        self.note = note.to_string();
    }

    pub fn can_submit(&self) -> bool {
        !self.pending && self.recipient.is_some() && self.amount.is_positive()
    }

    /// Request for the current input, checked against `available` minor units
    pub fn build_request(&self, available: u64) -> Result<TransferRequest, ClientError> {
        let recipient = self.recipient.as_ref().ok_or(ClientError::MissingRecipient)?;
        let amount = self.amount.positive_value()?;
        let minor = to_submission_minor_units(amount, self.currency)?;
        if minor > available {
            return Err(ClientError::InsufficientBalance {
                requested: minor,
                available,
            });
        }

        let note = self.note.trim();
        Ok(TransferRequest {
            receiver_id: recipient.id,
            amount: minor,
            description: (!note.is_empty()).then(|| note.to_string()),
        })
    }

    /// Pre-check against the wallet balance, then send. Any failure, local
    /// or remote, is kept in [`SendFlow::last_error`] with the input intact.
    pub async fn submit(&mut self, wallet: &Wallet) -> Result<Transaction, ClientError> {
        if self.pending {
            return Err(ClientError::SubmissionPending);
        }
        self.last_error = None;

        let result = match wallet.available_balance().await {
            Ok(available) => match self.build_request(available) {
                Ok(req) => {
                    let _pending = PendingGuard::arm(&mut self.pending);
                    wallet.execute_transfer(req).await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => self.reset(),
            Err(e) => self.last_error = Some(e.clone()),
        }
        result
    }

    /// Clear every field, currency kept
    pub fn reset(&mut self) {
        *self = Self::new(self.currency);
    }
}

/// Holds the pending flag for the duration of the network call. Dropping
/// the submit future mid-call releases it too.
struct PendingGuard<'a>(&'a mut bool);

impl<'a> PendingGuard<'a> {
    fn arm(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::MoneyError;

    fn bob() -> UserSummary {
        UserSummary {
            id: 2,
            name: "Bob".into(),
            email: "bob@example.com".into(),
        }
    }

    #[test]
    fn test_editing_search_drops_recipient() {
        let mut flow = SendFlow::with_recipient(Currency::USD, bob());
        assert_eq!(flow.search_text(), "Bob");

        flow.set_search("Bob S");
        assert!(flow.recipient().is_some());

        flow.set_search("Bo");
        assert!(flow.recipient().is_none());
    }

    #[test]
    fn test_submit_gating() {
        let mut flow = SendFlow::new(Currency::USD);
        flow.edit_amount("20");
        assert!(!flow.can_submit());
        assert_eq!(flow.build_request(10_000), Err(ClientError::MissingRecipient));

        flow.select_recipient(bob());
        assert!(flow.can_submit());
        assert!(!flow.edit_amount("-5"));
    }

    #[test]
    fn test_insufficient_balance_guard() {
        let mut flow = SendFlow::with_recipient(Currency::USD, bob());
        flow.edit_amount("20");
        assert_eq!(
            flow.build_request(1000),
            Err(ClientError::InsufficientBalance {
                requested: 2000,
                available: 1000
            })
        );
    }

    #[test]
    fn test_request_in_canonical_units_with_note() {
        let mut flow = SendFlow::with_recipient(Currency::GBP, bob());
        flow.edit_amount("7.40");
        flow.set_note("  dinner ");

        let req = flow.build_request(10_000).unwrap();
        assert_eq!(req.receiver_id, 2);
        assert_eq!(req.amount, 1000);
        assert_eq!(req.description.as_deref(), Some("dinner"));

        flow.set_note("   ");
        assert_eq!(flow.build_request(10_000).unwrap().description, None);
    }

    #[test]
    fn test_sub_cent_amount_rejected_locally() {
        let mut flow = SendFlow::with_recipient(Currency::INR, bob());
        flow.edit_amount("0.4");
        assert!(flow.can_submit());
        assert_eq!(
            flow.build_request(10_000),
            Err(ClientError::Amount(MoneyError::NotPositive))
        );
    }

    #[test]
    fn test_pending_guard_releases_on_drop() {
        let mut pending = false;
        {
            let _guard = PendingGuard::arm(&mut pending);
        }
        assert!(!pending);
    }

    #[cfg(feature = "mock-api")]
    mod with_wallet {
        use super::*;
        use crate::api::mock::MockWalletApi;
        use std::sync::Arc;

        #[tokio::test]
        async fn test_precheck_failure_recorded() {
            let api = Arc::new(MockWalletApi::new());
            let alice = api.add_user("Alice", "alice@example.com", "pw", 1000);
            api.sign_in_as(alice);
            let wallet = Wallet::new(api.clone());

            let mut flow = SendFlow::with_recipient(Currency::USD, bob());
            flow.edit_amount("20");
            let err = flow.submit(&wallet).await.unwrap_err();

            assert_eq!(flow.last_error(), Some(&err));
            assert!(!flow.is_pending());
            assert_eq!(api.call_count("send_money"), 0);

            api.fail("balance", ClientError::Network("reset".into()));
            wallet.cache().clear();
            let err = flow.submit(&wallet).await.unwrap_err();
            assert_eq!(err, ClientError::Network("reset".into()));
            assert_eq!(flow.last_error(), Some(&err));
            assert_eq!(flow.amount().as_str(), "20");
        }
    }
}
