//! Wire types for the wallet HTTP API
//!
//! Amounts are always `u64` USD minor units. Field names follow the
//! server's snake_case JSON. Response types are lenient (`#[serde(default)]`)
//! because the server omits empty fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::card::{CardDetails, CardType};
use crate::currency::Currency;

pub type UserId = u64;
pub type CardId = u64;
pub type TransactionId = u64;

// ============================================================================
// Payment method
// ============================================================================

/// Top-up funding choice made on the method-selection step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopUpMethod {
    #[default]
    Card,
    Upi,
}

impl TopUpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopUpMethod::Card => "card",
            TopUpMethod::Upi => "upi",
        }
    }
}

impl fmt::Display for TopUpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved payment method of a top-up. Exactly one per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    StoredCard(CardId),
    NewCard(CardDetails),
    Upi,
}

impl PaymentMethod {
    pub fn funding(&self) -> TopUpMethod {
        match self {
            PaymentMethod::StoredCard(_) | PaymentMethod::NewCard(_) => TopUpMethod::Card,
            PaymentMethod::Upi => TopUpMethod::Upi,
        }
    }

    /// Suffix used in the top-up description
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::StoredCard(_) => "saved card",
            PaymentMethod::NewCard(_) => "new card",
            PaymentMethod::Upi => "UPI",
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// `POST /api/transactions/send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub receiver_id: UserId,
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A top-up before it is split into its endpoint-specific wire shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUpRequest {
    pub amount: u64,
    pub description: String,
    pub method: PaymentMethod,
}

/// Endpoint-specific top-up payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopUpPayload {
    Upi(AddBalanceRequest),
    Card(CardTopUpRequest),
}

impl TopUpRequest {
    pub fn into_payload(self) -> TopUpPayload {
        match self.method {
            PaymentMethod::Upi => TopUpPayload::Upi(AddBalanceRequest {
                amount: self.amount,
                description: Some(self.description),
            }),
            PaymentMethod::StoredCard(card_id) => TopUpPayload::Card(CardTopUpRequest {
                amount: self.amount,
                description: self.description,
                card_id: Some(card_id),
                card_data: None,
            }),
            PaymentMethod::NewCard(details) => TopUpPayload::Card(CardTopUpRequest {
                amount: self.amount,
                description: self.description,
                card_id: None,
                card_data: Some(details),
            }),
        }
    }
}

/// `POST /api/wallet/balance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddBalanceRequest {
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `POST /api/cards/add-money`. Exactly one of `card_id` / `card_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardTopUpRequest {
    pub amount: u64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_data: Option<CardDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub user: String,
    pub passwd: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub user: String,
    pub passwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddFriendRequest {
    pub friend_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyUpdateRequest {
    pub currency: Currency,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: String,
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// `GET /api/user/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub auth_provider: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Search results and friend-list entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: u64,
}

/// Reply to `POST /api/wallet/balance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBalanceResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(alias = "balance")]
    pub new_balance: u64,
}

/// Reply to `POST /api/cards/add-money`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTopUpResponse {
    #[serde(default)]
    pub message: String,
    pub amount: u64,
    #[serde(default)]
    pub fee: u64,
    pub new_balance: u64,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "received")]
    Received,
    #[serde(rename = "self")]
    SelfTopUp,
    #[serde(other)]
    Other,
}

/// Transaction record (send reply and history rows)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(default)]
    pub sender_id: UserId,
    #[serde(default)]
    pub receiver_id: UserId,
    pub amount: u64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sender: Option<UserSummary>,
    #[serde(default)]
    pub receiver: Option<UserSummary>,
}

fn default_kind() -> TransactionKind {
    TransactionKind::Other
}

/// `GET /api/transactions/history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCard {
    pub id: CardId,
    pub masked_number: String,
    pub card_type: CardType,
    #[serde(default)]
    pub holder_name: String,
    #[serde(default)]
    pub expiry_month: String,
    #[serde(default)]
    pub expiry_year: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_used_at: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardList {
    #[serde(default)]
    pub cards: Vec<StoredCard>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendList {
    #[serde(default)]
    pub friends: Vec<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyUpdateResponse {
    #[serde(default)]
    pub message: String,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Error body of a non-2xx reply, when the server sends JSON
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card() -> CardDetails {
        CardDetails {
            card_number: "4111111111111111".into(),
            expiry_month: "12".into(),
            expiry_year: "25".into(),
            cvv: "123".into(),
            holder_name: "A B".into(),
        }
    }

    #[test]
    fn test_transfer_request_omits_empty_description() {
        let req = TransferRequest {
            receiver_id: 7,
            amount: 2000,
            description: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "receiver_id": 7, "amount": 2000 })
        );
    }

    #[test]
    fn test_card_top_up_carries_exactly_one_card_reference() {
        let stored = TopUpRequest {
            amount: 5000,
            description: "Added $50.00 via saved card".into(),
            method: PaymentMethod::StoredCard(3),
        };
        let TopUpPayload::Card(body) = stored.into_payload() else {
            panic!("stored card must use the card endpoint");
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["card_id"], 3);
        assert!(v.get("card_data").is_none());

        let fresh = TopUpRequest {
            amount: 5000,
            description: "Added $50.00 via new card".into(),
            method: PaymentMethod::NewCard(card()),
        };
        let TopUpPayload::Card(body) = fresh.into_payload() else {
            panic!("new card must use the card endpoint");
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("card_id").is_none());
        assert_eq!(v["card_data"]["card_number"], "4111111111111111");
    }

    #[test]
    fn test_upi_top_up_uses_balance_endpoint() {
        let req = TopUpRequest {
            amount: 1000,
            description: "Added $10.00 via UPI".into(),
            method: PaymentMethod::Upi,
        };
        assert_eq!(
            req.into_payload(),
            TopUpPayload::Upi(AddBalanceRequest {
                amount: 1000,
                description: Some("Added $10.00 via UPI".into()),
            })
        );
    }

    #[test]
    fn test_add_balance_response_accepts_either_field_name() {
        let a: AddBalanceResponse = serde_json::from_value(json!({ "new_balance": 10 })).unwrap();
        let b: AddBalanceResponse = serde_json::from_value(json!({ "balance": 10 })).unwrap();
        assert_eq!(a.new_balance, 10);
        assert_eq!(b.new_balance, 10);
    }

    #[test]
    fn test_history_page_parses_server_shape() {
        let page: TransactionPage = serde_json::from_value(json!({
            "transactions": [{
                "id": 1,
                "sender_id": 1,
                "receiver_id": 2,
                "amount": 2000,
                "description": "lunch",
                "type": "sent",
                "timestamp": "2025-01-02T03:04:05Z",
                "receiver": { "id": 2, "name": "Bob", "email": "bob@example.com" }
            }, {
                "id": 2,
                "amount": 500,
                "type": "refund"
            }],
            "total": 2,
            "page": 1,
            "limit": 10
        }))
        .unwrap();

        assert_eq!(page.transactions[0].kind, TransactionKind::Sent);
        assert_eq!(page.transactions[0].receiver.as_ref().unwrap().name, "Bob");
        assert_eq!(page.transactions[1].kind, TransactionKind::Other);
    }

    #[test]
    fn test_user_with_unknown_currency_defaults_to_usd() {
        let user: UserData = serde_json::from_value(json!({
            "id": 1, "name": "A", "email": "a@x", "balance": 10, "currency": "JPY"
        }))
        .unwrap();
        assert_eq!(user.currency, Currency::USD);
    }

    #[test]
    fn test_error_body_prefers_error_field() {
        let body: ApiErrorBody =
            serde_json::from_value(json!({ "error": "nope", "message": "x" })).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("nope"));
        assert_eq!(ApiErrorBody::default().into_message(), None);
    }
}
