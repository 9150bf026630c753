//! Wallet API boundary
//!
//! [`WalletApi`] is the seam between client logic and the remote server.
//! [`HttpWalletApi`] talks to the real service; the mock (feature
//! `mock-api`) keeps an in-memory ledger for tests.
//!
//! Mutating calls take an idempotency key. One key is generated per
//! submission and is reused if the call is replayed after a token refresh.

pub mod http;
#[cfg(feature = "mock-api")]
pub mod mock;
pub mod session;

pub use http::HttpWalletApi;
pub use session::SessionStore;

use async_trait::async_trait;

use crate::card::CardDetails;
use crate::currency::Currency;
use crate::error::ClientError;
use crate::models::{
    AddBalanceRequest, AddBalanceResponse, AuthResponse, BalanceResponse, CardId, CardList,
    CardTopUpRequest, CardTopUpResponse, CurrencyUpdateResponse, FriendList, HealthStatus,
    LoginRequest, MessageResponse, SignupRequest, StoredCard, Transaction, TransactionPage,
    TransferRequest, UserData, UserId, UserList,
};

/// Fresh idempotency key for one submission
pub fn new_idempotency_key() -> String {
    ulid::Ulid::new().to_string()
}

/// Remote wallet service
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    // === Session ===

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError>;

    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError>;

    /// Ends the session. Local credentials are dropped even when the server
    /// call fails.
    async fn logout(&self) -> Result<(), ClientError>;

    fn is_authenticated(&self) -> bool;

    // === Reads ===

    async fn current_user(&self) -> Result<UserData, ClientError>;

    async fn balance(&self) -> Result<BalanceResponse, ClientError>;

    async fn transaction_history(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<TransactionPage, ClientError>;

    async fn cards(&self) -> Result<CardList, ClientError>;

    async fn friends(&self) -> Result<FriendList, ClientError>;

    async fn search_users(&self, query: &str) -> Result<UserList, ClientError>;

    async fn health(&self) -> Result<HealthStatus, ClientError>;

    // === Money movement ===

    async fn send_money(
        &self,
        req: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<Transaction, ClientError>;

    async fn add_balance(
        &self,
        req: &AddBalanceRequest,
        idempotency_key: &str,
    ) -> Result<AddBalanceResponse, ClientError>;

    async fn add_money_with_card(
        &self,
        req: &CardTopUpRequest,
        idempotency_key: &str,
    ) -> Result<CardTopUpResponse, ClientError>;

    // === Cards, friends, preferences ===

    async fn add_card(&self, card: &CardDetails) -> Result<StoredCard, ClientError>;

    async fn delete_card(&self, card_id: CardId) -> Result<MessageResponse, ClientError>;

    async fn add_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError>;

    async fn remove_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError>;

    async fn update_currency(
        &self,
        currency: Currency,
    ) -> Result<CurrencyUpdateResponse, ClientError>;
}
