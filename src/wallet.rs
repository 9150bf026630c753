//! Wallet facade
//!
//! Owns the API handle and the query cache. Reads go through the cache;
//! mutations run the local pre-checks, hit the API once with a fresh
//! idempotency key, and on success invalidate whatever the mutation made
//! stale. A failed mutation leaves the cache untouched.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{WalletApi, new_idempotency_key};
use crate::cache::{QueryCache, QueryKey};
use crate::card::CardDetails;
use crate::config::AppConfig;
use crate::currency::Currency;
use crate::error::{ClientError, ErrorKind};
use crate::models::{
    AddBalanceResponse, AuthResponse, BalanceResponse, CardId, CardList, CardTopUpResponse,
    CurrencyUpdateResponse, FriendList, HealthStatus, LoginRequest, MessageResponse,
    SignupRequest, StoredCard, TopUpPayload, TopUpRequest, Transaction, TransactionPage,
    TransferRequest, UserData, UserId, UserList, UserSummary,
};
use crate::money::{DisplayAmount, from_canonical_minor_units};
use crate::pagination::MAX_PAGE_SIZE;
use crate::reconcile::Mutation;

/// Server reply to a completed top-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopUpOutcome {
    Upi(AddBalanceResponse),
    Card(CardTopUpResponse),
}

impl TopUpOutcome {
    pub fn new_balance(&self) -> u64 {
        match self {
            TopUpOutcome::Upi(resp) => resp.new_balance,
            TopUpOutcome::Card(resp) => resp.new_balance,
        }
    }

    /// Fee charged by the service, minor units
    pub fn fee(&self) -> u64 {
        match self {
            TopUpOutcome::Upi(_) => 0,
            TopUpOutcome::Card(resp) => resp.fee,
        }
    }
}

pub struct Wallet {
    api: Arc<dyn WalletApi>,
    cache: QueryCache,
    min_query_chars: usize,
    fallback_currency: Currency,
}

impl Wallet {
    pub fn new(api: Arc<dyn WalletApi>) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
            min_query_chars: 3,
            fallback_currency: Currency::USD,
        }
    }

    pub fn from_config(api: Arc<dyn WalletApi>, config: &AppConfig) -> Self {
        Self {
            api,
            cache: QueryCache::with_search_ttl(Duration::from_secs(config.search.stale_secs)),
            min_query_chars: config.search.min_query_chars,
            fallback_currency: config.display.currency,
        }
    }

    pub fn api(&self) -> &Arc<dyn WalletApi> {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.is_authenticated()
    }

    fn reconcile(&self, mutation: Mutation) {
        let marked = self.cache.invalidate(mutation.invalidates());
        debug!(mutation = ?mutation, marked, "[wallet] reconciled cache");
    }

    /// An expired session takes every cached snapshot with it
    fn observe<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if matches!(result, Err(ClientError::SessionExpired)) {
            warn!("[wallet] session expired, dropping cached data");
            self.cache.clear();
        }
        result
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub async fn login(&self, user: &str, passwd: &str) -> Result<AuthResponse, ClientError> {
        let req = LoginRequest {
            user: user.to_string(),
            passwd: passwd.to_string(),
        };
        let auth = self.api.login(&req).await?;
        self.reconcile(Mutation::Login);
        Ok(auth)
    }

    pub async fn signup(
        &self,
        user: &str,
        passwd: &str,
        name: Option<&str>,
    ) -> Result<AuthResponse, ClientError> {
        let req = SignupRequest {
            user: user.to_string(),
            passwd: passwd.to_string(),
            name: name.map(str::to_string),
        };
        let auth = self.api.signup(&req).await?;
        self.reconcile(Mutation::Login);
        Ok(auth)
    }

    /// Always drops local state, even when the server call fails
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.api.logout().await;
        self.cache.clear();
        if let Err(e) = &result {
            warn!(error = %e, "[wallet] server logout failed, local session cleared anyway");
        }
        result
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn current_user(&self) -> Result<UserData, ClientError> {
        let result = self
            .cache
            .fetch(QueryKey::CurrentUser, || self.api.current_user())
            .await;
        self.observe(result)
    }

    /// Available balance in USD minor units
    pub async fn balance(&self) -> Result<u64, ClientError> {
        let result = self
            .cache
            .fetch(QueryKey::Balance, || self.api.balance())
            .await;
        self.observe(result).map(|b: BalanceResponse| b.balance)
    }

    /// Balance for the pre-submit check. A stale entry is refetched first;
    /// the stale value is only used when that refetch fails.
    pub async fn available_balance(&self) -> Result<u64, ClientError> {
        let stale = self.cache.get::<BalanceResponse>(&QueryKey::Balance);
        match self.balance().await {
            Ok(balance) => Ok(balance),
            Err(e) if e.kind() == ErrorKind::Authentication => Err(e),
            Err(e) => match stale {
                Some(cached) => {
                    warn!(
                        error = %e,
                        balance = cached.balance,
                        "[wallet] balance refetch failed, using stale value"
                    );
                    Ok(cached.balance)
                }
                None => Err(e),
            },
        }
    }

    /// Display currency: the profile preference, or the configured fallback
    /// when the profile cannot be read.
    pub async fn currency(&self) -> Currency {
        match self.current_user().await {
            Ok(user) => user.currency,
            Err(e) => {
                debug!(error = %e, "[wallet] no profile, using fallback currency");
                self.fallback_currency
            }
        }
    }

    pub async fn display_balance(&self) -> Result<DisplayAmount, ClientError> {
        let balance = self.balance().await?;
        let currency = self.currency().await;
        Ok(from_canonical_minor_units(balance, currency))
    }

    /// One page of history. Page and limit must be positive; limit is capped.
    pub async fn transaction_history(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<TransactionPage, ClientError> {
        if page == 0 || limit == 0 {
            return Err(ClientError::InvalidQuery(format!(
                "page and limit must be positive (page={}, limit={})",
                page, limit
            )));
        }
        let limit = limit.min(MAX_PAGE_SIZE);
        let result = self
            .cache
            .fetch(QueryKey::TransactionHistory { page, limit }, || {
                self.api.transaction_history(page, limit)
            })
            .await;
        self.observe(result)
    }

    pub async fn cards(&self) -> Result<Vec<StoredCard>, ClientError> {
        let result = self.cache.fetch(QueryKey::Cards, || self.api.cards()).await;
        self.observe(result).map(|list: CardList| list.cards)
    }

    pub async fn friends(&self) -> Result<Vec<UserSummary>, ClientError> {
        let result = self
            .cache
            .fetch(QueryKey::Friends, || self.api.friends())
            .await;
        self.observe(result).map(|list: FriendList| list.friends)
    }

    /// Empty without a request while the query is too short
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ClientError> {
        let query = query.trim();
        if query.chars().count() < self.min_query_chars {
            return Ok(Vec::new());
        }
        let result = self
            .cache
            .fetch(QueryKey::UserSearch(query.to_string()), || {
                self.api.search_users(query)
            })
            .await;
        self.observe(result).map(|list: UserList| list.users)
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.api.health().await
    }

    // ========================================================================
    // Money movement
    // ========================================================================

    pub async fn execute_transfer(&self, req: TransferRequest) -> Result<Transaction, ClientError> {
        let available = self.available_balance().await?;
        if req.amount > available {
            warn!(
                requested = req.amount,
                available, "[wallet] transfer blocked: insufficient balance"
            );
            return Err(ClientError::InsufficientBalance {
                requested: req.amount,
                available,
            });
        }

        let key = new_idempotency_key();
        let tx = self.observe(self.api.send_money(&req, &key).await)?;
        self.reconcile(Mutation::Transfer);
        info!(
            tx_id = tx.id,
            receiver_id = req.receiver_id,
            amount = req.amount,
            "[wallet] transfer sent"
        );
        Ok(tx)
    }

    pub async fn execute_top_up(&self, req: TopUpRequest) -> Result<TopUpOutcome, ClientError> {
        let key = new_idempotency_key();
        let amount = req.amount;
        let label = req.method.label();

        let outcome = match req.into_payload() {
            TopUpPayload::Upi(body) => {
                let resp = self.observe(self.api.add_balance(&body, &key).await)?;
                self.reconcile(Mutation::UpiTopUp);
                TopUpOutcome::Upi(resp)
            }
            TopUpPayload::Card(body) => {
                let resp = self.observe(self.api.add_money_with_card(&body, &key).await)?;
                self.reconcile(Mutation::CardTopUp);
                TopUpOutcome::Card(resp)
            }
        };

        info!(
            amount,
            via = label,
            fee = outcome.fee(),
            new_balance = outcome.new_balance(),
            "[wallet] top-up completed"
        );
        Ok(outcome)
    }

    // ========================================================================
    // Cards, friends, preferences
    // ========================================================================

    pub async fn add_card(&self, card: &CardDetails) -> Result<StoredCard, ClientError> {
        card.check()?;
        let stored = self.observe(self.api.add_card(card).await)?;
        self.reconcile(Mutation::AddCard);
        Ok(stored)
    }

    pub async fn delete_card(&self, card_id: CardId) -> Result<MessageResponse, ClientError> {
        let resp = self.observe(self.api.delete_card(card_id).await)?;
        self.reconcile(Mutation::DeleteCard);
        Ok(resp)
    }

    pub async fn add_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError> {
        let resp = self.observe(self.api.add_friend(friend_id).await)?;
        self.reconcile(Mutation::AddFriend);
        Ok(resp)
    }

    pub async fn remove_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError> {
        let resp = self.observe(self.api.remove_friend(friend_id).await)?;
        self.reconcile(Mutation::RemoveFriend);
        Ok(resp)
    }

    /// Patch the cached profile right away, then re-sync from the server
    /// whatever the call returned.
    pub async fn set_currency(
        &self,
        currency: Currency,
    ) -> Result<CurrencyUpdateResponse, ClientError> {
        let patched = self
            .cache
            .patch::<UserData, _>(&QueryKey::CurrentUser, |user| user.currency = currency);
        debug!(currency = %currency, patched, "[wallet] optimistic currency patch");

        let result = self.api.update_currency(currency).await;
        self.reconcile(Mutation::CurrencyChange);
        self.observe(result)
    }
}

#[cfg(all(test, feature = "mock-api"))]
mod tests {
    use super::*;
    use crate::api::mock::MockWalletApi;
    use crate::cache::CacheScope;
    use crate::models::PaymentMethod;

    fn setup(balance: u64) -> (Arc<MockWalletApi>, Wallet, UserId, UserId) {
        let api = Arc::new(MockWalletApi::new());
        let alice = api.add_user("Alice", "alice@example.com", "pw", balance);
        let bob = api.add_user("Bob", "bob@example.com", "pw", 0);
        api.sign_in_as(alice);
        let wallet = Wallet::new(api.clone());
        (api, wallet, alice, bob)
    }

    #[tokio::test]
    async fn test_reads_are_cached() {
        let (api, wallet, _, _) = setup(1000);
        assert_eq!(wallet.balance().await.unwrap(), 1000);
        assert_eq!(wallet.balance().await.unwrap(), 1000);
        assert_eq!(api.call_count("balance"), 1);
    }

    #[tokio::test]
    async fn test_transfer_blocked_without_network_call() {
        let (api, wallet, _, bob) = setup(1000);
        wallet.balance().await.unwrap();

        let err = wallet
            .execute_transfer(TransferRequest {
                receiver_id: bob,
                amount: 2000,
                description: None,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::InsufficientBalance {
                requested: 2000,
                available: 1000
            }
        );
        assert_eq!(api.call_count("send_money"), 0);
    }

    #[tokio::test]
    async fn test_transfer_after_top_up_checks_fresh_balance() {
        let (api, wallet, _, bob) = setup(0);
        assert_eq!(wallet.balance().await.unwrap(), 0);

        wallet
            .execute_top_up(TopUpRequest {
                amount: 10_000,
                description: "Added $100.00 via UPI".into(),
                method: PaymentMethod::Upi,
            })
            .await
            .unwrap();
        assert!(wallet.cache().is_stale(&QueryKey::Balance));

        let tx = wallet
            .execute_transfer(TransferRequest {
                receiver_id: bob,
                amount: 5000,
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(tx.amount, 5000);
        assert_eq!(api.call_count("balance"), 2);
        assert_eq!(api.call_count("send_money"), 1);
    }

    #[tokio::test]
    async fn test_stale_balance_used_when_refetch_fails() {
        let (api, wallet, _, _) = setup(1000);
        wallet.balance().await.unwrap();
        wallet.cache().invalidate(&[CacheScope::Balance]);
        api.fail("balance", ClientError::Network("reset".into()));

        assert_eq!(wallet.available_balance().await.unwrap(), 1000);

        wallet.cache().clear();
        assert!(wallet.available_balance().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_transfer_invalidates_nothing() {
        let (api, wallet, _, bob) = setup(5000);
        wallet.balance().await.unwrap();
        api.fail("send_money", ClientError::Network("reset".into()));

        let res = wallet
            .execute_transfer(TransferRequest {
                receiver_id: bob,
                amount: 100,
                description: None,
            })
            .await;
        assert!(res.is_err());
        assert!(!wallet.cache().is_stale(&QueryKey::Balance));
    }

    #[tokio::test]
    async fn test_card_top_up_invalidates_cards() {
        let (_api, wallet, _, _) = setup(0);
        wallet.cards().await.unwrap();
        wallet.balance().await.unwrap();

        let outcome = wallet
            .execute_top_up(TopUpRequest {
                amount: 10_000,
                description: "Added $100.00 via saved card".into(),
                method: PaymentMethod::NewCard(CardDetails {
                    card_number: "4111111111111111".into(),
                    expiry_month: "12".into(),
                    expiry_year: "25".into(),
                    cvv: "123".into(),
                    holder_name: "A B".into(),
                }),
            })
            .await
            .unwrap();

        assert_eq!(outcome.fee(), 140);
        assert!(wallet.cache().is_stale(&QueryKey::Cards));
        assert!(wallet.cache().is_stale(&QueryKey::Balance));
        assert_eq!(wallet.cards().await.unwrap().len(), 1);
        assert_eq!(wallet.balance().await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_upi_top_up_leaves_cards_fresh() {
        let (_api, wallet, _, _) = setup(0);
        wallet.cards().await.unwrap();

        let outcome = wallet
            .execute_top_up(TopUpRequest {
                amount: 1000,
                description: "Added $10.00 via UPI".into(),
                method: PaymentMethod::Upi,
            })
            .await
            .unwrap();

        assert_eq!(outcome.new_balance(), 1000);
        assert_eq!(outcome.fee(), 0);
        assert!(!wallet.cache().is_stale(&QueryKey::Cards));
    }

    #[tokio::test]
    async fn test_history_query_guards() {
        let (api, wallet, _, _) = setup(0);
        assert!(matches!(
            wallet.transaction_history(0, 10).await,
            Err(ClientError::InvalidQuery(_))
        ));
        assert!(wallet.transaction_history(1, 0).await.is_err());
        assert_eq!(api.call_count("transaction_history"), 0);

        let page = wallet.transaction_history(1, 500).await.unwrap();
        assert_eq!(page.limit, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_short_search_issues_no_request() {
        let (api, wallet, _, _) = setup(0);
        assert!(wallet.search_users("bo").await.unwrap().is_empty());
        assert_eq!(api.call_count("search_users"), 0);

        let users = wallet.search_users("bob").await.unwrap();
        assert_eq!(users[0].name, "Bob");
        wallet.search_users(" bob ").await.unwrap();
        assert_eq!(api.call_count("search_users"), 1);
    }

    #[tokio::test]
    async fn test_currency_patch_then_resync() {
        let (api, wallet, _, _) = setup(0);
        assert_eq!(wallet.currency().await, Currency::USD);

        api.fail("update_currency", ClientError::Network("down".into()));
        assert!(wallet.set_currency(Currency::INR).await.is_err());
        assert_eq!(
            wallet
                .cache()
                .get::<UserData>(&QueryKey::CurrentUser)
                .map(|u| u.currency),
            Some(Currency::INR)
        );
        assert!(wallet.cache().is_stale(&QueryKey::CurrentUser));
        assert_eq!(wallet.currency().await, Currency::USD);

        api.clear_failures();
        wallet.set_currency(Currency::GBP).await.unwrap();
        assert_eq!(wallet.currency().await, Currency::GBP);
    }

    #[tokio::test]
    async fn test_logout_clears_cache_even_on_failure() {
        let (api, wallet, _, _) = setup(100);
        wallet.balance().await.unwrap();
        api.fail("logout", ClientError::Network("down".into()));

        assert!(wallet.logout().await.is_err());
        assert!(wallet.cache().is_empty());
        assert!(!wallet.is_authenticated());
    }

    #[tokio::test]
    async fn test_session_expiry_drops_cache() {
        let (api, wallet, _, _) = setup(100);
        wallet.balance().await.unwrap();
        wallet.cache().invalidate(&[CacheScope::Balance]);
        api.fail("balance", ClientError::SessionExpired);

        assert_eq!(wallet.balance().await, Err(ClientError::SessionExpired));
        assert!(wallet.cache().is_empty());
    }

    #[tokio::test]
    async fn test_friend_mutations_invalidate_friend_list() {
        let (_api, wallet, _, bob) = setup(0);
        assert!(wallet.friends().await.unwrap().is_empty());
        wallet.add_friend(bob).await.unwrap();
        assert!(wallet.cache().is_stale(&QueryKey::Friends));
        assert_eq!(wallet.friends().await.unwrap().len(), 1);

        wallet.remove_friend(bob).await.unwrap();
        assert!(wallet.friends().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_card_validates_locally() {
        let (api, wallet, _, _) = setup(0);
        let bad = CardDetails {
            card_number: "123".into(),
            expiry_month: "12".into(),
            expiry_year: "25".into(),
            cvv: "123".into(),
            holder_name: "A B".into(),
        };
        assert!(matches!(
            wallet.add_card(&bad).await,
            Err(ClientError::Card(_))
        ));
        assert_eq!(api.call_count("add_card"), 0);
    }
}
