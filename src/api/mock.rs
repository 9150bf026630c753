//! In-memory [`WalletApi`] for tests and offline demos
//!
//! Keeps a tiny ledger (users, balances, transactions, cards, friends) and
//! applies the same server-side rules the real service enforces. Every call
//! is counted per endpoint, and any endpoint can be made to fail.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::WalletApi;
use crate::card::{CardDetails, detect_card_type};
use crate::currency::Currency;
use crate::error::ClientError;
use crate::models::{
    AddBalanceRequest, AddBalanceResponse, AuthResponse, BalanceResponse, CardId, CardList,
    CardTopUpRequest, CardTopUpResponse, CurrencyUpdateResponse, FriendList, HealthStatus,
    LoginRequest, MessageResponse, SignupRequest, StoredCard, Transaction, TransactionKind,
    TransactionPage, TransferRequest, UserData, UserId, UserList, UserSummary,
};

/// Largest card top-up the service accepts, in minor units
pub const MAX_CARD_TOP_UP: u64 = 100_000;

struct MockUser {
    data: UserData,
    password: String,
}

#[derive(Default)]
struct Ledger {
    users: BTreeMap<UserId, MockUser>,
    session: Option<UserId>,
    transactions: Vec<Transaction>,
    cards: BTreeMap<CardId, (UserId, StoredCard)>,
    friends: HashMap<UserId, BTreeSet<UserId>>,
    /// Idempotency key -> transaction id it produced
    seen_keys: HashMap<String, u64>,
    next_user_id: UserId,
    next_card_id: CardId,
    next_tx_id: u64,
}

impl Ledger {
    fn me(&self) -> Result<UserId, ClientError> {
        self.session.ok_or(ClientError::NotAuthenticated)
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut MockUser, ClientError> {
        self.users.get_mut(&id).ok_or_else(|| not_found("User not found"))
    }

    fn summary(&self, id: UserId) -> Option<UserSummary> {
        self.users.get(&id).map(|u| UserSummary {
            id,
            name: u.data.name.clone(),
            email: u.data.email.clone(),
        })
    }

    fn record(
        &mut self,
        sender_id: UserId,
        receiver_id: UserId,
        amount: u64,
        description: String,
    ) -> Transaction {
        self.next_tx_id += 1;
        let tx = Transaction {
            id: self.next_tx_id,
            sender_id,
            receiver_id,
            amount,
            description,
            kind: if sender_id == receiver_id {
                TransactionKind::SelfTopUp
            } else {
                TransactionKind::Sent
            },
            timestamp: Some(Utc::now()),
            sender: self.summary(sender_id),
            receiver: self.summary(receiver_id),
        };
        self.transactions.push(tx.clone());
        tx
    }

    fn issue_token(&mut self, id: UserId) -> AuthResponse {
        self.session = Some(id);
        AuthResponse {
            message: "ok".to_string(),
            access_token: format!("mock-token-{}", id),
            expires_in: 3600,
        }
    }
}

fn bad_request(message: &str) -> ClientError {
    ClientError::Api {
        status: 400,
        message: message.to_string(),
    }
}

fn not_found(message: &str) -> ClientError {
    ClientError::Api {
        status: 404,
        message: message.to_string(),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `{TYPE}{first4}xxxx{last3}`
fn mask_card_number(number: &str) -> String {
    let type_code = detect_card_type(number).map_or("CARD", |t| t.as_str());
    let first: String = number.chars().take(4).collect();
    let last: String = number
        .chars()
        .skip(number.len().saturating_sub(3))
        .collect();
    format!("{}{}xxxx{}", type_code, first, last)
}

/// Card processing fee the service records, truncated to whole minor units
fn service_card_fee(amount: u64) -> u64 {
    amount * crate::fee::CARD_FEE_RATE / crate::fee::FEE_PRECISION
}

pub struct MockWalletApi {
    ledger: Mutex<Ledger>,
    calls: Mutex<HashMap<&'static str, usize>>,
    total_calls: AtomicUsize,
    /// Endpoint -> error returned instead of running it
    failures: Mutex<HashMap<&'static str, ClientError>>,
    idempotency_keys: Mutex<Vec<String>>,
}

impl Default for MockWalletApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWalletApi {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            calls: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
            idempotency_keys: Mutex::new(Vec::new()),
        }
    }

    /// Register a user and return its id
    pub fn add_user(&self, name: &str, email: &str, password: &str, balance: u64) -> UserId {
        let mut ledger = lock(&self.ledger);
        ledger.next_user_id += 1;
        let id = ledger.next_user_id;
        ledger.users.insert(
            id,
            MockUser {
                data: UserData {
                    id,
                    name: name.to_string(),
                    email: email.to_string(),
                    balance,
                    auth_provider: "email".to_string(),
                    avatar: None,
                    currency: Currency::USD,
                    created_at: Some(Utc::now()),
                    updated_at: None,
                },
                password: password.to_string(),
            },
        );
        id
    }

    /// Start a session without going through `login`
    pub fn sign_in_as(&self, id: UserId) {
        lock(&self.ledger).session = Some(id);
    }

    /// Server-side session ends (token expired and not refreshable)
    pub fn expire_session(&self) {
        lock(&self.ledger).session = None;
    }

    pub fn balance_of(&self, id: UserId) -> u64 {
        lock(&self.ledger)
            .users
            .get(&id)
            .map_or(0, |u| u.data.balance)
    }

    /// Change a balance behind the client's back
    pub fn set_balance(&self, id: UserId, balance: u64) {
        if let Some(user) = lock(&self.ledger).users.get_mut(&id) {
            user.data.balance = balance;
        }
    }

    pub fn transaction_count(&self) -> usize {
        lock(&self.ledger).transactions.len()
    }

    pub fn card_count(&self) -> usize {
        lock(&self.ledger).cards.len()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        lock(&self.calls)
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Make `endpoint` fail with `err` until [`Self::clear_failures`]
    pub fn fail(&self, endpoint: &'static str, err: ClientError) {
        lock(&self.failures).insert(endpoint, err);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    pub fn idempotency_keys(&self) -> Vec<String> {
        lock(&self.idempotency_keys).clone()
    }

    fn enter(&self, endpoint: &'static str) -> Result<(), ClientError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.calls).entry(endpoint).or_default() += 1;
        match lock(&self.failures).get(endpoint) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Returns the transaction recorded earlier under `key`, if any
    fn replayed(&self, ledger: &Ledger, key: &str) -> Option<Transaction> {
        lock(&self.idempotency_keys).push(key.to_string());
        let id = ledger.seen_keys.get(key)?;
        ledger.transactions.iter().find(|t| t.id == *id).cloned()
    }
}

#[async_trait]
impl WalletApi for MockWalletApi {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.enter("login")?;
        let mut ledger = lock(&self.ledger);
        let id = ledger
            .users
            .values()
            .find(|u| u.data.email == req.user && u.password == req.passwd)
            .map(|u| u.data.id)
            .ok_or(ClientError::Api {
                status: 401,
                message: "Invalid credentials".to_string(),
            })?;
        Ok(ledger.issue_token(id))
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError> {
        self.enter("signup")?;
        if lock(&self.ledger)
            .users
            .values()
            .any(|u| u.data.email == req.user)
        {
            return Err(ClientError::Api {
                status: 409,
                message: "User already exists".to_string(),
            });
        }
        let name = req.name.clone().unwrap_or_else(|| req.user.clone());
        let id = self.add_user(&name, &req.user, &req.passwd, 0);
        Ok(lock(&self.ledger).issue_token(id))
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let result = self.enter("logout");
        lock(&self.ledger).session = None;
        result
    }

    fn is_authenticated(&self) -> bool {
        lock(&self.ledger).session.is_some()
    }

    async fn current_user(&self) -> Result<UserData, ClientError> {
        self.enter("current_user")?;
        let ledger = lock(&self.ledger);
        let me = ledger.me()?;
        ledger
            .users
            .get(&me)
            .map(|u| u.data.clone())
            .ok_or_else(|| not_found("User not found"))
    }

    async fn balance(&self) -> Result<BalanceResponse, ClientError> {
        self.enter("balance")?;
        let ledger = lock(&self.ledger);
        let me = ledger.me()?;
        let balance = ledger.users.get(&me).map_or(0, |u| u.data.balance);
        Ok(BalanceResponse { balance })
    }

    async fn transaction_history(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<TransactionPage, ClientError> {
        self.enter("transaction_history")?;
        let ledger = lock(&self.ledger);
        let me = ledger.me()?;
        let page = page.max(1);
        let limit = limit.clamp(1, crate::pagination::MAX_PAGE_SIZE);

        let mine: Vec<Transaction> = ledger
            .transactions
            .iter()
            .rev()
            .filter(|t| t.sender_id == me || t.receiver_id == me)
            .map(|t| {
                let mut t = t.clone();
                if t.kind == TransactionKind::Sent && t.receiver_id == me {
                    t.kind = TransactionKind::Received;
                }
                t
            })
            .collect();
        let total = mine.len() as u64;
        let transactions = mine
            .into_iter()
            .skip((page - 1).saturating_mul(limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(TransactionPage {
            transactions,
            total,
            page,
            limit,
        })
    }

    async fn cards(&self) -> Result<CardList, ClientError> {
        self.enter("cards")?;
        let ledger = lock(&self.ledger);
        let me = ledger.me()?;
        let cards = ledger
            .cards
            .values()
            .filter(|(owner, card)| *owner == me && card.is_active)
            .map(|(_, card)| card.clone())
            .collect();
        Ok(CardList { cards })
    }

    async fn friends(&self) -> Result<FriendList, ClientError> {
        self.enter("friends")?;
        let ledger = lock(&self.ledger);
        let me = ledger.me()?;
        let friends = ledger
            .friends
            .get(&me)
            .into_iter()
            .flatten()
            .filter_map(|id| ledger.summary(*id))
            .collect();
        Ok(FriendList { friends })
    }

    async fn search_users(&self, query: &str) -> Result<UserList, ClientError> {
        self.enter("search_users")?;
        let ledger = lock(&self.ledger);
        let me = ledger.me()?;
        let needle = query.to_lowercase();
        let users = ledger
            .users
            .values()
            .filter(|u| u.data.id != me)
            .filter(|u| {
                u.data.name.to_lowercase().contains(&needle)
                    || u.data.email.to_lowercase().contains(&needle)
            })
            .filter_map(|u| ledger.summary(u.data.id))
            .collect();
        Ok(UserList { users })
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.enter("health")?;
        Ok(HealthStatus {
            status: "ok".to_string(),
        })
    }

    async fn send_money(
        &self,
        req: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<Transaction, ClientError> {
        self.enter("send_money")?;
        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        if let Some(tx) = self.replayed(&ledger, idempotency_key) {
            return Ok(tx);
        }

        if req.amount == 0 {
            return Err(bad_request("Amount must be greater than 0"));
        }
        if req.receiver_id == me {
            return Err(bad_request("Cannot send money to yourself"));
        }
        if ledger.user_mut(me)?.data.balance < req.amount {
            return Err(bad_request("Insufficient balance"));
        }
        ledger
            .user_mut(req.receiver_id)
            .map_err(|_| not_found("Receiver not found"))?
            .data
            .balance += req.amount;
        ledger.user_mut(me)?.data.balance -= req.amount;

        let tx = ledger.record(
            me,
            req.receiver_id,
            req.amount,
            req.description.clone().unwrap_or_default(),
        );
        ledger.seen_keys.insert(idempotency_key.to_string(), tx.id);
        Ok(tx)
    }

    async fn add_balance(
        &self,
        req: &AddBalanceRequest,
        idempotency_key: &str,
    ) -> Result<AddBalanceResponse, ClientError> {
        self.enter("add_balance")?;
        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        if self.replayed(&ledger, idempotency_key).is_some() {
            let new_balance = ledger.user_mut(me)?.data.balance;
            return Ok(AddBalanceResponse {
                message: None,
                new_balance,
            });
        }
        if req.amount == 0 {
            return Err(bad_request("Amount must be greater than 0"));
        }

        let user = ledger.user_mut(me)?;
        user.data.balance += req.amount;
        let new_balance = user.data.balance;
        let tx = ledger.record(me, me, req.amount, req.description.clone().unwrap_or_default());
        ledger.seen_keys.insert(idempotency_key.to_string(), tx.id);

        Ok(AddBalanceResponse {
            message: Some("Balance added successfully".to_string()),
            new_balance,
        })
    }

    async fn add_money_with_card(
        &self,
        req: &CardTopUpRequest,
        idempotency_key: &str,
    ) -> Result<CardTopUpResponse, ClientError> {
        self.enter("add_money_with_card")?;
        let me = lock(&self.ledger).me()?;
        {
            let ledger = lock(&self.ledger);
            if let Some(tx) = self.replayed(&ledger, idempotency_key) {
                let new_balance = ledger.users.get(&me).map_or(0, |u| u.data.balance);
                return Ok(CardTopUpResponse {
                    message: "Money added successfully".to_string(),
                    amount: tx.amount,
                    fee: service_card_fee(tx.amount),
                    new_balance,
                    transaction_id: tx.id,
                });
            }
        }

        if req.amount == 0 {
            return Err(bad_request("Amount must be greater than 0"));
        }
        if req.amount > MAX_CARD_TOP_UP {
            return Err(bad_request("Amount cannot exceed 1000 per transaction"));
        }

        let card_id = match (&req.card_id, &req.card_data) {
            (_, Some(details)) => self.add_card(details).await?.id,
            (Some(id), None) => {
                let ledger = lock(&self.ledger);
                match ledger.cards.get(id) {
                    Some((owner, card)) if *owner == me && card.is_active => *id,
                    _ => return Err(not_found("Card not found or inactive")),
                }
            }
            (None, None) => {
                return Err(bad_request("Either card_id or card_data must be provided"));
            }
        };

        let mut ledger = lock(&self.ledger);
        let user = ledger.user_mut(me)?;
        user.data.balance += req.amount;
        let new_balance = user.data.balance;
        let tx = ledger.record(
            me,
            me,
            req.amount,
            format!("Added money via card: {}", req.description),
        );
        ledger.seen_keys.insert(idempotency_key.to_string(), tx.id);
        if let Some((_, card)) = ledger.cards.get_mut(&card_id) {
            card.last_used_at = Some(Utc::now().to_rfc3339());
        }

        Ok(CardTopUpResponse {
            message: "Money added successfully".to_string(),
            amount: req.amount,
            fee: service_card_fee(req.amount),
            new_balance,
            transaction_id: tx.id,
        })
    }

    async fn add_card(&self, card: &CardDetails) -> Result<StoredCard, ClientError> {
        self.enter("add_card")?;
        card.check()?;
        let card_type = detect_card_type(&card.card_number)
            .ok_or_else(|| bad_request("Unsupported card type"))?;

        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        ledger.next_card_id += 1;
        let id = ledger.next_card_id;
        let stored = StoredCard {
            id,
            masked_number: mask_card_number(&card.card_number),
            card_type,
            holder_name: card.holder_name.clone(),
            expiry_month: card.expiry_month.clone(),
            expiry_year: card.expiry_year.clone(),
            is_active: true,
            created_at: Some(Utc::now().to_rfc3339()),
            last_used_at: None,
        };
        ledger.cards.insert(id, (me, stored.clone()));
        Ok(stored)
    }

    async fn delete_card(&self, card_id: CardId) -> Result<MessageResponse, ClientError> {
        self.enter("delete_card")?;
        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        match ledger.cards.get_mut(&card_id) {
            Some((owner, card)) if *owner == me && card.is_active => {
                card.is_active = false;
                Ok(MessageResponse {
                    message: "Card deleted successfully".to_string(),
                })
            }
            _ => Err(not_found("Card not found")),
        }
    }

    async fn add_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError> {
        self.enter("add_friend")?;
        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        if friend_id == me {
            return Err(bad_request("Cannot add yourself as a friend"));
        }
        if !ledger.users.contains_key(&friend_id) {
            return Err(not_found("User not found"));
        }
        ledger.friends.entry(me).or_default().insert(friend_id);
        ledger.friends.entry(friend_id).or_default().insert(me);
        Ok(MessageResponse {
            message: "Friend added successfully".to_string(),
        })
    }

    async fn remove_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError> {
        self.enter("remove_friend")?;
        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        let removed = ledger
            .friends
            .get_mut(&me)
            .is_some_and(|f| f.remove(&friend_id));
        if !removed {
            return Err(not_found("Friend not found"));
        }
        if let Some(theirs) = ledger.friends.get_mut(&friend_id) {
            theirs.remove(&me);
        }
        Ok(MessageResponse {
            message: "Friend removed successfully".to_string(),
        })
    }

    async fn update_currency(
        &self,
        currency: Currency,
    ) -> Result<CurrencyUpdateResponse, ClientError> {
        self.enter("update_currency")?;
        let mut ledger = lock(&self.ledger);
        let me = ledger.me()?;
        ledger.user_mut(me)?.data.currency = currency;
        Ok(CurrencyUpdateResponse {
            message: "Currency updated successfully".to_string(),
            currency,
        })
    }
}
