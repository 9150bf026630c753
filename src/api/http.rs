//! HTTP implementation of [`WalletApi`]
//!
//! Every request carries the bearer token of the shared [`SessionStore`].
//! A 401 on an authenticated call triggers one `POST /auth/refresh` and one
//! replay of the original request with the same idempotency key. If the
//! refresh or the replay is rejected the session is cleared and the caller
//! gets [`ClientError::SessionExpired`].
//!
//! The refresh endpoint authenticates with the `refresh_token` cookie set at
//! login, not the bearer token. The client keeps a cookie jar and mirrors
//! that cookie into the session store so a persisted session can still
//! refresh after a restart.
//!
//! Error bodies come either as JSON (`{"error": ..}` / `{"message": ..}`) or
//! as plain text; both end up in [`ClientError::Api`].

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{SessionStore, WalletApi};
use crate::card::CardDetails;
use crate::config::ApiConfig;
use crate::currency::Currency;
use crate::error::ClientError;
use crate::models::{
    AddBalanceRequest, AddBalanceResponse, AddFriendRequest, ApiErrorBody, AuthResponse,
    BalanceResponse, CardId, CardList, CardTopUpRequest, CardTopUpResponse,
    CurrencyUpdateRequest, CurrencyUpdateResponse, FriendList, HealthStatus, LoginRequest,
    MessageResponse, SignupRequest, StoredCard, Transaction, TransactionPage, TransferRequest,
    UserData, UserId, UserList,
};

/// Header carrying the per-submission idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Cookie the refresh endpoint reads
pub const REFRESH_COOKIE: &str = "refresh_token";

pub mod paths {
    pub const LOGIN: &str = "/auth/email/login";
    pub const SIGNUP: &str = "/auth/email/signup";
    pub const REFRESH: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";
    pub const HEALTH: &str = "/health";
    pub const CURRENT_USER: &str = "/api/user/me";
    pub const USER_CURRENCY: &str = "/api/user/currency";
    pub const BALANCE: &str = "/api/wallet/balance";
    pub const SEND: &str = "/api/transactions/send";
    pub const HISTORY: &str = "/api/transactions/history";
    pub const CARDS: &str = "/api/cards";
    pub const CARD_TOP_UP: &str = "/api/cards/add-money";
    pub const USER_SEARCH: &str = "/api/users/search";
    pub const FRIENDS: &str = "/api/friends";
    pub const ADD_FRIEND: &str = "/api/friends/add";
}

/// One logical call, kept around so it can be replayed after a refresh
struct RequestSpec<'a> {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
    idempotency_key: Option<&'a str>,
    authenticated: bool,
}

impl<'a> RequestSpec<'a> {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            idempotency_key: None,
            authenticated: true,
        }
    }

    fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    fn idempotent(mut self, key: &'a str) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

pub struct HttpWalletApi {
    base_url: String,
    client: reqwest::Client,
    cookies: Arc<Jar>,
    refresh_url: Url,
    session: Arc<SessionStore>,
}

impl HttpWalletApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let session = match &config.token_file {
            Some(path) => SessionStore::with_file(path),
            None => SessionStore::in_memory(),
        };
        Self::with_session(config, Arc::new(session))
    }

    pub fn with_session(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let refresh_url = Url::parse(&format!("{}{}", base_url, paths::REFRESH)).map_err(|e| {
            ClientError::Network(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        let cookies = Arc::new(Jar::default());
        if let Some(cookie) = session.refresh_cookie() {
            cookies.add_cookie_str(&format!("{}; Path=/auth", cookie), &refresh_url);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .cookie_provider(cookies.clone())
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            cookies,
            refresh_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_once(&self, spec: &RequestSpec<'_>) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .client
            .request(spec.method.clone(), self.url(&spec.path));

        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = spec.idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key);
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    async fn execute<T: DeserializeOwned>(&self, spec: RequestSpec<'_>) -> Result<T, ClientError> {
        if spec.authenticated && !self.session.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }

        let resp = self.send_once(&spec).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || !spec.authenticated {
            return decode(&spec, resp).await;
        }

        debug!(path = %spec.path, "[api] 401, refreshing token");
        if let Err(e) = self.refresh().await {
            warn!(path = %spec.path, error = %e, "[api] token refresh failed, clearing session");
            self.session.clear();
            return Err(ClientError::SessionExpired);
        }

        let resp = self.send_once(&spec).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %spec.path, "[api] rejected after refresh, clearing session");
            self.session.clear();
            return Err(ClientError::SessionExpired);
        }
        decode(&spec, resp).await
    }

    async fn refresh(&self) -> Result<(), ClientError> {
        let spec = RequestSpec::post(paths::REFRESH).anonymous();
        let resp = self.send_once(&spec).await?;
        let auth: AuthResponse = decode(&spec, resp).await?;
        self.session.set(auth.access_token);
        self.remember_refresh_cookie();
        Ok(())
    }

    async fn authenticate(&self, spec: RequestSpec<'_>) -> Result<AuthResponse, ClientError> {
        let auth: AuthResponse = self.execute(spec.anonymous()).await?;
        self.session.set(auth.access_token.clone());
        self.remember_refresh_cookie();
        Ok(auth)
    }

    /// Copy the jar's refresh cookie into the session store
    fn remember_refresh_cookie(&self) {
        let header = self.cookies.cookies(&self.refresh_url);
        let pair = header
            .as_ref()
            .and_then(|h| h.to_str().ok())
            .and_then(|h| refresh_cookie_pair(h).map(str::to_string));
        match pair {
            Some(pair) => self.session.set_refresh_cookie(pair),
            None => debug!("[api] no refresh cookie issued"),
        }
    }
}

async fn decode<T: DeserializeOwned>(
    spec: &RequestSpec<'_>,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    let body = resp.bytes().await?;

    if status.is_success() {
        return Ok(serde_json::from_slice(&body)?);
    }

    let err = api_error(status, &body);
    error!(
        method = %spec.method,
        path = %spec.path,
        status = status.as_u16(),
        error = %err,
        "[api] request failed"
    );
    Err(err)
}

/// `refresh_token=<value>` out of a `Cookie` header value
fn refresh_cookie_pair(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(name, value)| name == REFRESH_COOKIE && !value.is_empty())
        })
}

/// Build an API error from a non-2xx reply, JSON body first, then plain text
fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message)
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl WalletApi for HttpWalletApi {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let auth = self.authenticate(RequestSpec::post(paths::LOGIN).json(req)?).await?;
        info!(user = %req.user, "[api] logged in");
        Ok(auth)
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError> {
        let auth = self.authenticate(RequestSpec::post(paths::SIGNUP).json(req)?).await?;
        info!(user = %req.user, "[api] signed up");
        Ok(auth)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .execute::<MessageResponse>(RequestSpec::post(paths::LOGOUT).anonymous())
            .await;
        self.session.clear();
        result.map(|_| ())
    }

    fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    async fn current_user(&self) -> Result<UserData, ClientError> {
        self.execute(RequestSpec::get(paths::CURRENT_USER)).await
    }

    async fn balance(&self) -> Result<BalanceResponse, ClientError> {
        self.execute(RequestSpec::get(paths::BALANCE)).await
    }

    async fn transaction_history(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<TransactionPage, ClientError> {
        self.execute(
            RequestSpec::get(paths::HISTORY)
                .query("page", page)
                .query("limit", limit),
        )
        .await
    }

    async fn cards(&self) -> Result<CardList, ClientError> {
        self.execute(RequestSpec::get(paths::CARDS)).await
    }

    async fn friends(&self) -> Result<FriendList, ClientError> {
        self.execute(RequestSpec::get(paths::FRIENDS)).await
    }

    async fn search_users(&self, query: &str) -> Result<UserList, ClientError> {
        self.execute(RequestSpec::get(paths::USER_SEARCH).query("q", query))
            .await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.execute(RequestSpec::get(paths::HEALTH).anonymous())
            .await
    }

    async fn send_money(
        &self,
        req: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<Transaction, ClientError> {
        self.execute(
            RequestSpec::post(paths::SEND)
                .json(req)?
                .idempotent(idempotency_key),
        )
        .await
    }

    async fn add_balance(
        &self,
        req: &AddBalanceRequest,
        idempotency_key: &str,
    ) -> Result<AddBalanceResponse, ClientError> {
        self.execute(
            RequestSpec::post(paths::BALANCE)
                .json(req)?
                .idempotent(idempotency_key),
        )
        .await
    }

    async fn add_money_with_card(
        &self,
        req: &CardTopUpRequest,
        idempotency_key: &str,
    ) -> Result<CardTopUpResponse, ClientError> {
        self.execute(
            RequestSpec::post(paths::CARD_TOP_UP)
                .json(req)?
                .idempotent(idempotency_key),
        )
        .await
    }

    async fn add_card(&self, card: &CardDetails) -> Result<StoredCard, ClientError> {
        self.execute(RequestSpec::post(paths::CARDS).json(card)?)
            .await
    }

    async fn delete_card(&self, card_id: CardId) -> Result<MessageResponse, ClientError> {
        self.execute(RequestSpec::new(
            Method::DELETE,
            format!("{}/{}", paths::CARDS, card_id),
        ))
        .await
    }

    async fn add_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError> {
        self.execute(RequestSpec::post(paths::ADD_FRIEND).json(&AddFriendRequest { friend_id })?)
            .await
    }

    async fn remove_friend(&self, friend_id: UserId) -> Result<MessageResponse, ClientError> {
        self.execute(RequestSpec::new(
            Method::DELETE,
            format!("{}/{}", paths::FRIENDS, friend_id),
        ))
        .await
    }

    async fn update_currency(
        &self,
        currency: Currency,
    ) -> Result<CurrencyUpdateResponse, ClientError> {
        self.execute(
            RequestSpec::new(Method::PUT, paths::USER_CURRENCY)
                .json(&CurrencyUpdateRequest { currency })?,
        )
        .await
    }
}
