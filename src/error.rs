//! Client Error Types
//!
//! Every failure is recoverable by the user: fix the input, top up, retry,
//! or log in again. [`ErrorKind`] groups the variants into those four
//! classes.

use thiserror::Error;

use crate::card::CardError;
use crate::money::MoneyError;

/// Coarse error class, decides how the caller surfaces the failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caught before any network call, shown inline
    InputRejected,
    /// Local balance pre-check failed, no call issued
    InsufficientBalance,
    /// Network or API failure, state kept for retry
    Transport,
    /// Credentials missing or rejected after a refresh attempt
    Authentication,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    // === Input Errors ===
    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyError),

    #[error("{0}")]
    Card(#[from] CardError),

    #[error("Select a recipient")]
    MissingRecipient,

    #[error("Select a payment method")]
    NoPaymentMethod,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid flow state: {0}")]
    InvalidState(String),

    #[error("A submission is already in flight")]
    SubmissionPending,

    // === Balance ===
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    // === Transport Errors ===
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    // === Authentication ===
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Session expired, please log in again")]
    SessionExpired,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Amount(_)
            | ClientError::Card(_)
            | ClientError::MissingRecipient
            | ClientError::NoPaymentMethod
            | ClientError::InvalidQuery(_)
            | ClientError::InvalidState(_)
            | ClientError::SubmissionPending => ErrorKind::InputRejected,
            ClientError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            ClientError::Api { .. } | ClientError::Network(_) | ClientError::Decode(_) => {
                ErrorKind::Transport
            }
            ClientError::NotAuthenticated | ClientError::SessionExpired => {
                ErrorKind::Authentication
            }
        }
    }

    /// Get the error code for logs and notifications
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Amount(_) => "INVALID_AMOUNT",
            ClientError::Card(_) => "INVALID_CARD",
            ClientError::MissingRecipient => "MISSING_RECIPIENT",
            ClientError::NoPaymentMethod => "NO_PAYMENT_METHOD",
            ClientError::InvalidQuery(_) => "INVALID_QUERY",
            ClientError::InvalidState(_) => "INVALID_STATE",
            ClientError::SubmissionPending => "SUBMISSION_PENDING",
            ClientError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ClientError::Api { .. } => "API_ERROR",
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::Decode(_) => "DECODE_ERROR",
            ClientError::NotAuthenticated => "NOT_AUTHENTICATED",
            ClientError::SessionExpired => "SESSION_EXPIRED",
        }
    }

    /// Transport failures may succeed on a plain retry
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// HTTP status of an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ClientError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ClientError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}
