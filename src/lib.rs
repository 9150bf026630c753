//! pocketpay - Peer-to-Peer Wallet Client Core
//!
//! Turns what a user types into validated, currency-converted, fee-quoted
//! requests against the wallet HTTP API, and keeps a local cache of server
//! snapshots consistent after every mutation.
//!
//! All amounts on the wire are integer USD minor units (cents). Display and
//! input happen in the user's currency and are converted at the edge.
//!
//! # Modules
//!
//! - [`currency`] - Static currency table (rate, symbol)
//! - [`money`] - Amount normalizer and minor-unit conversion
//! - [`fee`] - Card processing fee
//! - [`card`] - Card type detection and new-card form validation
//! - [`models`] - Wire types
//! - [`cache`] - Key-addressed query cache
//! - [`reconcile`] - Which cache scopes a mutation invalidates
//! - [`api`] - `WalletApi` boundary, HTTP client, session store
//! - [`flow`] - Send and add-money state machines
//! - [`wallet`] - Facade over API + cache
//! - [`pagination`] - History page arithmetic

// Leaf modules - no internal dependencies
pub mod currency;
pub mod money;
pub mod pagination;

pub mod card;
pub mod error;
pub mod fee;
pub mod models;

// Cache and reconciliation
pub mod cache;
pub mod reconcile;

// Remote boundary and orchestration
pub mod api;
pub mod flow;
pub mod wallet;

// Ambient
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use api::{HttpWalletApi, SessionStore, WalletApi};
pub use cache::{CacheScope, QueryCache, QueryKey};
pub use card::{CardDetails, CardError, CardType, NewCardForm};
pub use currency::Currency;
pub use error::{ClientError, ErrorKind};
pub use fee::FeeQuote;
pub use flow::{SendFlow, TopUpFlow, TopUpStep};
pub use models::{PaymentMethod, TopUpMethod, TopUpRequest, TransferRequest};
pub use money::{AmountInput, DisplayAmount, MoneyError};
pub use reconcile::Mutation;
pub use wallet::{TopUpOutcome, Wallet};
