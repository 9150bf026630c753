//! Money-movement flows
//!
//! Local input state for the send and add-money dialogs. Each flow
//! instance allows at most one submission in flight.

pub mod send;
pub mod state;
pub mod top_up;

pub use send::SendFlow;
pub use state::TopUpStep;
pub use top_up::{CardChoice, TopUpFlow};
