//! Ledger confirmation
//!
//! - [`client`] - `LedgerClient` trait and the Kaspa REST implementation
//! - [`poller`] - polls until a payment shows up or a deadline passes

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock-wallet"))]
pub mod mock;
pub mod poller;

pub use client::{KaspaRestClient, LedgerClient, LedgerOutput, LedgerTransaction};
pub use error::LedgerError;
#[cfg(any(test, feature = "mock-wallet"))]
pub use mock::MockLedger;
pub use poller::{ConfirmationPoller, ExpectedPayment, PollReport, amount_matches};
