//! kaspa_batch - batch transfer dispatch through the Kaspa wallet CLI
//!
//! The wallet CLI has no API, so the engine types into it through a tmux
//! session and reads the screen back, then verifies each transfer on the
//! public ledger.
//!
//! # Modules
//!
//! - [`core_types`] - Transfer and amount types
//! - [`network`] - mainnet / testnet profiles
//! - [`session`] - tmux oracle, prompt matching, session driver
//! - [`balance`] - balance extraction from wallet screens
//! - [`dispatch`] - per-transfer send dialogue, retry, classification
//! - [`ledger`] - REST ledger client and confirmation poller
//! - [`batch`] - sequential batch coordinator and report
//! - [`recovery`] - recovery file for unconfirmed transfers
//! - [`redistribution`] - input list parsing and totals
//! - [`engine`] - full run lifecycle with guaranteed teardown

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod network;

// Wallet session and transfer pipeline
pub mod balance;
pub mod batch;
pub mod dispatch;
pub mod engine;
pub mod ledger;
pub mod recovery;
pub mod redistribution;
pub mod session;

// Convenient re-exports at crate root
pub use balance::BalanceExtractor;
pub use batch::{BatchCoordinator, BatchReport, BatchTotals, TransferResult};
pub use config::AppConfig;
pub use core_types::{Amount, Transfer};
pub use credentials::Credentials;
pub use dispatch::{DispatchOutcome, DispatchState, FatalReason, TransferDispatcher};
pub use engine::{Preflight, RunSummary, WalletEngine};
pub use error::EngineError;
pub use ledger::{
    ConfirmationPoller, ExpectedPayment, KaspaRestClient, LedgerClient, LedgerError, PollReport,
};
pub use network::{Network, NetworkProfile};
pub use recovery::RecoveryWriter;
pub use session::{PatternMatcher, SessionDriver, SessionError, TextOracle, TmuxSession};
