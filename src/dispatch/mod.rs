//! Transfer dispatch
//!
//! One `send` dialogue per transfer, modelled as a small FSM:
//!
//! - [`state`] - dialogue states
//! - [`outcome`] - outcome types and the single screen classifier
//! - [`dispatcher`] - drives the dialogue, retries, cool-down

pub mod dispatcher;
pub mod outcome;
pub mod state;

pub use dispatcher::TransferDispatcher;
pub use outcome::{DispatchOutcome, FatalReason, classify, extract_tx_id};
pub use state::DispatchState;
