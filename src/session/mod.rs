//! Wallet Session Module
//!
//! Drives the interactive wallet CLI the way a person at a keyboard would:
//! type a line, look at the screen, decide what state the program is in.
//!
//! - [`pattern`] - which screen text means which dialogue state
//! - [`oracle`] - the `TextOracle` capability (keys in, screen text out)
//! - [`tmux`] - `TextOracle` over a detached tmux session
//! - [`driver`] - send + poll-until-pattern loop, audit logging, teardown
//! - [`mock`] - in-memory wallet terminal for tests (feature `mock-wallet`)

pub mod driver;
pub mod error;
#[cfg(any(test, feature = "mock-wallet"))]
pub mod mock;
pub mod oracle;
pub mod pattern;
pub mod tmux;

// Re-exports for convenience
pub use driver::{AUDIT_TARGET, REDACTED, SessionDriver, WaitOutcome};
pub use error::SessionError;
#[cfg(any(test, feature = "mock-wallet"))]
pub use mock::{MockTerminal, SendBehaviour};
pub use oracle::{Key, TextOracle};
pub use pattern::{MatchOutcome, PatternMatcher, prompts};
pub use tmux::TmuxSession;
