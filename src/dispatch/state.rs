//! Dispatch FSM State Definitions

use std::fmt;

/// Per-attempt send dialogue states
///
/// ```text
/// INIT → SEND_SUBMITTED → WALLET_PASSWORD_PROMPTED → PAYMENT_PASSWORD_PROMPTED → OBSERVED
///                                                                                  ↓
///                                                   SUCCESS | RECOVERABLE_FAILURE | FATAL_FAILURE
/// ```
///
/// Any step before `OBSERVED` may jump straight to `FATAL_FAILURE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchState {
    /// Screen cleared, nothing typed yet
    Init,

    /// `send <address> <amount>` typed, waiting for the wallet password prompt
    SendSubmitted,

    /// Wallet password typed, waiting for the payment password prompt
    WalletPasswordPrompted,

    /// Payment password typed, waiting for the amount banner
    PaymentPasswordPrompted,

    /// Final screen captured, about to classify
    Observed,

    /// Terminal: wallet reported the transaction as sent
    Success,

    /// Terminal for this attempt: worth retrying the whole dialogue
    RecoverableFailure,

    /// Terminal: not retried
    FatalFailure,
}

impl DispatchState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Success
                | DispatchState::RecoverableFailure
                | DispatchState::FatalFailure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Init => "INIT",
            DispatchState::SendSubmitted => "SEND_SUBMITTED",
            DispatchState::WalletPasswordPrompted => "WALLET_PASSWORD_PROMPTED",
            DispatchState::PaymentPasswordPrompted => "PAYMENT_PASSWORD_PROMPTED",
            DispatchState::Observed => "OBSERVED",
            DispatchState::Success => "SUCCESS",
            DispatchState::RecoverableFailure => "RECOVERABLE_FAILURE",
            DispatchState::FatalFailure => "FATAL_FAILURE",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
