use thiserror::Error;

use crate::session::SessionError;

/// Errors that end a run.
///
/// Per-transfer problems never show up here; they are recorded as
/// `TransferResult::Failed`/`Pending` and the batch goes on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet not ready: {0}")]
    WalletNotReady(String),

    #[error("Unable to read wallet balance")]
    BalanceUnavailable,
}
