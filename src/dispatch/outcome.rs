//! Dispatch outcomes and screen classification

use thiserror::Error;

/// Marker the wallet prints in front of the transaction ids of a sent transfer
pub const TX_IDS_MARKER: &str = "tx ids:";

const SENDING_MARKER: &str = "Sending";

/// Why a transfer was given up on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    #[error("Error sending transfer command")]
    CommandRejected,

    #[error("Error entering wallet password")]
    WalletPasswordRejected,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Insufficient funds after {attempts} attempts")]
    InsufficientFunds { attempts: u32 },

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Network error")]
    NetworkError,

    /// First error line the wallet printed
    #[error("{0}")]
    WalletError(String),

    #[error("Unknown error")]
    Unknown,
}

impl FatalReason {
    /// Whether every remaining transfer of the batch must be abandoned too
    pub fn is_global(&self) -> bool {
        matches!(self, FatalReason::InsufficientFunds { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            FatalReason::CommandRejected => "COMMAND_REJECTED",
            FatalReason::WalletPasswordRejected => "WALLET_PASSWORD_REJECTED",
            FatalReason::AuthenticationFailed => "AUTHENTICATION_FAILED",
            FatalReason::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            FatalReason::InvalidAddress => "INVALID_ADDRESS",
            FatalReason::NetworkError => "NETWORK_ERROR",
            FatalReason::WalletError(_) => "WALLET_ERROR",
            FatalReason::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success {
        raw_output: String,
        tx_id: Option<String>,
    },
    /// Worth re-running the whole send dialogue
    Recoverable { reason: String },
    Fatal { reason: FatalReason },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }

    pub fn fatal(reason: FatalReason) -> Self {
        DispatchOutcome::Fatal { reason }
    }
}

/// Classify the final screen of a send dialogue.
///
/// Checks run in a fixed priority order; the first hit decides:
/// 1. `Sending` together with `tx ids:` is a success
/// 2. not enough / insufficient funds is recoverable
/// 3. invalid address or network error is fatal
/// 4. any other line mentioning `error` is fatal, carrying that line
/// 5. anything else is fatal and unknown
pub fn classify(snapshot: &str) -> DispatchOutcome {
    if snapshot.contains(SENDING_MARKER) && snapshot.contains(TX_IDS_MARKER) {
        return DispatchOutcome::Success {
            raw_output: snapshot.to_string(),
            tx_id: extract_tx_id(snapshot),
        };
    }

    let lower = snapshot.to_lowercase();
    if lower.contains("not enough funds") || lower.contains("insufficient funds") {
        return DispatchOutcome::Recoverable {
            reason: "Insufficient funds".to_string(),
        };
    }
    if lower.contains("invalid address") {
        return DispatchOutcome::fatal(FatalReason::InvalidAddress);
    }
    if lower.contains("network error") {
        return DispatchOutcome::fatal(FatalReason::NetworkError);
    }

    match snapshot
        .lines()
        .find(|line| line.to_lowercase().contains("error"))
    {
        Some(line) => DispatchOutcome::fatal(FatalReason::WalletError(line.trim().to_string())),
        None => DispatchOutcome::fatal(FatalReason::Unknown),
    }
}

/// Whether [`classify`] has something specific to say about this screen
pub fn has_dispatch_signal(snapshot: &str) -> bool {
    !matches!(
        classify(snapshot),
        DispatchOutcome::Fatal {
            reason: FatalReason::Unknown
        }
    )
}

/// Transaction id from the last `tx ids:` line.
///
/// The id follows the marker on the same line; when the wallet wraps it onto
/// the next line, the first non-empty line after the marker is used.
pub fn extract_tx_id(snapshot: &str) -> Option<String> {
    let lines: Vec<&str> = snapshot.lines().collect();
    let idx = lines.iter().rposition(|line| line.contains(TX_IDS_MARKER))?;

    let (_, after) = lines[idx].rsplit_once(TX_IDS_MARKER)?;
    let inline = after.trim();
    if !inline.is_empty() {
        return Some(inline.to_string());
    }

    lines[idx + 1..]
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
