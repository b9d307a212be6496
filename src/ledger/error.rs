use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Transport failures, server errors and rate limiting are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport(_) => true,
            LedgerError::Status { status, .. } => *status >= 500 || *status == 429,
            LedgerError::Decode(_) | LedgerError::Config(_) => false,
        }
    }
}
