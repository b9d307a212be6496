use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("tmux is not available: {0}")]
    TmuxUnavailable(String),

    #[error("tmux {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Session {0} is closed")]
    Closed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
