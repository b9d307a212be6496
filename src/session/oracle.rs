use async_trait::async_trait;

use super::error::SessionError;

/// Named keystrokes sent separately from literal text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
}

impl Key {
    /// tmux key name
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Enter => "Enter",
        }
    }
}

/// Keystrokes in, screen text out.
///
/// The wallet CLI has no structured API; this is everything the engine can
/// do with it. All dialogue knowledge lives in `PatternMatcher`, so an
/// implementation only moves bytes.
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Session identifier, for logs
    fn name(&self) -> &str;

    /// Type `text` literally, without a trailing Enter
    async fn send_literal(&mut self, text: &str) -> Result<(), SessionError>;

    async fn send_key(&mut self, key: Key) -> Result<(), SessionError>;

    /// Full capture of what is currently on screen
    async fn snapshot(&self) -> Result<String, SessionError>;

    /// Wipe the screen and scrollback so the next snapshot only holds new output
    async fn clear(&mut self) -> Result<(), SessionError>;

    /// Terminate the subordinate program and release the channel
    async fn close(&mut self) -> Result<(), SessionError>;

    fn is_closed(&self) -> bool;
}
