//! tmux-backed `TextOracle`
//!
//! The wallet CLI runs inside a detached tmux session. Keys go in through
//! `send-keys`, the screen comes out through `capture-pane -p`.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::oracle::{Key, TextOracle};

/// A detached tmux session owned for the whole run.
///
/// Dropping a session that was never closed kills it synchronously, so a
/// panic mid-batch does not leave a wallet CLI with an open wallet behind.
pub struct TmuxSession {
    name: String,
    closed: bool,
}

impl TmuxSession {
    /// Check tmux is installed and start a new detached session
    pub async fn create(name: &str) -> Result<Self, SessionError> {
        let version = Command::new("tmux")
            .arg("-V")
            .output()
            .await
            .map_err(|e| SessionError::TmuxUnavailable(e.to_string()))?;
        if !version.status.success() {
            return Err(SessionError::TmuxUnavailable(
                String::from_utf8_lossy(&version.stderr).trim().to_string(),
            ));
        }
        info!(
            tmux_version = %String::from_utf8_lossy(&version.stdout).trim(),
            session = name,
            "Creating tmux session"
        );

        run_tmux(&["new-session", "-d", "-s", name]).await?;

        Ok(Self {
            name: name.to_string(),
            closed: false,
        })
    }

    /// `<prefix>_<unix-timestamp>`
    pub fn session_name(prefix: &str) -> String {
        format!("{}_{}", prefix, chrono::Utc::now().timestamp())
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

/// tmux splits commands on an argument ending in `;`, even with `-l`. It
/// turns a trailing `\;` back into `;`, so the backslash goes in front of the
/// final `;` whatever precedes it.
pub fn escape_literal(text: &str) -> String {
    match text.strip_suffix(';') {
        Some(head) => format!("{}\\;", head),
        None => text.to_string(),
    }
}

async fn run_tmux(args: &[&str]) -> Result<String, SessionError> {
    let output = Command::new("tmux").args(args).output().await?;
    if !output.status.success() {
        return Err(SessionError::CommandFailed {
            command: args.first().copied().unwrap_or_default().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl TextOracle for TmuxSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_literal(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let escaped = escape_literal(text);
        run_tmux(&["send-keys", "-t", &self.name, "-l", "--", &escaped]).await?;
        Ok(())
    }

    async fn send_key(&mut self, key: Key) -> Result<(), SessionError> {
        self.ensure_open()?;
        run_tmux(&["send-keys", "-t", &self.name, key.as_str()]).await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        run_tmux(&["capture-pane", "-p", "-t", &self.name]).await
    }

    async fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        run_tmux(&["send-keys", "-R", "-t", &self.name]).await?;
        run_tmux(&["clear-history", "-t", &self.name]).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!(session = %self.name, "Killing tmux session");
        run_tmux(&["kill-session", "-t", &self.name]).await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for TmuxSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(session = %self.name, "tmux session dropped while open, killing it");
        let _ = std::process::Command::new("tmux")
            .args(["kill-session", "-t", &self.name])
            .status();
    }
}
