//! Session Driver
//!
//! Sends input to the wallet CLI and polls the screen until a recognized
//! state shows up.
//!
//! # Logging
//!
//! Every `execute` logs a display-safe copy of the command (secrets become
//! [`REDACTED`]) and writes the full post-command screen to the
//! [`AUDIT_TARGET`] target, whatever the outcome.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::oracle::{Key, TextOracle};
use super::pattern::{MatchOutcome, PatternMatcher, prompts};
use crate::config::SessionConfig;

/// tracing target of the detailed screen audit log
pub const AUDIT_TARGET: &str = "audit";

/// Stand-in for secrets in every log line
pub const REDACTED: &str = "[PASSWORD]";

/// Result of waiting for a pattern. A timeout is an outcome, not an error;
/// the caller decides whether it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Matched {
        snapshot: String,
    },
    /// A later dialogue state showed up instead of the expected one
    Superseded {
        snapshot: String,
        by: &'static str,
    },
    /// Authentication failure marker on screen
    Fatal {
        snapshot: String,
        marker: &'static str,
    },
    TimedOut {
        snapshot: String,
    },
}

impl WaitOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(
            self,
            WaitOutcome::Matched { .. } | WaitOutcome::Superseded { .. }
        )
    }

    /// Last screen seen
    pub fn snapshot(&self) -> &str {
        match self {
            WaitOutcome::Matched { snapshot }
            | WaitOutcome::Superseded { snapshot, .. }
            | WaitOutcome::Fatal { snapshot, .. }
            | WaitOutcome::TimedOut { snapshot } => snapshot,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WaitOutcome::Matched { .. } => "matched",
            WaitOutcome::Superseded { .. } => "superseded",
            WaitOutcome::Fatal { .. } => "fatal",
            WaitOutcome::TimedOut { .. } => "timed_out",
        }
    }
}

/// Exclusive owner of the wallet session
pub struct SessionDriver<O: TextOracle> {
    oracle: O,
    config: SessionConfig,
}

impl<O: TextOracle> SessionDriver<O> {
    pub fn new(oracle: O, config: SessionConfig) -> Self {
        Self { oracle, config }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Type one line and press Enter.
    ///
    /// Secrets go one character per keystroke: the CLI's line editor would
    /// otherwise read some punctuation runs as control sequences.
    pub async fn send(&mut self, text: &str, secret: bool) -> Result<(), SessionError> {
        if secret {
            let mut buf = [0u8; 4];
            for ch in text.chars() {
                self.oracle.send_literal(ch.encode_utf8(&mut buf)).await?;
                let delay = self.config.secret_key_delay();
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        } else {
            self.oracle.send_literal(text).await?;
        }
        self.oracle.send_key(Key::Enter).await
    }

    /// Poll with the configured interval until `expected` is reached or
    /// `timeout` elapses.
    pub async fn await_pattern(
        &mut self,
        expected: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, SessionError> {
        let poll_interval = self.config.poll_interval();
        self.await_pattern_with(expected, timeout, poll_interval)
            .await
    }

    pub async fn await_pattern_with(
        &mut self,
        expected: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<WaitOutcome, SessionError> {
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            let snapshot = self.oracle.snapshot().await?;

            match PatternMatcher::evaluate(&snapshot, expected) {
                MatchOutcome::Matched => {
                    debug!(expected, polls, "Pattern matched");
                    self.settle_after(expected).await;
                    return Ok(WaitOutcome::Matched { snapshot });
                }
                MatchOutcome::Superseded(by) => {
                    debug!(expected, superseded_by = by, polls, "Pattern superseded");
                    self.settle_after(by).await;
                    return Ok(WaitOutcome::Superseded { snapshot, by });
                }
                MatchOutcome::Fatal(marker) => {
                    warn!(expected, marker, "Authentication failure on screen");
                    return Ok(WaitOutcome::Fatal { snapshot, marker });
                }
                MatchOutcome::NoMatch => {}
            }

            if start.elapsed() >= timeout {
                warn!(
                    "Pattern '{}' not found within {:?} timeout ({} polls)",
                    expected, timeout, polls
                );
                return Ok(WaitOutcome::TimedOut { snapshot });
            }

            sleep(poll_interval).await;
        }
    }

    async fn settle_after(&self, prompt: &str) {
        if PatternMatcher::is_password_prompt(prompt) {
            sleep(self.config.password_settle()).await;
        }
    }

    /// Send a command, wait for `expected`, audit the resulting screen.
    pub async fn execute(
        &mut self,
        text: &str,
        expected: &str,
        timeout: Duration,
        secret: bool,
    ) -> Result<WaitOutcome, SessionError> {
        let shown = if secret { REDACTED } else { text };
        info!("Executing command: {}", shown);

        self.send(text, secret).await?;
        let outcome = self.await_pattern(expected, timeout).await?;

        info!(
            target: AUDIT_TARGET,
            session = %self.oracle.name(),
            command = %shown,
            expected,
            outcome = outcome.label(),
            "State after command:\n{}",
            outcome.snapshot()
        );

        Ok(outcome)
    }

    /// Current screen
    pub async fn capture(&self) -> Result<String, SessionError> {
        self.oracle.snapshot().await
    }

    pub async fn clear(&mut self) -> Result<(), SessionError> {
        self.oracle.clear().await
    }

    pub fn is_closed(&self) -> bool {
        self.oracle.is_closed()
    }

    /// Ask the CLI to exit, then kill the session. Safe to call twice.
    pub async fn shutdown(&mut self) {
        if self.oracle.is_closed() {
            return;
        }

        info!("Closing wallet CLI...");
        let timeout = self.config.exit_timeout();
        match self.execute("exit", prompts::EXIT, timeout, false).await {
            Ok(outcome) if !outcome.is_reached() => {
                warn!("Wallet CLI did not confirm exit, killing session anyway")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to send exit to wallet CLI"),
        }

        info!(session = %self.oracle.name(), "Closing session...");
        if let Err(e) = self.oracle.close().await {
            warn!(error = %e, "Failed to close session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockTerminal;

    fn driver(mock: MockTerminal) -> SessionDriver<MockTerminal> {
        SessionDriver::new(mock, SessionConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternate_returns_immediately() {
        let mut mock = MockTerminal::new("pw", "pw");
        mock.show("Enter payment password:");
        let mut d = driver(mock);

        let start = Instant::now();
        let outcome = d
            .await_pattern(prompts::WALLET_PASSWORD, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WaitOutcome::Superseded {
                snapshot: "Enter payment password:".to_string(),
                by: prompts::PAYMENT_PASSWORD,
            }
        );
        // Only the password settle delay, no polling rounds.
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(d.oracle().snapshot_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_prompt_matches_on_later_poll() {
        let mut d = driver(MockTerminal::new("pw", "pw").with_slow_startup(4));
        d.send("cargo run", false).await.unwrap();

        let start = Instant::now();
        let outcome = d
            .await_pattern(prompts::CLI_READY, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(matches!(outcome, WaitOutcome::Matched { .. }));
        assert_eq!(d.oracle().snapshot_count(), 5);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_last_snapshot() {
        let mut mock = MockTerminal::new("pw", "pw");
        mock.show("still thinking");
        let mut d = driver(mock);

        let start = Instant::now();
        let outcome = d
            .await_pattern(prompts::CONNECTED, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                snapshot: "still thinking".to_string()
            }
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed <= Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_marker_stops_waiting() {
        let mut mock = MockTerminal::new("pw", "pw");
        mock.show("Error: unable to decrypt wallet");
        let mut d = driver(mock);

        let outcome = d
            .await_pattern(prompts::WALLET_OPENED, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            WaitOutcome::Fatal {
                marker: "unable to decrypt",
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_secret_sent_per_character() {
        let mut d = driver(MockTerminal::new("pw", "pw"));

        d.send("p;w", true).await.unwrap();

        assert_eq!(d.oracle().literal_sends(), vec!["p", ";", "w"]);
        assert_eq!(d.oracle().enter_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_line_sent_whole() {
        let mut d = driver(MockTerminal::new("pw", "pw"));

        d.send("send kaspa:qabc 5.0", false).await.unwrap();

        assert_eq!(d.oracle().literal_sends(), vec!["send kaspa:qabc 5.0"]);
        assert_eq!(d.oracle().enter_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent() {
        let mut d = driver(MockTerminal::new("pw", "pw"));

        d.shutdown().await;
        d.shutdown().await;

        assert!(d.is_closed());
        assert_eq!(d.oracle().close_count(), 1);
    }
}
