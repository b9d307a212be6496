//! Transfer Dispatcher
//!
//! Drives one `send` dialogue through the wallet CLI and turns the final
//! screen into a [`DispatchOutcome`]. Recoverable outcomes re-run the whole
//! dialogue up to `max_attempts` times.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::outcome::{DispatchOutcome, FatalReason, classify, has_dispatch_signal};
use super::state::DispatchState;
use crate::config::DispatchConfig;
use crate::core_types::Transfer;
use crate::credentials::Credentials;
use crate::session::{SessionDriver, SessionError, TextOracle, WaitOutcome, prompts};

pub struct TransferDispatcher {
    config: DispatchConfig,
    credentials: Credentials,
    command_timeout: Duration,
}

impl TransferDispatcher {
    pub fn new(config: DispatchConfig, credentials: Credentials, command_timeout: Duration) -> Self {
        Self {
            config,
            credentials,
            command_timeout,
        }
    }

    /// Send one transfer, retrying recoverable failures, then cool down.
    ///
    /// Only session transport failures are errors; every wallet-side result
    /// is a [`DispatchOutcome`].
    pub async fn dispatch<O: TextOracle>(
        &self,
        driver: &mut SessionDriver<O>,
        transfer: &Transfer,
    ) -> Result<DispatchOutcome, SessionError> {
        let outcome = self.dispatch_with_retry(driver, transfer).await;

        let cooldown = self.config.cooldown();
        debug!(?cooldown, "Cooling down after dispatch");
        sleep(cooldown).await;

        outcome
    }

    async fn dispatch_with_retry<O: TextOracle>(
        &self,
        driver: &mut SessionDriver<O>,
        transfer: &Transfer,
    ) -> Result<DispatchOutcome, SessionError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(%transfer, attempt, max_attempts, "Dispatch attempt");

            match self.attempt(driver, transfer).await? {
                DispatchOutcome::Recoverable { reason } => {
                    if attempt >= max_attempts {
                        error!(
                            %transfer,
                            attempts = attempt,
                            "Transfer failed: {} - giving up", reason
                        );
                        return Ok(DispatchOutcome::fatal(FatalReason::InsufficientFunds {
                            attempts: attempt,
                        }));
                    }
                    let delay = self.config.retry_delay();
                    warn!(
                        %transfer,
                        attempt,
                        max_attempts,
                        "{}, retrying in {:?}", reason, delay
                    );
                    sleep(delay).await;
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// One full pass through the send dialogue
    async fn attempt<O: TextOracle>(
        &self,
        driver: &mut SessionDriver<O>,
        transfer: &Transfer,
    ) -> Result<DispatchOutcome, SessionError> {
        let mut state = DispatchState::Init;
        let timeout = self.command_timeout;

        // Banners from earlier transfers must not satisfy this attempt.
        driver.clear().await?;

        let command = format!("send {} {}", transfer.address, transfer.raw_amount);
        let sent = driver
            .execute(&command, prompts::WALLET_PASSWORD, timeout, false)
            .await?;
        transition(&mut state, DispatchState::SendSubmitted);

        let mut reached = match sent {
            WaitOutcome::Matched { .. } => prompts::WALLET_PASSWORD,
            WaitOutcome::Superseded { by, .. } => by,
            WaitOutcome::Fatal { .. } => {
                return Ok(fail(&mut state, FatalReason::AuthenticationFailed));
            }
            WaitOutcome::TimedOut { snapshot } => {
                if has_dispatch_signal(&snapshot) {
                    return Ok(observe(&mut state, &snapshot));
                }
                return Ok(fail(&mut state, FatalReason::CommandRejected));
            }
        };

        if reached == prompts::WALLET_PASSWORD {
            let after_wallet = driver
                .execute(
                    self.credentials.wallet_password(),
                    prompts::PAYMENT_PASSWORD,
                    timeout,
                    true,
                )
                .await?;
            transition(&mut state, DispatchState::WalletPasswordPrompted);

            reached = match after_wallet {
                WaitOutcome::Matched { .. } => prompts::PAYMENT_PASSWORD,
                WaitOutcome::Superseded { by, .. } => by,
                WaitOutcome::Fatal { .. } => {
                    return Ok(fail(&mut state, FatalReason::AuthenticationFailed));
                }
                WaitOutcome::TimedOut { snapshot } => {
                    if has_dispatch_signal(&snapshot) {
                        return Ok(observe(&mut state, &snapshot));
                    }
                    return Ok(fail(&mut state, FatalReason::WalletPasswordRejected));
                }
            };
        }

        if reached == prompts::PAYMENT_PASSWORD {
            let after_payment = driver
                .execute(
                    self.credentials.payment_password(),
                    prompts::SEND_AMOUNT,
                    timeout,
                    true,
                )
                .await?;
            transition(&mut state, DispatchState::PaymentPasswordPrompted);

            match after_payment {
                WaitOutcome::Fatal { .. } => {
                    return Ok(fail(&mut state, FatalReason::AuthenticationFailed));
                }
                WaitOutcome::TimedOut { .. } => {
                    warn!(%transfer, "No amount confirmation on screen, checking output anyway")
                }
                _ => {}
            }
        }

        let snapshot = driver.capture().await?;
        Ok(observe(&mut state, &snapshot))
    }
}

fn transition(state: &mut DispatchState, next: DispatchState) {
    debug!(from = %state, to = %next, "Dispatch state transition");
    *state = next;
}

fn fail(state: &mut DispatchState, reason: FatalReason) -> DispatchOutcome {
    transition(state, DispatchState::FatalFailure);
    warn!(code = reason.code(), "Transfer failed: {}", reason);
    DispatchOutcome::fatal(reason)
}

fn observe(state: &mut DispatchState, snapshot: &str) -> DispatchOutcome {
    transition(state, DispatchState::Observed);
    let outcome = classify(snapshot);
    let terminal = match &outcome {
        DispatchOutcome::Success { tx_id, .. } => {
            info!(tx_id = tx_id.as_deref().unwrap_or("unknown"), "Transfer sent");
            DispatchState::Success
        }
        DispatchOutcome::Recoverable { .. } => DispatchState::RecoverableFailure,
        DispatchOutcome::Fatal { reason } => {
            warn!(code = reason.code(), "Transfer failed: {}", reason);
            DispatchState::FatalFailure
        }
    };
    transition(state, terminal);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::{MockTerminal, SendBehaviour};
    use rust_decimal::Decimal;
    use tokio::time::Instant;

    const ADDR: &str = "kaspa:qqtestaddress";

    async fn ready(mock: MockTerminal) -> SessionDriver<MockTerminal> {
        let mut driver = SessionDriver::new(mock, SessionConfig::default());
        driver.send("cargo run", false).await.unwrap();
        driver
    }

    fn dispatcher(wallet: &str, payment: &str) -> TransferDispatcher {
        TransferDispatcher::new(
            DispatchConfig::default(),
            Credentials::new(wallet, payment),
            Duration::from_secs(30),
        )
    }

    fn transfer(raw: &str) -> Transfer {
        Transfer::parse(ADDR, raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_extracts_tx_id() {
        let mock = MockTerminal::new("w", "p").with_balance(Decimal::from(20));
        let mut driver = ready(mock).await;

        let outcome = dispatcher("w", "p")
            .dispatch(&mut driver, &transfer("5.0"))
            .await
            .unwrap();

        match outcome {
            DispatchOutcome::Success { tx_id, raw_output } => {
                assert_eq!(tx_id, Some(format!("{:064x}", 1)));
                assert!(raw_output.contains("Sending 5.0 KAS"));
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(
            driver.oracle().delivered(),
            &[(ADDR.to_string(), "5.0".to_string())]
        );
        assert!(driver.oracle().clear_count() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_cap_is_exactly_max_attempts() {
        let mock = MockTerminal::new("w", "p").with_balance(Decimal::from(1));
        let mut driver = ready(mock).await;

        let start = Instant::now();
        let outcome = dispatcher("w", "p")
            .dispatch(&mut driver, &transfer("5"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::fatal(FatalReason::InsufficientFunds { attempts: 3 })
        );
        assert_eq!(driver.oracle().send_commands(), 3);
        assert!(driver.oracle().delivered().is_empty());
        // Two retry delays plus the cool-down, at least.
        assert!(start.elapsed() >= Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_shortage() {
        let mock = MockTerminal::new("w", "p")
            .with_balance(Decimal::from(20))
            .queue(SendBehaviour::InsufficientFunds);
        let mut driver = ready(mock).await;

        let outcome = dispatcher("w", "p")
            .dispatch(&mut driver, &transfer("2"))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(driver.oracle().send_commands(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_address_is_not_retried() {
        let mock = MockTerminal::new("w", "p")
            .with_balance(Decimal::from(20))
            .fail_address(ADDR, SendBehaviour::InvalidAddress);
        let mut driver = ready(mock).await;

        let outcome = dispatcher("w", "p")
            .dispatch(&mut driver, &transfer("1"))
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::fatal(FatalReason::InvalidAddress));
        assert_eq!(driver.oracle().send_commands(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_wallet_password_is_authentication_failure() {
        let mock = MockTerminal::new("w", "p").with_balance(Decimal::from(20));
        let mut driver = ready(mock).await;

        let outcome = dispatcher("wrong", "p")
            .dispatch(&mut driver, &transfer("1"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::fatal(FatalReason::AuthenticationFailed)
        );
        assert!(!outcome_is_global(&outcome));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_without_payment_prompt() {
        let mock = MockTerminal::new("w", "p")
            .with_balance(Decimal::from(20))
            .without_payment_prompt();
        let mut driver = ready(mock).await;

        let outcome = dispatcher("w", "p")
            .dispatch(&mut driver, &transfer("3"))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert!(!driver.oracle().literal_sends().iter().any(|s| s == "p"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_banner_does_not_count_as_success() {
        let mock = MockTerminal::new("w", "p")
            .with_balance(Decimal::from(20))
            .queue(SendBehaviour::Succeed)
            .queue(SendBehaviour::Silent);
        let mut driver = ready(mock).await;
        let d = dispatcher("w", "p");

        let first = d.dispatch(&mut driver, &transfer("1")).await.unwrap();
        let second = d.dispatch(&mut driver, &transfer("2")).await.unwrap();

        assert!(first.is_success());
        assert_eq!(second, DispatchOutcome::fatal(FatalReason::Unknown));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_is_an_error() {
        let mut driver = ready(MockTerminal::new("w", "p")).await;
        driver.shutdown().await;

        let result = dispatcher("w", "p").dispatch(&mut driver, &transfer("1")).await;

        assert!(matches!(result, Err(SessionError::Closed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_and_wallet_errors_are_fatal() {
        let mock = MockTerminal::new("w", "p")
            .with_balance(Decimal::from(20))
            .queue(SendBehaviour::NetworkError)
            .queue(SendBehaviour::Output("Error: UTXO index not ready".to_string()));
        let mut driver = ready(mock).await;
        let d = dispatcher("w", "p");

        let first = d.dispatch(&mut driver, &transfer("1")).await.unwrap();
        let second = d.dispatch(&mut driver, &transfer("1")).await.unwrap();

        assert_eq!(first, DispatchOutcome::fatal(FatalReason::NetworkError));
        assert_eq!(
            second,
            DispatchOutcome::fatal(FatalReason::WalletError(
                "Error: UTXO index not ready".to_string()
            ))
        );
        assert_eq!(driver.oracle().send_commands(), 2);
    }

    fn outcome_is_global(outcome: &DispatchOutcome) -> bool {
        matches!(outcome, DispatchOutcome::Fatal { reason } if reason.is_global())
    }
}
