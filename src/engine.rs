//! Wallet Engine - one run of the wallet CLI from launch to teardown
//!
//! The engine handles:
//! 1. Starting the CLI, selecting the network, connecting, opening the wallet
//! 2. Reading the balance and checking it against the batch
//! 3. Handing the session to the batch coordinator
//! 4. Reading the final balance and closing the session on every path

use tracing::{error, info, warn};

use crate::balance::BalanceExtractor;
use crate::batch::{BatchCoordinator, BatchReport};
use crate::config::{AppConfig, WalletConfig};
use crate::core_types::{Amount, Transfer};
use crate::credentials::Credentials;
use crate::error::EngineError;
use crate::network::NetworkProfile;
use crate::redistribution::{total_amount, total_with_fees};
use crate::session::{SessionDriver, SessionError, TextOracle, WaitOutcome, prompts};

/// Balance check shown to the operator before anything is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    pub transfer_count: usize,
    pub total: Amount,
    pub total_with_fees: Amount,
    pub balance: Amount,
}

impl Preflight {
    pub fn new(transfers: &[Transfer], balance: Amount, fee_per_transfer: Amount) -> Self {
        Self {
            transfer_count: transfers.len(),
            total: total_amount(transfers),
            total_with_fees: total_with_fees(transfers, fee_per_transfer),
            balance,
        }
    }

    pub fn sufficient(&self) -> bool {
        self.balance >= self.total_with_fees
    }

    /// Signed: negative means missing funds
    pub fn margin(&self) -> Amount {
        self.balance - self.total_with_fees
    }

    pub fn log(&self, unit_symbol: &str) {
        info!(
            "Found {} transfers to make for a total of {} {}",
            self.transfer_count, self.total, unit_symbol
        );
        info!("Estimated total with fees: {} {}", self.total_with_fees, unit_symbol);
        info!("Current balance: {} {}", self.balance, unit_symbol);
        if self.sufficient() {
            info!(
                "SUFFICIENT BALANCE! About {:.8} {} will remain after transfers.",
                self.margin(),
                unit_symbol
            );
        } else {
            warn!(
                "INSUFFICIENT BALANCE! Missing {:.8} {} to make all transfers.",
                -self.margin(),
                unit_symbol
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub preflight: Preflight,
    /// `None` when the operator declined
    pub report: Option<BatchReport>,
    pub final_balance: Option<Amount>,
}

impl RunSummary {
    pub fn cancelled(&self) -> bool {
        self.report.is_none()
    }

    /// Balance difference across the run, fees included
    pub fn spent(&self) -> Option<Amount> {
        self.final_balance.map(|b| self.preflight.balance - b)
    }
}

pub struct WalletEngine<O: TextOracle> {
    driver: SessionDriver<O>,
    profile: NetworkProfile,
    wallet: WalletConfig,
    credentials: Credentials,
    extractor: BalanceExtractor,
}

impl<O: TextOracle> WalletEngine<O> {
    pub fn new(
        oracle: O,
        profile: NetworkProfile,
        config: &AppConfig,
        credentials: Credentials,
    ) -> Self {
        let extractor = BalanceExtractor::new(&profile.unit_symbol);
        Self {
            driver: SessionDriver::new(oracle, config.session.clone()),
            profile,
            wallet: config.wallet.clone(),
            credentials,
            extractor,
        }
    }

    pub fn driver(&self) -> &SessionDriver<O> {
        &self.driver
    }

    pub fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    /// Launch the CLI and open the wallet; returns the initial balance
    pub async fn start(&mut self) -> Result<Amount, EngineError> {
        let session = self.driver.config().clone();

        info!("Starting wallet CLI...");
        let launch = self.wallet.launch_command.clone();
        self.step(&launch, prompts::CLI_READY, session.startup_timeout(), false)
            .await?;

        let activation = self.profile.activation_command.clone();
        self.step(&activation, prompts::NETWORK_SET, session.command_timeout(), false)
            .await?;

        let connect = self.profile.connect_command.clone();
        self.step(&connect, prompts::CONNECTED, session.command_timeout(), false)
            .await?;

        self.step("open", prompts::WALLET_PASSWORD, session.command_timeout(), false)
            .await?;
        let password = self.credentials.wallet_password().to_string();
        let opened = self
            .step(&password, prompts::WALLET_OPENED, session.command_timeout(), true)
            .await?;

        if let Some(balance) = self.extractor.extract(opened.snapshot()) {
            info!("Current balance: {} {}", balance, self.profile.unit_symbol);
            return Ok(balance);
        }
        self.read_balance()
            .await?
            .ok_or(EngineError::BalanceUnavailable)
    }

    /// Run one CLI step. Authentication failures end the run; a missing
    /// prompt is logged and the run goes on, the balance read is the gate.
    async fn step(
        &mut self,
        text: &str,
        expected: &str,
        timeout: std::time::Duration,
        secret: bool,
    ) -> Result<WaitOutcome, EngineError> {
        let outcome = self.driver.execute(text, expected, timeout, secret).await?;
        match &outcome {
            WaitOutcome::Fatal { marker, .. } => Err(EngineError::WalletNotReady(format!(
                "authentication failed while waiting for '{}' ({})",
                expected, marker
            ))),
            WaitOutcome::TimedOut { .. } => {
                warn!(expected, "Wallet CLI step did not complete, continuing");
                Ok(outcome)
            }
            _ => Ok(outcome),
        }
    }

    pub async fn read_balance(&mut self) -> Result<Option<Amount>, SessionError> {
        let timeout = self.driver.config().command_timeout();
        self.extractor
            .read_balance(
                &mut self.driver,
                &self.wallet.balance_command,
                &self.wallet.balance_detail_command,
                timeout,
            )
            .await
    }

    /// Start, check, ask, run the batch, read the final balance. The session
    /// is shut down afterwards whatever happened.
    pub async fn run<F>(
        &mut self,
        coordinator: &BatchCoordinator,
        transfers: &[Transfer],
        approve: F,
    ) -> Result<RunSummary, EngineError>
    where
        F: FnOnce(&Preflight) -> bool,
    {
        let result = self.run_inner(coordinator, transfers, approve).await;
        if let Err(e) = &result {
            error!(error = %e, "Run failed");
        }
        self.driver.shutdown().await;
        result
    }

    async fn run_inner<F>(
        &mut self,
        coordinator: &BatchCoordinator,
        transfers: &[Transfer],
        approve: F,
    ) -> Result<RunSummary, EngineError>
    where
        F: FnOnce(&Preflight) -> bool,
    {
        let balance = self.start().await?;
        let unit = self.profile.unit_symbol.clone();

        let preflight = Preflight::new(transfers, balance, self.wallet.fee_estimate);
        preflight.log(&unit);

        if !approve(&preflight) {
            info!("Operation cancelled by user.");
            return Ok(RunSummary {
                preflight,
                report: None,
                final_balance: None,
            });
        }

        let report = coordinator.run(&mut self.driver, transfers).await;
        report.log_summary(&unit);

        let final_balance = match self.read_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Unable to read final balance");
                None
            }
        };
        if let Some(final_balance) = final_balance {
            info!(
                "Final balance: {} {} (amount spent: {} {})",
                final_balance,
                unit,
                balance - final_balance,
                unit
            );
        }

        Ok(RunSummary {
            preflight,
            report: Some(report),
            final_balance,
        })
    }

    pub async fn shutdown(&mut self) {
        self.driver.shutdown().await;
    }
}
