//! Batch Coordinator
//!
//! Runs the transfer list sequentially: dispatch, then confirm, then record.
//! A global failure (insufficient funds) stops the batch; everything not yet
//! attempted is recorded as failed so the report still covers every input.

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::report::{BatchReport, TransferResult};
use crate::config::ConfirmationConfig;
use crate::core_types::Transfer;
use crate::dispatch::{DispatchOutcome, TransferDispatcher};
use crate::ledger::{ConfirmationPoller, ExpectedPayment};
use crate::recovery::RecoveryWriter;
use crate::session::{SessionDriver, TextOracle};

pub struct BatchCoordinator {
    dispatcher: TransferDispatcher,
    /// `None` when no ledger is available; dispatched transfers stay pending
    poller: Option<ConfirmationPoller>,
    confirmation: ConfirmationConfig,
    recovery: RecoveryWriter,
    unit_symbol: String,
}

impl BatchCoordinator {
    pub fn new(
        dispatcher: TransferDispatcher,
        poller: Option<ConfirmationPoller>,
        confirmation: ConfirmationConfig,
        recovery: RecoveryWriter,
        unit_symbol: &str,
    ) -> Self {
        Self {
            dispatcher,
            poller,
            confirmation,
            recovery,
            unit_symbol: unit_symbol.to_string(),
        }
    }

    pub async fn run<O: TextOracle>(
        &self,
        driver: &mut SessionDriver<O>,
        transfers: &[Transfer],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let total = transfers.len();

        for (i, transfer) in transfers.iter().enumerate() {
            info!(
                "[{}/{}] Sending {} {} to {}",
                i + 1,
                total,
                transfer.raw_amount,
                self.unit_symbol,
                transfer.address
            );

            let dispatched_at = Utc::now().timestamp_millis();
            match self.dispatcher.dispatch(driver, transfer).await {
                Ok(DispatchOutcome::Success { tx_id, .. }) => {
                    report.totals.spent += transfer.amount;
                    let result = self.confirm(transfer, tx_id, dispatched_at).await;
                    info!("{} {} -> {}: {}", transfer.raw_amount, self.unit_symbol, transfer.address, result);
                    report.record(transfer, result);
                }
                Ok(DispatchOutcome::Recoverable { reason }) => {
                    self.fail(&mut report, i, transfer, reason);
                }
                Ok(DispatchOutcome::Fatal { reason }) => {
                    self.fail(&mut report, i, transfer, reason.to_string());
                    if reason.is_global() {
                        error!("Transfer failed: {} - stopping transfers", reason);
                        report.aborted = Some(reason.to_string());
                        break;
                    }
                }
                Err(e) => {
                    let reason = format!("Wallet session lost: {}", e);
                    self.fail(&mut report, i, transfer, reason.clone());
                    report.aborted = Some(reason);
                    break;
                }
            }
        }

        if let Some(reason) = report.aborted.clone() {
            for transfer in &transfers[report.results.len()..] {
                report.record(
                    transfer,
                    TransferResult::Failed {
                        reason: format!("not attempted: batch aborted ({})", reason),
                    },
                );
            }
        }

        let pending = report.pending_transfers();
        match self.recovery.write(&pending) {
            Ok(path) => report.recovery_file = path,
            Err(e) => {
                error!(error = %e, "Failed to write recovery file");
                report
                    .errors
                    .push(format!("Recovery file not written: {}", e));
            }
        }

        report
    }

    async fn confirm(
        &self,
        transfer: &Transfer,
        tx_id: Option<String>,
        dispatched_at: i64,
    ) -> TransferResult {
        let poller = match &self.poller {
            Some(poller) if self.confirmation.enabled => poller,
            _ => {
                return TransferResult::Pending {
                    reason: "confirmation disabled".to_string(),
                };
            }
        };

        sleep(self.confirmation.settle_delay()).await;

        let deadline = self.confirmation.deadline();
        let skew_ms = i64::try_from(self.confirmation.clock_skew().as_millis()).unwrap_or(i64::MAX);
        let payment = ExpectedPayment::new(&transfer.address, transfer.amount)
            .with_tx_id(tx_id.as_deref())
            .not_before(dispatched_at.saturating_sub(skew_ms));
        let poll = poller
            .poll_payment(&payment, deadline, self.confirmation.base_interval())
            .await;

        if poll.confirmed {
            TransferResult::Confirmed {
                tx_id: tx_id.or(poll.tx_id),
            }
        } else {
            warn!(
                address = %transfer.address,
                rounds = poll.rounds,
                "Transfer not confirmed within {:?}", deadline
            );
            TransferResult::Pending {
                reason: format!("not confirmed within {:?}", deadline),
            }
        }
    }

    fn fail(&self, report: &mut BatchReport, idx: usize, transfer: &Transfer, reason: String) {
        error!(
            "Transfer failed: {} {} -> {} - {}",
            transfer.raw_amount, self.unit_symbol, transfer.address, reason
        );
        report.errors.push(format!("Transfer #{}: {}", idx + 1, reason));
        report.record(transfer, TransferResult::Failed { reason });
    }
}
