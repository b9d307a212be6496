use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::core_types::{Amount, Transfer};

/// Final disposition of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    /// Verified on the ledger
    Confirmed { tx_id: Option<String> },
    /// Dispatched, but not verified; goes to the recovery file
    Pending { reason: String },
    Failed { reason: String },
}

impl TransferResult {
    pub fn label(&self) -> &'static str {
        match self {
            TransferResult::Confirmed { .. } => "confirmed",
            TransferResult::Pending { .. } => "pending",
            TransferResult::Failed { .. } => "failed",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TransferResult::Pending { .. })
    }
}

impl fmt::Display for TransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferResult::Confirmed { tx_id: Some(tx) } => write!(f, "confirmed (TX ID: {})", tx),
            TransferResult::Confirmed { tx_id: None } => write!(f, "confirmed"),
            TransferResult::Pending { reason } => write!(f, "pending: {}", reason),
            TransferResult::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTotals {
    pub confirmed: usize,
    pub pending: usize,
    pub failed: usize,
    /// Sum of the amounts the wallet reported as sent
    pub spent: Amount,
}

impl BatchTotals {
    pub fn count(&mut self, result: &TransferResult) {
        match result {
            TransferResult::Confirmed { .. } => self.confirmed += 1,
            TransferResult::Pending { .. } => self.pending += 1,
            TransferResult::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.confirmed + self.pending + self.failed
    }
}

/// Everything a batch run produced. Holds exactly one result per input
/// transfer, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub results: Vec<(Transfer, TransferResult)>,
    pub totals: BatchTotals,
    /// `Transfer #n: reason`, one per failure
    pub errors: Vec<String>,
    /// Why the batch stopped early, if it did
    pub aborted: Option<String>,
    pub recovery_file: Option<PathBuf>,
}

impl BatchReport {
    pub(crate) fn record(&mut self, transfer: &Transfer, result: TransferResult) {
        self.totals.count(&result);
        self.results.push((transfer.clone(), result));
    }

    pub fn pending_transfers(&self) -> Vec<Transfer> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_pending())
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn log_summary(&self, unit_symbol: &str) {
        let t = &self.totals;
        info!(
            confirmed = t.confirmed,
            pending = t.pending,
            failed = t.failed,
            "Transfer summary: {} confirmed, {} pending, {} failed",
            t.confirmed, t.pending, t.failed
        );
        info!("Amount dispatched: {} {}", t.spent, unit_symbol);

        if let Some(reason) = &self.aborted {
            warn!("Batch aborted: {}", reason);
        }
        if !self.errors.is_empty() {
            info!("Details of encountered errors:");
            for e in &self.errors {
                info!("  - {}", e);
            }
        }
        if let Some(path) = &self.recovery_file {
            info!(
                "{} unconfirmed transfers saved to {} for a later run",
                t.pending,
                path.display()
            );
        }
    }
}
