//! Confirmation Poller
//!
//! Watches the ledger until an accepted transaction pays the expected amount
//! to an address, or a deadline passes.
//!
//! ```text
//! query ──match──→ confirmed (transaction id credited)
//!   │ no match / transport failure
//!   ↓
//! sleep min(interval, remaining) ; interval = min(interval × 1.5, max_interval)
//!   │
//!   └─ deadline passed → not confirmed
//! ```
//!
//! A ledger transaction confirms at most one transfer per poller. When the
//! wallet printed a transaction id, a transaction carrying that id wins over
//! other payments of the same amount. Transactions whose block time is older
//! than the payment's `not_before` are history and never match.

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::client::{LedgerClient, LedgerTransaction};
use crate::config::ConfirmationConfig;
use crate::core_types::Amount;
use crate::network::NetworkProfile;

const BACKOFF_FACTOR: f64 = 1.5;

/// Result of one polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub confirmed: bool,
    pub tx_id: Option<String>,
    pub rounds: u32,
    /// Scheduled interval after each unsuccessful round. The sleep actually
    /// taken after the last one may be shorter, cut off by the deadline.
    pub intervals: Vec<Duration>,
    pub elapsed: Duration,
}

/// The payment one transfer should produce on the ledger
#[derive(Debug, Clone, Copy)]
pub struct ExpectedPayment<'a> {
    pub address: &'a str,
    pub amount: Amount,
    /// Transaction id the wallet printed for the send
    pub tx_id: Option<&'a str>,
    /// Earliest acceptable block time, milliseconds since the epoch
    pub not_before: Option<i64>,
}

impl<'a> ExpectedPayment<'a> {
    pub fn new(address: &'a str, amount: Amount) -> Self {
        Self {
            address,
            amount,
            tx_id: None,
            not_before: None,
        }
    }

    pub fn with_tx_id(mut self, tx_id: Option<&'a str>) -> Self {
        self.tx_id = tx_id;
        self
    }

    pub fn not_before(mut self, block_time_ms: i64) -> Self {
        self.not_before = Some(block_time_ms);
        self
    }
}

pub struct ConfirmationPoller {
    client: Arc<dyn LedgerClient>,
    profile: NetworkProfile,
    tolerance: Decimal,
    max_interval: Duration,
    /// Ledger transactions already matched to a transfer
    credited: Mutex<HashSet<String>>,
}

impl ConfirmationPoller {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        profile: &NetworkProfile,
        config: &ConfirmationConfig,
    ) -> Self {
        Self {
            client,
            profile: profile.clone(),
            tolerance: config.tolerance,
            max_interval: config.max_interval(),
            credited: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a payment of `expected` to `address` shows up before `deadline`
    pub async fn confirm(
        &self,
        address: &str,
        expected: Amount,
        deadline: Duration,
        base_interval: Duration,
    ) -> bool {
        self.poll(address, expected, deadline, base_interval)
            .await
            .confirmed
    }

    pub async fn poll(
        &self,
        address: &str,
        expected: Amount,
        deadline: Duration,
        base_interval: Duration,
    ) -> PollReport {
        self.poll_payment(&ExpectedPayment::new(address, expected), deadline, base_interval)
            .await
    }

    pub async fn poll_payment(
        &self,
        payment: &ExpectedPayment<'_>,
        deadline: Duration,
        base_interval: Duration,
    ) -> PollReport {
        let address = payment.address;
        let expected = payment.amount;
        let start = Instant::now();
        let mut interval = base_interval;
        let mut report = PollReport {
            confirmed: false,
            tx_id: None,
            rounds: 0,
            intervals: Vec::new(),
            elapsed: Duration::ZERO,
        };

        info!(address, %expected, tx_id = payment.tx_id, ?deadline, "Waiting for ledger confirmation");

        loop {
            report.rounds += 1;

            match self.client.recent_transactions(address).await {
                Ok(txs) => {
                    if let Some(tx) = self.find_payment(&txs, payment) {
                        if let Some(id) = &tx.transaction_id {
                            self.credited().insert(id.clone());
                        }
                        report.confirmed = true;
                        report.tx_id = tx.transaction_id.clone();
                        report.elapsed = start.elapsed();
                        info!(
                            address,
                            tx_id = report.tx_id.as_deref().unwrap_or("unknown"),
                            rounds = report.rounds,
                            "Transfer confirmed on ledger"
                        );
                        return report;
                    }
                    debug!(address, round = report.rounds, seen = txs.len(), "No matching payment yet");
                }
                Err(e) => {
                    warn!(address, round = report.rounds, error = %e, "Ledger unavailable, counting round as empty");
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                report.elapsed = elapsed;
                warn!(address, %expected, rounds = report.rounds, "Confirmation timed out after {:?}", elapsed);
                return report;
            }

            report.intervals.push(interval);
            sleep(interval.min(deadline - elapsed)).await;
            interval = next_interval(interval, self.max_interval);
        }
    }

    fn find_payment<'t>(
        &self,
        txs: &'t [LedgerTransaction],
        payment: &ExpectedPayment<'_>,
    ) -> Option<&'t LedgerTransaction> {
        let credited = self.credited();
        let candidates: Vec<&LedgerTransaction> = txs
            .iter()
            .filter(|tx| tx.is_accepted)
            .filter(|tx| {
                tx.transaction_id
                    .as_ref()
                    .is_none_or(|id| !credited.contains(id))
            })
            .filter(|tx| self.pays(tx, payment))
            .collect();

        if let Some(id) = payment.tx_id
            && let Some(tx) = candidates
                .iter()
                .find(|tx| tx.transaction_id.as_deref() == Some(id))
        {
            return Some(*tx);
        }

        candidates
            .into_iter()
            .find(|tx| match (payment.not_before, tx.block_time) {
                (Some(not_before), Some(block_time)) => block_time >= not_before,
                _ => true,
            })
    }

    fn pays(&self, tx: &LedgerTransaction, payment: &ExpectedPayment<'_>) -> bool {
        tx.outputs.iter().any(|out| {
            out.script_public_key_address == payment.address
                && amount_matches(
                    self.profile.to_display_units(out.amount),
                    payment.amount,
                    self.tolerance,
                )
        })
    }

    fn credited(&self) -> MutexGuard<'_, HashSet<String>> {
        self.credited.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `observed`, rounded to one decimal, lies within `expected ± tolerance`
pub fn amount_matches(observed: Decimal, expected: Decimal, tolerance: Decimal) -> bool {
    let rounded = observed.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    rounded >= expected - tolerance && rounded <= expected + tolerance
}

fn next_interval(current: Duration, max: Duration) -> Duration {
    current.mul_f64(BACKOFF_FACTOR).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use crate::network::{Network, SOMPI_PER_KAS};

    const ADDR: &str = "kaspa:qqrecipient";

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn poller(ledger: Arc<MockLedger>) -> ConfirmationPoller {
        ConfirmationPoller::new(
            ledger,
            &Network::Mainnet.profile(),
            &ConfirmationConfig::default(),
        )
    }

    #[test]
    fn test_tolerance_band() {
        let tol = dec("0.2");
        let expected = dec("10.0");
        assert!(amount_matches(dec("9.8"), expected, tol));
        assert!(amount_matches(dec("10.2"), expected, tol));
        assert!(amount_matches(dec("10"), expected, tol));
        assert!(!amount_matches(dec("9.7"), expected, tol));
        assert!(!amount_matches(dec("10.3"), expected, tol));
    }

    #[test]
    fn test_observed_amount_is_rounded_first() {
        let tol = dec("0.2");
        let expected = dec("10.0");
        assert!(amount_matches(dec("9.75"), expected, tol));
        assert!(!amount_matches(dec("9.74"), expected, tol));
        assert!(amount_matches(dec("10.24"), expected, tol));
        assert!(!amount_matches(dec("10.25"), expected, tol));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_on_first_round() {
        let ledger = Arc::new(MockLedger::new());
        ledger.deliver_after(ADDR, 10 * SOMPI_PER_KAS, 0);

        let report = poller(ledger)
            .poll(ADDR, dec("10"), Duration::from_secs(120), Duration::from_secs(5))
            .await;

        assert!(report.confirmed);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.tx_id, Some(format!("{:064x}", 1)));
        assert!(report.intervals.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_monotone_up_to_cap() {
        let ledger = Arc::new(MockLedger::new());
        let deadline = Duration::from_secs(120);

        let start = Instant::now();
        let report = poller(ledger)
            .poll(ADDR, dec("10"), deadline, Duration::from_secs(5))
            .await;

        assert!(!report.confirmed);
        let cap = Duration::from_secs(30);
        assert_eq!(report.intervals[0], Duration::from_secs(5));
        assert_eq!(report.intervals[1], Duration::from_millis(7500));
        assert!(report.intervals.windows(2).all(|w| w[0] <= w[1]));
        assert!(report.intervals.iter().all(|i| *i <= cap));
        assert_eq!(*report.intervals.last().unwrap(), cap);

        let elapsed = start.elapsed();
        assert!(elapsed >= deadline);
        assert!(elapsed <= deadline + cap);
        assert_eq!(report.elapsed, elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unaccepted_and_foreign_outputs_do_not_count() {
        let ledger = Arc::new(MockLedger::new());
        ledger.deliver_unaccepted(ADDR, 10 * SOMPI_PER_KAS);
        ledger.deliver_after("kaspa:qqsomeoneelse", 10 * SOMPI_PER_KAS, 0);

        let confirmed = poller(ledger)
            .confirm(ADDR, dec("10"), Duration::from_secs(20), Duration::from_secs(5))
            .await;

        assert!(!confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_counts_as_empty_round() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_next(2);
        ledger.deliver_after(ADDR, 10 * SOMPI_PER_KAS, 0);

        let report = poller(ledger.clone())
            .poll(ADDR, dec("10"), Duration::from_secs(120), Duration::from_secs(5))
            .await;

        assert!(report.confirmed);
        assert_eq!(report.rounds, 3);
        assert_eq!(ledger.queries(ADDR), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_delivery_within_deadline() {
        let ledger = Arc::new(MockLedger::new());
        ledger.deliver_after(ADDR, 25 * SOMPI_PER_KAS / 10, 3);

        let report = poller(ledger)
            .poll(ADDR, dec("2.5"), Duration::from_secs(120), Duration::from_secs(5))
            .await;

        assert!(report.confirmed);
        assert_eq!(report.rounds, 4);
        assert_eq!(report.intervals.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_transaction_confirms_one_transfer_only() {
        let ledger = Arc::new(MockLedger::new());
        ledger.deliver_after(ADDR, SOMPI_PER_KAS, 0);
        let poller = poller(ledger);

        let first = poller
            .poll(ADDR, dec("1"), Duration::from_secs(30), Duration::from_secs(5))
            .await;
        let second = poller
            .poll(ADDR, dec("1"), Duration::from_secs(30), Duration::from_secs(5))
            .await;

        assert!(first.confirmed);
        assert!(!second.confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_tx_id_preferred_over_same_amount() {
        let ledger = Arc::new(MockLedger::new());
        ledger.deliver_with(ADDR, SOMPI_PER_KAS, "aaaa", None);
        ledger.deliver_with(ADDR, SOMPI_PER_KAS, "bbbb", None);
        let poller = poller(ledger);

        let payment = ExpectedPayment::new(ADDR, dec("1")).with_tx_id(Some("bbbb"));
        let report = poller
            .poll_payment(&payment, Duration::from_secs(30), Duration::from_secs(5))
            .await;

        assert_eq!(report.tx_id.as_deref(), Some("bbbb"));

        let other = poller
            .poll(ADDR, dec("1"), Duration::from_secs(30), Duration::from_secs(5))
            .await;
        assert_eq!(other.tx_id.as_deref(), Some("aaaa"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_older_than_dispatch_is_history() {
        let ledger = Arc::new(MockLedger::new());
        let dispatched_at = 1_718_000_000_000;
        ledger.deliver_with(ADDR, SOMPI_PER_KAS, "old", Some(dispatched_at - 3_600_000));
        let poller = poller(ledger.clone());

        let payment = ExpectedPayment::new(ADDR, dec("1")).not_before(dispatched_at);
        let report = poller
            .poll_payment(&payment, Duration::from_secs(20), Duration::from_secs(5))
            .await;
        assert!(!report.confirmed);

        ledger.deliver_with(ADDR, SOMPI_PER_KAS, "new", Some(dispatched_at + 2_000));
        let report = poller
            .poll_payment(&payment, Duration::from_secs(20), Duration::from_secs(5))
            .await;
        assert_eq!(report.tx_id.as_deref(), Some("new"));
    }
}
