//! In-memory ledger for tests and dry runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::client::{LedgerClient, LedgerOutput, LedgerTransaction};
use super::error::LedgerError;

struct Scheduled {
    address: String,
    transaction: LedgerTransaction,
    /// Hidden from this many queries of `address` before showing up
    hidden_rounds: usize,
}

#[derive(Default)]
struct MockLedgerState {
    scheduled: Vec<Scheduled>,
    queries: HashMap<String, usize>,
    failures: usize,
    tx_counter: u64,
}

/// Ledger whose transactions are scripted ahead of time
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockLedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accepted transaction paying `sompi` to `address`, visible from the
    /// `(rounds + 1)`-th query of that address on
    pub fn deliver_after(&self, address: &str, sompi: u64, rounds: usize) {
        self.schedule(address, sompi, rounds, true);
    }

    /// A transaction the network has not accepted
    pub fn deliver_unaccepted(&self, address: &str, sompi: u64) {
        self.schedule(address, sompi, 0, false);
    }

    /// An accepted transaction with a fixed id and block time, visible at once
    pub fn deliver_with(&self, address: &str, sompi: u64, transaction_id: &str, block_time: Option<i64>) {
        let mut state = self.lock();
        state.scheduled.push(Scheduled {
            address: address.to_string(),
            transaction: LedgerTransaction {
                transaction_id: Some(transaction_id.to_string()),
                is_accepted: true,
                block_time,
                outputs: vec![LedgerOutput {
                    script_public_key_address: address.to_string(),
                    amount: sompi,
                }],
            },
            hidden_rounds: 0,
        });
    }

    /// The next `n` queries fail at the transport level
    pub fn fail_next(&self, n: usize) {
        self.lock().failures += n;
    }

    /// Number of queries made for `address`
    pub fn queries(&self, address: &str) -> usize {
        self.lock().queries.get(address).copied().unwrap_or(0)
    }

    fn schedule(&self, address: &str, sompi: u64, rounds: usize, accepted: bool) {
        let mut state = self.lock();
        state.tx_counter += 1;
        let transaction = LedgerTransaction {
            transaction_id: Some(format!("{:064x}", state.tx_counter)),
            is_accepted: accepted,
            block_time: None,
            outputs: vec![LedgerOutput {
                script_public_key_address: address.to_string(),
                amount: sompi,
            }],
        };
        state.scheduled.push(Scheduled {
            address: address.to_string(),
            transaction,
            hidden_rounds: rounds,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockLedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn recent_transactions(
        &self,
        address: &str,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let mut state = self.lock();
        let seen = {
            let count = state.queries.entry(address.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if state.failures > 0 {
            state.failures -= 1;
            return Err(LedgerError::Transport("connection reset".to_string()));
        }

        Ok(state
            .scheduled
            .iter()
            .filter(|s| s.address == address && seen > s.hidden_rounds)
            .map(|s| s.transaction.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivery_shows_up_after_hidden_rounds() {
        let ledger = MockLedger::new();
        ledger.deliver_after("kaspa:qa", 100, 2);

        assert!(ledger.recent_transactions("kaspa:qa").await.unwrap().is_empty());
        assert!(ledger.recent_transactions("kaspa:qa").await.unwrap().is_empty());
        assert_eq!(ledger.recent_transactions("kaspa:qa").await.unwrap().len(), 1);
        assert!(ledger.recent_transactions("kaspa:qb").await.unwrap().is_empty());
        assert_eq!(ledger.queries("kaspa:qa"), 3);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let ledger = MockLedger::new();
        ledger.fail_next(1);

        assert!(ledger.recent_transactions("kaspa:qa").await.is_err());
        assert!(ledger.recent_transactions("kaspa:qa").await.is_ok());
    }
}
