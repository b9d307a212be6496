//! Core types used throughout the system
//!
//! These are the values that flow from the redistribution list, through the
//! dispatcher and poller, into the batch report.

use rust_decimal::Decimal;
use std::fmt;

/// Display-unit amount (KAS / TKAS).
///
/// Always a `Decimal`, never `f64`: the confirmation tolerance band and the
/// batch totals are compared exactly.
pub type Amount = Decimal;

/// A single transfer from the validated redistribution list.
///
/// # Invariants:
/// - **Immutable**: created by the parser, consumed once by the coordinator
/// - `amount > 0`
/// - `raw_amount` is the exact text read from the input; it is what gets typed
///   into the wallet and what gets written back to a recovery file, so the
///   round-trip is byte-identical
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub address: String,
    pub amount: Amount,
    pub raw_amount: String,
}

impl Transfer {
    pub fn new(address: impl Into<String>, amount: Amount, raw_amount: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            amount,
            raw_amount: raw_amount.into(),
        }
    }

    /// Build a transfer from already-validated text.
    ///
    /// Returns `None` when `raw_amount` is not a positive decimal.
    pub fn parse(address: &str, raw_amount: &str) -> Option<Self> {
        let amount: Decimal = raw_amount.trim().parse().ok()?;
        if amount <= Decimal::ZERO {
            return None;
        }
        Some(Self::new(address, amount, raw_amount.trim()))
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.raw_amount, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_raw_text() {
        let t = Transfer::parse("kaspa:qabc", "5.0").unwrap();
        assert_eq!(t.raw_amount, "5.0");
        assert_eq!(t.amount, Decimal::new(50, 1));
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert!(Transfer::parse("kaspa:qabc", "0").is_none());
        assert!(Transfer::parse("kaspa:qabc", "-1.5").is_none());
        assert!(Transfer::parse("kaspa:qabc", "abc").is_none());
    }

    #[test]
    fn test_display() {
        let t = Transfer::parse("kaspa:qabc", "1.25").unwrap();
        assert_eq!(t.to_string(), "1.25 -> kaspa:qabc");
    }
}
