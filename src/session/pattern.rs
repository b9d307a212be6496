//! Pattern Matcher
//!
//! Decides from a screen snapshot whether the wallet CLI reached the state we
//! are waiting for.
//!
//! ## Detection order
//!
//! 1. **Expected prompt** present → `Matched`
//! 2. **Fatal marker** present (bad password) → `Fatal`
//! 3. **Alternate** present, i.e. a later state that can only be reached
//!    through the expected one → `Superseded`
//! 4. otherwise → `NoMatch`, keep polling
//!
//! The alternate table is part of the session protocol. A missing entry shows
//! up as a spurious timeout when the CLI redraws faster than we poll.

/// Prompts and banners printed by the wallet CLI
pub mod prompts {
    pub const CLI_READY: &str = "type 'help' for list of commands";
    pub const NETWORK_SET: &str = "Setting network id to:";
    pub const CONNECTED: &str = "Connected to Kaspa node";
    pub const WALLET_PASSWORD: &str = "Enter wallet password:";
    pub const PAYMENT_PASSWORD: &str = "Enter payment password:";
    pub const WALLET_OPENED: &str = "Your wallet hint is:";
    pub const SEND_AMOUNT: &str = "Send - Amount:";
    pub const EXIT: &str = "bye!";
}

/// `(expected, superseded_by)`: seeing the second while waiting for the first
/// means the first step already went through.
pub const ALTERNATES: &[(&str, &str)] = &[
    (prompts::WALLET_PASSWORD, prompts::PAYMENT_PASSWORD),
    (prompts::WALLET_PASSWORD, prompts::SEND_AMOUNT),
    (prompts::PAYMENT_PASSWORD, prompts::SEND_AMOUNT),
];

/// Authentication failures. Matched case-insensitively; stop waiting, but as a
/// failure.
pub const FATAL_MARKERS: &[&str] = &["unable to decrypt", "invalid password"];

/// Prompts after which the CLI needs a moment before it accepts keystrokes
const PASSWORD_PROMPTS: &[&str] = &[prompts::WALLET_PASSWORD, prompts::PAYMENT_PASSWORD];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    Superseded(&'static str),
    Fatal(&'static str),
    NoMatch,
}

impl MatchOutcome {
    /// Whether waiting for the expected state is over with a good result
    pub fn is_reached(&self) -> bool {
        matches!(self, MatchOutcome::Matched | MatchOutcome::Superseded(_))
    }
}

pub struct PatternMatcher;

impl PatternMatcher {
    pub fn evaluate(snapshot: &str, expected: &str) -> MatchOutcome {
        if snapshot.contains(expected) {
            return MatchOutcome::Matched;
        }

        let lowered = snapshot.to_lowercase();
        if let Some(marker) = FATAL_MARKERS.iter().find(|m| lowered.contains(*m)) {
            return MatchOutcome::Fatal(*marker);
        }

        ALTERNATES
            .iter()
            .find(|(exp, alt)| *exp == expected && snapshot.contains(alt))
            .map(|(_, alt)| MatchOutcome::Superseded(*alt))
            .unwrap_or(MatchOutcome::NoMatch)
    }

    /// Expected state reached, directly or through an alternate
    pub fn matches(snapshot: &str, expected: &str) -> bool {
        Self::evaluate(snapshot, expected).is_reached()
    }

    pub fn is_password_prompt(pattern: &str) -> bool {
        PASSWORD_PROMPTS.contains(&pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_match() {
        let screen = "$ open\nEnter wallet password:";
        assert_eq!(
            PatternMatcher::evaluate(screen, prompts::WALLET_PASSWORD),
            MatchOutcome::Matched
        );
    }

    #[test]
    fn test_payment_prompt_supersedes_wallet_prompt() {
        let screen = "Enter payment password:";
        assert_eq!(
            PatternMatcher::evaluate(screen, prompts::WALLET_PASSWORD),
            MatchOutcome::Superseded(prompts::PAYMENT_PASSWORD)
        );
        assert!(PatternMatcher::matches(screen, prompts::WALLET_PASSWORD));
    }

    #[test]
    fn test_amount_banner_supersedes_both_password_prompts() {
        let screen = "Send - Amount: 5 KAS  Fees: 0.00002036 KAS";
        assert!(PatternMatcher::matches(screen, prompts::WALLET_PASSWORD));
        assert!(PatternMatcher::matches(screen, prompts::PAYMENT_PASSWORD));
    }

    #[test]
    fn test_alternates_do_not_leak_to_other_prompts() {
        // The amount banner says nothing about whether the node is connected.
        let screen = "Send - Amount: 5 KAS";
        assert_eq!(
            PatternMatcher::evaluate(screen, prompts::CONNECTED),
            MatchOutcome::NoMatch
        );
        // A wallet prompt never stands in for the payment prompt.
        assert!(!PatternMatcher::matches(
            "Enter wallet password:",
            prompts::PAYMENT_PASSWORD
        ));
    }

    #[test]
    fn test_fatal_marker_is_failure_not_match() {
        let screen = "Enter wallet password:\nError: Unable to decrypt wallet";
        let outcome = PatternMatcher::evaluate(screen, prompts::PAYMENT_PASSWORD);
        assert_eq!(outcome, MatchOutcome::Fatal("unable to decrypt"));
        assert!(!outcome.is_reached());
    }

    #[test]
    fn test_expected_wins_over_stale_fatal_marker() {
        let screen = "unable to decrypt\nEnter wallet password:";
        assert_eq!(
            PatternMatcher::evaluate(screen, prompts::WALLET_PASSWORD),
            MatchOutcome::Matched
        );
    }

    #[test]
    fn test_password_prompts() {
        assert!(PatternMatcher::is_password_prompt(prompts::WALLET_PASSWORD));
        assert!(PatternMatcher::is_password_prompt(prompts::PAYMENT_PASSWORD));
        assert!(!PatternMatcher::is_password_prompt(prompts::SEND_AMOUNT));
    }
}
