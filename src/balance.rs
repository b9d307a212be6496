//! Balance extraction from wallet screens
//!
//! The CLI's balance layout is not a stable contract, so several shapes are
//! tried in a fixed order and the first one that parses wins:
//!
//! ```text
//! • 1,234.56 KAS          bullet-marked       (account list)
//! Mature: 1,234.56 KAS    colon-prefixed      (details)
//! Balance 1,234.56        labeled "balance"
//! (1,234.56 KAS)          parenthesized
//! 1,234.56 KAS            bare figure before the unit symbol
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core_types::Amount;
use crate::session::{SessionDriver, SessionError, TextOracle};

const FIGURE: &str = r"(\d[\d,]*(?:\.\d+)?)";

/// Ordered balance patterns for one unit symbol
pub struct BalanceExtractor {
    unit_symbol: String,
    patterns: Vec<(&'static str, Regex)>,
}

impl BalanceExtractor {
    pub fn new(unit_symbol: &str) -> Self {
        let sym = regex::escape(unit_symbol);
        let sources = [
            ("bullet", format!(r"•\s*{}\s*{}\b", FIGURE, sym)),
            ("colon", format!(r":\s*{}\s*{}\b", FIGURE, sym)),
            ("labeled", format!(r"(?i)balance\s*[:=]?\s*{}", FIGURE)),
            ("parenthesized", format!(r"\(\s*{}\s*{}\s*\)", FIGURE, sym)),
            ("bare", format!(r"(?:^|[^\w.,]){}\s*{}\b", FIGURE, sym)),
        ];

        // Every source is a fixed template around an escaped symbol.
        let patterns = sources
            .into_iter()
            .filter_map(|(name, src)| Regex::new(&src).ok().map(|re| (name, re)))
            .collect();

        Self {
            unit_symbol: unit_symbol.to_string(),
            patterns,
        }
    }

    /// First balance any pattern can parse, `None` if none can
    pub fn extract(&self, snapshot: &str) -> Option<Amount> {
        for (name, re) in &self.patterns {
            for caps in re.captures_iter(snapshot) {
                let Some(figure) = caps.get(1) else {
                    continue;
                };
                if let Some(value) = parse_figure(figure.as_str()) {
                    debug!(pattern = name, %value, "Balance extracted");
                    return Some(value);
                }
            }
        }
        None
    }

    /// Read the balance through the wallet CLI.
    ///
    /// Runs the primary listing command; when its screen has no recognizable
    /// balance, runs the detail command and tries once more.
    pub async fn read_balance<O: TextOracle>(
        &self,
        driver: &mut SessionDriver<O>,
        primary: &str,
        fallback: &str,
        timeout: Duration,
    ) -> Result<Option<Amount>, SessionError> {
        for command in [primary, fallback] {
            driver.clear().await?;
            let outcome = driver
                .execute(command, &self.unit_symbol, timeout, false)
                .await?;
            if let Some(balance) = self.extract(outcome.snapshot()) {
                info!(command, %balance, unit = %self.unit_symbol, "Wallet balance");
                return Ok(Some(balance));
            }
            debug!(command, "No balance on screen");
        }

        warn!("Unable to extract wallet balance");
        Ok(None)
    }
}

fn parse_figure(figure: &str) -> Option<Decimal> {
    figure.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::MockTerminal;

    fn kas() -> BalanceExtractor {
        BalanceExtractor::new("KAS")
    }

    #[test]
    fn test_bullet_with_thousands_separator() {
        let screen = "Accounts:\n  • 1,234.56789 KAS  kaspa:qabc";
        assert_eq!(kas().extract(screen), Some("1234.56789".parse().unwrap()));
    }

    #[test]
    fn test_colon_prefixed() {
        assert_eq!(
            kas().extract("Mature balance: 20.00000000 KAS"),
            Some(Decimal::from(20))
        );
    }

    #[test]
    fn test_labeled_without_symbol() {
        assert_eq!(kas().extract("Balance 7.5"), Some(Decimal::new(75, 1)));
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(
            kas().extract("account-0 (42.1 KAS)"),
            Some(Decimal::new(421, 1))
        );
    }

    #[test]
    fn test_bare_figure() {
        assert_eq!(kas().extract("total 3 KAS"), Some(Decimal::from(3)));
    }

    #[test]
    fn test_bullet_wins_over_later_shapes() {
        let screen = "Pending: 1.0 KAS\n  • 9.0 KAS";
        assert_eq!(kas().extract(screen), Some(Decimal::from(9)));
    }

    #[test]
    fn test_other_unit_is_ignored() {
        let tkas = BalanceExtractor::new("TKAS");
        assert_eq!(tkas.extract("• 5.0 KAS"), None);
        assert_eq!(kas().extract("• 5.0 TKAS"), None);
    }

    #[test]
    fn test_not_found() {
        assert_eq!(kas().extract("Accounts:\n(no accounts)"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_balance_falls_back_to_details() {
        let mock = MockTerminal::new("w", "p")
            .with_balance(Decimal::from(20))
            .with_balance_in_details_only();
        let mut driver = SessionDriver::new(mock, SessionConfig::default());
        driver.send("cargo run", false).await.unwrap();

        let balance = kas()
            .read_balance(&mut driver, "list", "details", Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(balance, Some(Decimal::from(20)));
        let sent = driver.oracle().literal_sends();
        assert_eq!(sent[sent.len() - 2..], ["list", "details"]);
    }
}
