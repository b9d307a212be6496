use std::fmt;

/// Wallet secrets for one run. Never printed: `Debug` shows placeholders.
#[derive(Clone)]
pub struct Credentials {
    wallet_password: String,
    payment_password: String,
}

impl Credentials {
    pub fn new(wallet_password: impl Into<String>, payment_password: impl Into<String>) -> Self {
        Self {
            wallet_password: wallet_password.into(),
            payment_password: payment_password.into(),
        }
    }

    /// Payment password falls back to the wallet password when left empty
    pub fn from_prompts(wallet_password: String, payment_password: String) -> Self {
        if payment_password.is_empty() {
            Self::new(wallet_password.clone(), wallet_password)
        } else {
            Self::new(wallet_password, payment_password)
        }
    }

    pub fn wallet_password(&self) -> &str {
        &self.wallet_password
    }

    pub fn payment_password(&self) -> &str {
        &self.payment_password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("wallet_password", &crate::session::REDACTED)
            .field("payment_password", &crate::session::REDACTED)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payment_password_reuses_wallet_password() {
        let creds = Credentials::from_prompts("hunter2".into(), String::new());
        assert_eq!(creds.payment_password(), "hunter2");

        let creds = Credentials::from_prompts("a".into(), "b".into());
        assert_eq!(creds.wallet_password(), "a");
        assert_eq!(creds.payment_password(), "b");
    }

    #[test]
    fn test_debug_is_redacted() {
        let dbg = format!("{:?}", Credentials::new("hunter2", "swordfish"));
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("swordfish"));
        assert!(dbg.contains("[PASSWORD]"));
    }
}
