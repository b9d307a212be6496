use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::error::EngineError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    /// Full screen snapshots after every wallet command
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Default redistribution list (overridable with --input)
    #[serde(default = "default_redistribution_file")]
    pub redistribution_file: String,
    /// Where recovery files are written
    #[serde(default = "default_recovery_dir")]
    pub recovery_dir: String,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

fn default_audit_file() -> String {
    "session_audit.log".to_string()
}

fn default_redistribution_file() -> String {
    "redistribution.txt".to_string()
}

fn default_recovery_dir() -> String {
    ".".to_string()
}

/// How the wallet CLI is started and spoken to
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WalletConfig {
    /// Shell line typed into the fresh tmux session to start the wallet CLI
    pub launch_command: String,
    /// Primary command whose output carries the balance
    pub balance_command: String,
    /// Fallback command when the primary output has no recognizable balance
    pub balance_detail_command: String,
    /// Estimated network fee per transaction, display units
    pub fee_estimate: Decimal,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            launch_command: "cd ~/rusty-kaspa/cli && cargo run --release".to_string(),
            balance_command: "list".to_string(),
            balance_detail_command: "details".to_string(),
            fee_estimate: Decimal::new(2036, 8),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub poll_interval_ms: u64,
    /// Extra wait after a password prompt shows up; the prompt redraw lags
    pub password_settle_ms: u64,
    /// Pause between the keystrokes of a secret
    pub secret_key_delay_ms: u64,
    pub startup_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub exit_timeout_secs: u64,
    /// tmux session name prefix, suffixed with a unix timestamp
    pub session_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            password_settle_ms: 500,
            secret_key_delay_ms: 50,
            startup_timeout_secs: 20,
            command_timeout_secs: 30,
            exit_timeout_secs: 5,
            session_prefix: "kaspa_auto".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn password_settle(&self) -> Duration {
        Duration::from_millis(self.password_settle_ms)
    }

    pub fn secret_key_delay(&self) -> Duration {
        Duration::from_millis(self.secret_key_delay_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_secs(self.exit_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    /// Attempts per transfer on "insufficient funds at this instant"
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Pause after every dispatch, success or failure
    pub cooldown_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 5_000,
            cooldown_ms: 3_000,
        }
    }
}

impl DispatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub enabled: bool,
    /// Override of the network profile's REST API base URL
    pub api_url: Option<String>,
    /// Wait between "wallet says sent" and the first ledger query
    pub settle_delay_ms: u64,
    pub deadline_secs: u64,
    pub base_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Absolute band around the expected amount, display units
    pub tolerance: Decimal,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub transport_attempts: u32,
    pub transport_backoff_ms: u64,
    /// Ledger payments with a block time this far before the dispatch still
    /// count; covers clock drift between this host and the network
    pub clock_skew_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: None,
            settle_delay_ms: 5_000,
            deadline_secs: 120,
            base_interval_ms: 5_000,
            max_interval_ms: 30_000,
            tolerance: Decimal::new(2, 1),
            page_size: 50,
            request_timeout_secs: 10,
            transport_attempts: 3,
            transport_backoff_ms: 1_000,
            clock_skew_secs: 120,
        }
    }
}

impl ConfirmationConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn transport_backoff(&self) -> Duration {
        Duration::from_millis(self.transport_backoff_ms)
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> Result<Self, EngineError> {
        Self::from_file(&format!("config/{}.yaml", env))
    }

    pub fn from_file(path: &str) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {}", path, e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("failed to parse {}: {}", path, e)))
    }
}
