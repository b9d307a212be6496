//! Network profiles
//!
//! Selected once at start-up and read-only afterwards.

use clap::ValueEnum;
use rust_decimal::Decimal;
use std::fmt;

/// Sompi per KAS.
pub const SOMPI_PER_KAS: u64 = 100_000_000;

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn profile(&self) -> NetworkProfile {
        match self {
            Network::Mainnet => NetworkProfile {
                network: *self,
                activation_command: "network mainnet".to_string(),
                connect_command: "connect wss://anna.kaspa.stream/kaspa/mainnet/wrpc/borsh"
                    .to_string(),
                address_prefix: "kaspa:".to_string(),
                unit_symbol: "KAS".to_string(),
                smallest_unit_divisor: SOMPI_PER_KAS,
                api_base_url: "https://api.kaspa.org".to_string(),
            },
            Network::Testnet => NetworkProfile {
                network: *self,
                activation_command: "network testnet-10".to_string(),
                connect_command: "connect wss://tau-10.kaspa.blue/kaspa/testnet-10/wrpc/borsh"
                    .to_string(),
                address_prefix: "kaspatest:".to_string(),
                unit_symbol: "TKAS".to_string(),
                smallest_unit_divisor: SOMPI_PER_KAS,
                api_base_url: "https://api-tn10.kaspa.org".to_string(),
            },
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything network-specific the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub network: Network,
    /// Wallet CLI command selecting the network id
    pub activation_command: String,
    /// Wallet CLI command connecting to a node
    pub connect_command: String,
    pub address_prefix: String,
    pub unit_symbol: String,
    pub smallest_unit_divisor: u64,
    /// Base URL of the public REST ledger API
    pub api_base_url: String,
}

impl NetworkProfile {
    /// Address prefixes of every known network; used to tell "missing prefix"
    /// apart from "wrong network".
    pub const KNOWN_PREFIXES: [&'static str; 2] = ["kaspa:", "kaspatest:"];

    /// Convert an amount in the smallest unit into the display unit.
    pub fn to_display_units(&self, smallest: u64) -> Decimal {
        Decimal::from(smallest) / Decimal::from(self.smallest_unit_divisor)
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}
