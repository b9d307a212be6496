//! kaspa_batch - batch transfers through the Kaspa wallet CLI
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐
//! │ Redistrib.   │──▶│ Preflight│──▶│ Dispatcher │──▶│  Poller  │──▶│ Recovery │
//! │ list (text)  │   │ (balance)│   │ (tmux CLI) │   │  (REST)  │   │  (text)  │
//! └──────────────┘   └──────────┘   └────────────┘   └──────────┘   └──────────┘
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use kaspa_batch::batch::BatchCoordinator;
use kaspa_batch::config::AppConfig;
use kaspa_batch::credentials::Credentials;
use kaspa_batch::dispatch::TransferDispatcher;
use kaspa_batch::engine::{Preflight, WalletEngine};
use kaspa_batch::ledger::{ConfirmationPoller, KaspaRestClient, LedgerClient};
use kaspa_batch::network::Network;
use kaspa_batch::recovery::RecoveryWriter;
use kaspa_batch::redistribution::load_redistribution;
use kaspa_batch::session::TmuxSession;

const WALLET_PASSWORD_ENV: &str = "KASPA_WALLET_PASSWORD";
const PAYMENT_PASSWORD_ENV: &str = "KASPA_PAYMENT_PASSWORD";

#[derive(Debug, Parser)]
#[command(author, version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"), about)]
struct Args {
    /// Network to send on. Asked interactively when omitted.
    #[arg(long, value_enum)]
    network: Option<Network>,

    /// Configuration profile, read from `config/<env>.yaml`
    #[arg(long, short, default_value = "dev")]
    env: String,

    /// Redistribution list (defaults to `redistribution_file` from the config)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Proceed without asking once the balance check is done
    #[arg(long, default_value_t = false)]
    yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.env).context("Failed to load configuration")?;
    let _log_guards = kaspa_batch::logging::init_logging(&config);
    info!(
        "Starting kaspa_batch {} ({}) with '{}' config",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        args.env
    );

    let network = match args.network {
        Some(network) => network,
        None => ask_network()?,
    };
    let mut profile = network.profile();
    if let Some(url) = &config.confirmation.api_url {
        profile = profile.with_api_base_url(url);
    }
    info!("Selected network: {}", network);

    let input = args
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.redistribution_file));
    let list = load_redistribution(&input, &profile.address_prefix)?;
    if list.transfers.is_empty() {
        warn!(
            "No transfers to make for network {}. Check the redistribution file.",
            network
        );
        return Ok(());
    }

    let credentials = read_credentials()?;

    let poller = if config.confirmation.enabled {
        let client: Arc<dyn LedgerClient> = Arc::new(
            KaspaRestClient::new(&profile.api_base_url, &config.confirmation)
                .context("Failed to create ledger client")?,
        );
        Some(ConfirmationPoller::new(client, &profile, &config.confirmation))
    } else {
        warn!("Ledger confirmation disabled: every sent transfer will be left pending");
        None
    };

    let coordinator = BatchCoordinator::new(
        TransferDispatcher::new(
            config.dispatch.clone(),
            credentials.clone(),
            config.session.command_timeout(),
        ),
        poller,
        config.confirmation.clone(),
        RecoveryWriter::new(&config.recovery_dir),
        &profile.unit_symbol,
    );

    info!("Creating a tmux session for the wallet CLI...");
    let session_name = TmuxSession::session_name(&config.session.session_prefix);
    let session = TmuxSession::create(&session_name)
        .await
        .context("Failed to start tmux session (is tmux installed?)")?;

    let mut engine = WalletEngine::new(session, profile, &config, credentials);
    let assume_yes = args.yes;
    let summary = engine
        .run(&coordinator, &list.transfers, |preflight| {
            assume_yes || ask_to_proceed(preflight)
        })
        .await?;

    if let Some(report) = &summary.report
        && report.totals.failed > 0
    {
        warn!("{} transfers failed", report.totals.failed);
    }
    info!(
        "Finished. Operation log in {}/{}, screen audit in {}/{}",
        config.log_dir, config.log_file, config.log_dir, config.audit_file
    );
    Ok(())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_lowercase())
}

fn ask_network() -> Result<Network> {
    loop {
        match read_line("Choose network (mainnet/testnet): ")?.as_str() {
            "mainnet" => return Ok(Network::Mainnet),
            "testnet" => return Ok(Network::Testnet),
            _ => println!("Please enter 'mainnet' or 'testnet'."),
        }
    }
}

fn ask_to_proceed(preflight: &Preflight) -> bool {
    let prompt = if preflight.sufficient() {
        "Do you want to proceed with transfers? (y/n): "
    } else {
        "Balance is insufficient. Do you want to continue with possible transfers anyway? (y/n): "
    };
    matches!(read_line(prompt).as_deref(), Ok("y"))
}

/// Environment first (non-interactive runs), then the terminal
fn read_credentials() -> Result<Credentials> {
    let wallet = match std::env::var(WALLET_PASSWORD_ENV) {
        Ok(pw) => pw,
        Err(_) => rpassword::prompt_password("Enter wallet password: ")
            .context("Failed to read wallet password")?,
    };
    let payment = match std::env::var(PAYMENT_PASSWORD_ENV) {
        Ok(pw) => pw,
        Err(_) => rpassword::prompt_password("Enter payment password (leave empty if same): ")
            .context("Failed to read payment password")?,
    };
    Ok(Credentials::from_prompts(wallet, payment))
}
