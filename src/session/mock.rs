//! Mock wallet terminal
//!
//! An in-memory stand-in for the wallet CLI running in tmux. It reacts to
//! typed lines the way the real dialogue does (launch, network, connect,
//! open, list/details, send, exit) and prints the same prompts and banners,
//! so the driver, dispatcher and coordinator can be exercised without tmux.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::SessionError;
use super::oracle::{Key, TextOracle};
use super::pattern::prompts;

/// Visible screen height, in lines
const SCREEN_LINES: usize = 40;

/// What the mock wallet prints after a send dialogue completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendBehaviour {
    Succeed,
    InsufficientFunds,
    InvalidAddress,
    NetworkError,
    /// Print this line verbatim
    Output(String),
    /// Print nothing
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSend {
    address: String,
    raw_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MockState {
    Shell,
    Cli,
    OpenPassword,
    SendWalletPassword(PendingSend),
    SendPaymentPassword(PendingSend),
    Exited,
}

pub struct MockTerminal {
    name: String,
    wallet_password: String,
    payment_password: String,
    balance: Decimal,
    unit_symbol: String,
    list_shows_balance: bool,
    skip_payment_prompt: bool,
    /// Snapshots taken before the CLI banner shows up after launch
    startup_lag: usize,
    queued: VecDeque<SendBehaviour>,
    per_address: HashMap<String, SendBehaviour>,

    state: MockState,
    input: String,
    /// Lines with the snapshot count they stay hidden up to
    screen: Vec<(String, usize)>,
    tx_counter: u64,
    closed: bool,

    literal_sends: Vec<String>,
    enter_count: usize,
    snapshot_count: AtomicUsize,
    clear_count: usize,
    close_count: usize,
    send_commands: usize,
    delivered: Vec<(String, String)>,
}

impl MockTerminal {
    pub fn new(wallet_password: &str, payment_password: &str) -> Self {
        Self {
            name: "mock_session".to_string(),
            wallet_password: wallet_password.to_string(),
            payment_password: payment_password.to_string(),
            balance: Decimal::ZERO,
            unit_symbol: "KAS".to_string(),
            list_shows_balance: true,
            skip_payment_prompt: false,
            startup_lag: 0,
            queued: VecDeque::new(),
            per_address: HashMap::new(),
            state: MockState::Shell,
            input: String::new(),
            screen: Vec::new(),
            tx_counter: 0,
            closed: false,
            literal_sends: Vec::new(),
            enter_count: 0,
            snapshot_count: AtomicUsize::new(0),
            clear_count: 0,
            close_count: 0,
            send_commands: 0,
            delivered: Vec::new(),
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    /// `list` prints no balance; only `details` does
    pub fn with_balance_in_details_only(mut self) -> Self {
        self.list_shows_balance = false;
        self
    }

    /// Wallet without a separate payment password
    pub fn without_payment_prompt(mut self) -> Self {
        self.skip_payment_prompt = true;
        self
    }

    /// The CLI banner only shows up from the `(snapshots + 1)`-th screen
    /// capture after launch on, like a wallet that is still compiling
    pub fn with_slow_startup(mut self, snapshots: usize) -> Self {
        self.startup_lag = snapshots;
        self
    }

    /// Every send to `address` ends with `behaviour`
    pub fn fail_address(mut self, address: &str, behaviour: SendBehaviour) -> Self {
        self.per_address.insert(address.to_string(), behaviour);
        self
    }

    /// Next completed send ends with `behaviour` (consumed once, before
    /// per-address rules)
    pub fn queue(mut self, behaviour: SendBehaviour) -> Self {
        self.queued.push_back(behaviour);
        self
    }

    /// Put a raw line on screen
    pub fn show(&mut self, line: &str) {
        self.show_after(line, 0);
    }

    fn show_after(&mut self, line: &str, snapshots: usize) {
        let hidden_until = self.snapshot_count() + snapshots;
        self.screen.push((line.to_string(), hidden_until));
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn literal_sends(&self) -> &[String] {
        &self.literal_sends
    }

    pub fn enter_count(&self) -> usize {
        self.enter_count
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshot_count.load(Ordering::Relaxed)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }

    /// Number of `send` commands typed
    pub fn send_commands(&self) -> usize {
        self.send_commands
    }

    /// `(address, amount)` of every send the wallet accepted
    pub fn delivered(&self) -> &[(String, String)] {
        &self.delivered
    }

    fn on_enter(&mut self) {
        let line = std::mem::take(&mut self.input);
        let state = std::mem::replace(&mut self.state, MockState::Cli);

        self.state = match state {
            MockState::Shell => {
                self.show(&format!("$ {}", line));
                if line == "exit" {
                    self.show("logout");
                    MockState::Shell
                } else {
                    let lag = self.startup_lag;
                    self.show_after("Kaspa Cli", lag);
                    self.show_after(prompts::CLI_READY, lag);
                    MockState::Cli
                }
            }
            MockState::Cli => {
                self.show(&format!("$ {}", line));
                self.on_command(&line)
            }
            MockState::OpenPassword => {
                if line == self.wallet_password {
                    self.show(&format!("{} mock", prompts::WALLET_OPENED));
                    self.show("Accounts:");
                    self.show(&self.bullet_balance());
                } else {
                    self.show("Error: Unable to decrypt wallet");
                }
                MockState::Cli
            }
            MockState::SendWalletPassword(pending) => {
                if line != self.wallet_password {
                    self.show("Error: Unable to decrypt wallet");
                    MockState::Cli
                } else if self.skip_payment_prompt {
                    self.finish_send(pending);
                    MockState::Cli
                } else {
                    self.show(prompts::PAYMENT_PASSWORD);
                    MockState::SendPaymentPassword(pending)
                }
            }
            MockState::SendPaymentPassword(pending) => {
                if line == self.payment_password {
                    self.finish_send(pending);
                } else {
                    self.show("Error: Unable to decrypt payment secret");
                }
                MockState::Cli
            }
            MockState::Exited => MockState::Exited,
        };
    }

    fn on_command(&mut self, line: &str) -> MockState {
        let mut parts = line.split_whitespace();
        match parts.next().unwrap_or_default() {
            "network" => {
                let id = parts.next().unwrap_or_default().to_string();
                self.show(&format!("{} {}", prompts::NETWORK_SET, id));
                MockState::Cli
            }
            "connect" => {
                self.show(&format!("{} version 1.0.0", prompts::CONNECTED));
                MockState::Cli
            }
            "open" => {
                self.show(prompts::WALLET_PASSWORD);
                MockState::OpenPassword
            }
            "list" => {
                self.show("Accounts:");
                if self.list_shows_balance {
                    self.show(&self.bullet_balance());
                }
                MockState::Cli
            }
            "details" => {
                self.show(&format!(
                    "Mature balance: {:.8} {}",
                    self.balance, self.unit_symbol
                ));
                MockState::Cli
            }
            "send" => {
                self.send_commands += 1;
                let address = parts.next().unwrap_or_default().to_string();
                let raw_amount = parts.next().unwrap_or_default().to_string();
                self.show(prompts::WALLET_PASSWORD);
                MockState::SendWalletPassword(PendingSend {
                    address,
                    raw_amount,
                })
            }
            "exit" => {
                self.show(prompts::EXIT);
                MockState::Exited
            }
            other => {
                self.show(&format!("Error: unknown command '{}'", other));
                MockState::Cli
            }
        }
    }

    fn finish_send(&mut self, pending: PendingSend) {
        let amount: Decimal = pending.raw_amount.parse().unwrap_or_default();
        let behaviour = self
            .queued
            .pop_front()
            .or_else(|| self.per_address.get(&pending.address).cloned())
            .unwrap_or(if amount > self.balance {
                SendBehaviour::InsufficientFunds
            } else {
                SendBehaviour::Succeed
            });

        match behaviour {
            SendBehaviour::Succeed => {
                self.balance -= amount;
                self.tx_counter += 1;
                let tx_id = format!("{:064x}", self.tx_counter);
                self.show(&format!(
                    "{} {} {}  Fees: 0.00002036 {}  Inputs: 1  Outputs: 2",
                    prompts::SEND_AMOUNT,
                    pending.raw_amount,
                    self.unit_symbol,
                    self.unit_symbol
                ));
                self.show(&format!(
                    "Sending {} {} to {}, tx ids:",
                    pending.raw_amount, self.unit_symbol, pending.address
                ));
                self.show(&format!("  {}", tx_id));
                self.delivered.push((pending.address, pending.raw_amount));
            }
            SendBehaviour::InsufficientFunds => self.show("Error: not enough funds"),
            SendBehaviour::InvalidAddress => self.show("Error: invalid address"),
            SendBehaviour::NetworkError => self.show("Error: network error (rpc disconnected)"),
            SendBehaviour::Output(line) => self.show(&line),
            SendBehaviour::Silent => {}
        }
    }

    fn bullet_balance(&self) -> String {
        format!("  • {:.8} {}", self.balance, self.unit_symbol)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl TextOracle for MockTerminal {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_literal(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.literal_sends.push(text.to_string());
        self.input.push_str(text);
        Ok(())
    }

    async fn send_key(&mut self, key: Key) -> Result<(), SessionError> {
        self.ensure_open()?;
        match key {
            Key::Enter => {
                self.enter_count += 1;
                self.on_enter();
            }
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        let taken = self.snapshot_count.fetch_add(1, Ordering::Relaxed) + 1;
        let visible: Vec<&str> = self
            .screen
            .iter()
            .filter(|(_, hidden_until)| taken > *hidden_until)
            .map(|(line, _)| line.as_str())
            .collect();
        let start = visible.len().saturating_sub(SCREEN_LINES);
        Ok(visible[start..].join("\n"))
    }

    async fn clear(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.clear_count += 1;
        self.screen.clear();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if !self.closed {
            self.closed = true;
            self.close_count += 1;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
