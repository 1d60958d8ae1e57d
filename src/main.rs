use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::{eyre, Result};
use futures::future::{pending, try_join_all};
use tokio::sync::mpsc::{self, UnboundedReceiver};

mod battle {
    pub mod console;
    pub mod rules;
    pub mod sequencer;
    pub mod stage;
}

mod services {
    pub mod console;
    pub mod controller;
    pub mod ledger;
    pub mod listener;
    pub mod logging;
    pub mod runtime;
    pub mod wallet;
}

mod config;
mod error;
mod gate;
mod models;

use battle::console::run_battle;
use battle::stage::Pacing;
use config::SwapConfig;
use error::ConfigError;
use models::{NftRow, OfferForm};
use services::console::{parse_watch_command, render_board, ConsolePresenter};
use services::controller::{Msg, OfferState, TxStatus};
use services::ledger::{EthersReader, OfferReader};
use services::listener::listening::{follow_wallet, listen_for_offers};
use services::logging::logger;
use services::runtime::{Clock, OfferRuntime, Presenter, SystemClock};
use services::wallet::{LocalWalletProvider, WalletProvider};

const REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const WALLET_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "nft-swap-client", version, about = "Browse and trade multi-NFT swap offers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List active offers once
    Offers {
        /// Print the raw offer records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep the offer board up to date from the event stream
    Watch,
    /// Create a swap offer
    Create {
        /// NFT to escrow, as CONTRACT:TOKEN_ID (repeatable)
        #[arg(long = "give", value_parser = parse_row, required = true)]
        give: Vec<NftRow>,
        /// NFT to ask for, as CONTRACT:TOKEN_ID (repeatable)
        #[arg(long = "want", value_parser = parse_row, required = true)]
        want: Vec<NftRow>,
        /// Offer lifetime in hours
        #[arg(long, default_value = "24")]
        hours: String,
    },
    /// Accept an offer
    Accept { offer_id: u64 },
    /// Cancel one of your offers (expired ones included)
    Cancel { offer_id: u64 },
    /// Play the battle demo on the terminal
    Battle {
        /// Print messages without typing delays
        #[arg(long)]
        fast: bool,
    },
}

fn parse_row(value: &str) -> Result<NftRow, String> {
    let (contract, token_id) = value
        .split_once(':')
        .ok_or_else(|| format!("expected CONTRACT:TOKEN_ID, got {:?}", value))?;
    Ok(NftRow::new(contract, token_id))
}

/// Everything a subcommand needs once configuration has been read.
struct Client {
    runtime: OfferRuntime,
    reader: Option<Arc<EthersReader>>,
    wallet: Option<Arc<dyn WalletProvider>>,
}

/// Wires the ledger reader and, when a key is configured, the wallet. A part
/// that cannot be built is left out so only the features needing it fail.
fn build_runtime(config: SwapConfig, presenter: Arc<dyn Presenter>) -> Client {
    config.validate();
    let address = config.contract_address().ok();

    let reader = address.and_then(|address| match EthersReader::new(address, &config.read_rpc_url) {
        Ok(reader) => Some(Arc::new(reader)),
        Err(err) => {
            tracing::warn!("Offers cannot be read: {}", err);
            None
        }
    });
    let wallet = match (address, config.private_key.as_deref()) {
        (Some(address), Some(key)) => match LocalWalletProvider::new(key, &config.read_rpc_url, address) {
            Ok(wallet) => Some(Arc::new(wallet) as Arc<dyn WalletProvider>),
            Err(err) => {
                tracing::warn!("Wallet unavailable: {}", err);
                None
            }
        },
        _ => None,
    };

    let offer_reader = reader.clone().map(|r| r as Arc<dyn OfferReader>);
    Client {
        runtime: OfferRuntime::new(config, offer_reader, wallet.clone(), presenter),
        reader,
        wallet,
    }
}

/// Lines typed on stdin. A plain thread does the blocking reads so that
/// returning from `main` is never held up by a pending read.
fn stdin_lines() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn list_offers(config: SwapConfig, json: bool) -> Result<()> {
    let Client { mut runtime, .. } = build_runtime(config, Arc::new(ConsolePresenter::toasts_only()));
    runtime.dispatch(Msg::Init);
    runtime.settle().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&runtime.controller().state().offers)?);
    } else {
        print!("{}", render_board(runtime.controller(), SystemClock.now()));
    }
    Ok(())
}

/// Success only when the requested transaction was confirmed.
fn tx_outcome(state: &OfferState) -> Result<()> {
    match state.last_tx {
        Some(TxStatus::Confirmed(_)) => Ok(()),
        Some(TxStatus::Failed(kind)) => Err(eyre!("{:?} transaction failed", kind)),
        None => Err(eyre!("No transaction was sent")),
    }
}

async fn transact(config: SwapConfig, msg: Msg) -> Result<()> {
    if config.private_key.is_none() {
        return Err(ConfigError::MissingPrivateKey.into());
    }

    let Client { mut runtime, .. } = build_runtime(config, Arc::new(ConsolePresenter::toasts_only()));
    runtime.dispatch(Msg::Init);
    runtime.dispatch(Msg::ConnectRequested);
    runtime.settle().await;

    runtime.dispatch(msg);
    runtime.settle().await;

    print!("{}", render_board(runtime.controller(), SystemClock.now()));
    tx_outcome(runtime.controller().state())
}

async fn watch(config: SwapConfig, mut typed: UnboundedReceiver<String>) -> Result<()> {
    let activity_log = config.activity_log.clone();
    let Client {
        mut runtime,
        reader,
        wallet,
    } = build_runtime(config, Arc::new(ConsolePresenter::new()));

    runtime.dispatch(Msg::Init);
    if wallet.is_some() {
        runtime.dispatch(Msg::ConnectRequested);
    }

    let events_inbox = runtime.inbox();
    let events = async {
        if let Some(reader) = &reader {
            if let Err(err) = listen_for_offers(reader.contract(), &activity_log, |msg| events_inbox.send(msg)).await {
                tracing::error!("Offer event stream stopped: {}", err);
            }
        }
        pending::<()>().await
    };

    let wallet_inbox = runtime.inbox();
    let wallet_changes = async {
        if let Some(wallet) = &wallet {
            follow_wallet(wallet.as_ref(), WALLET_POLL_INTERVAL, |msg| wallet_inbox.send(msg)).await;
        }
        pending::<()>().await
    };

    let ticker_inbox = runtime.inbox();
    let ticker = async move {
        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if !ticker_inbox.send(Msg::VisibilityRestored) {
                break;
            }
        }
    };

    let command_inbox = runtime.inbox();
    let commands = async move {
        while let Some(line) = typed.recv().await {
            if line.trim().is_empty() {
                continue;
            }
            match parse_watch_command(&line) {
                Ok(msg) => {
                    if !command_inbox.send(msg) {
                        break;
                    }
                }
                Err(usage) => println!("{}", usage),
            }
        }
        pending::<()>().await
    };

    tokio::select! {
        _ = runtime.run() => {}
        _ = events => {}
        _ = wallet_changes => {}
        _ = ticker => {}
        _ = commands => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Stopping watch");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Battle { fast } => {
            let pacing = if fast { Pacing::instant() } else { Pacing::default() };
            run_battle(pacing, stdin_lines()).await
        }
        Command::Offers { json } => list_offers(SwapConfig::from_env()?, json).await,
        Command::Watch => watch(SwapConfig::from_env()?, stdin_lines()).await,
        Command::Create { give, want, hours } => {
            let form = OfferForm {
                offered: give,
                requested: want,
                duration_hours: hours,
            };
            transact(SwapConfig::from_env()?, Msg::CreateRequested(form)).await
        }
        Command::Accept { offer_id } => {
            transact(SwapConfig::from_env()?, Msg::AcceptRequested(offer_id)).await
        }
        Command::Cancel { offer_id } => {
            transact(SwapConfig::from_env()?, Msg::CancelRequested(offer_id)).await
        }
    }
}
