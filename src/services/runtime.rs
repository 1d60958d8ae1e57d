use ethers::types::Address;
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::SwapConfig;
use crate::error::SwapError;
use crate::services::controller::{Command, Msg, OfferController, Toast, TxKind};
use crate::services::ledger::{load_offers, OfferReader, OfferWriter};
use crate::services::logging::logger::record;
use crate::services::wallet::{connect, WalletProvider};

/// Where toasts and the offer board end up.
pub trait Presenter: Send + Sync {
    fn toast(&self, toast: &Toast);
    fn render(&self, controller: &OfferController, now: u64);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

enum Outcome {
    Msg(Msg),
    Signer(Address, Result<Arc<dyn OfferWriter>, SwapError>),
}

enum Envelope {
    /// Intermediate result of a task that is still running.
    Progress(Msg),
    /// Final result of a task.
    Done(Outcome),
    /// Input from outside the runtime (user, wallet, event stream).
    External(Msg),
}

/// Cloneable handle for feeding messages into a running [`OfferRuntime`].
#[derive(Clone)]
pub struct Inbox(UnboundedSender<Envelope>);

impl Inbox {
    pub fn send(&self, msg: Msg) -> bool {
        self.0.send(Envelope::External(msg)).is_ok()
    }
}

/// Executes controller commands as tokio tasks and feeds their results back
/// through one inbox. State is only touched by the loop draining the inbox.
pub struct OfferRuntime {
    controller: OfferController,
    config: Arc<SwapConfig>,
    reader: Option<Arc<dyn OfferReader>>,
    wallet: Option<Arc<dyn WalletProvider>>,
    signer: Option<Arc<dyn OfferWriter>>,
    presenter: Arc<dyn Presenter>,
    clock: Arc<dyn Clock>,
    activity_log: Arc<PathBuf>,
    tx: UnboundedSender<Envelope>,
    rx: UnboundedReceiver<Envelope>,
    in_flight: usize,
}

impl OfferRuntime {
    pub fn new(
        config: SwapConfig,
        reader: Option<Arc<dyn OfferReader>>,
        wallet: Option<Arc<dyn WalletProvider>>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        OfferRuntime {
            activity_log: Arc::new(config.activity_log.clone()),
            config: Arc::new(config.clone()),
            controller: OfferController::new(config),
            reader,
            wallet,
            signer: None,
            presenter,
            clock: Arc::new(SystemClock),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn controller(&self) -> &OfferController {
        &self.controller
    }

    pub fn inbox(&self) -> Inbox {
        Inbox(self.tx.clone())
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let now = self.clock.now();
            for command in self.controller.update(msg, now) {
                if let Some(follow_up) = self.execute(command) {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    /// Drains the inbox until every task started so far has reported back.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(envelope) => self.receive(envelope),
                None => break,
            }
        }
    }

    /// Processes inbox traffic forever.
    pub async fn run(&mut self) {
        while let Some(envelope) = self.rx.recv().await {
            self.receive(envelope);
        }
    }

    fn receive(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Progress(msg) | Envelope::External(msg) => self.dispatch(msg),
            Envelope::Done(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                match outcome {
                    Outcome::Msg(msg) => self.dispatch(msg),
                    Outcome::Signer(account, Ok(handle)) => {
                        if self.controller.viewer() == Some(account) {
                            self.signer = Some(handle);
                            self.dispatch(Msg::SignerBound { account });
                        } else {
                            tracing::debug!("Dropping signer for stale account {:?}", account);
                        }
                    }
                    Outcome::Signer(_, Err(err)) => self.dispatch(Msg::SignerFailed(err)),
                }
            }
        }
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            let _ = tx.send(Envelope::Done(outcome));
        });
    }

    fn execute(&mut self, command: Command) -> Option<Msg> {
        match command {
            Command::Connect => {
                let Some(wallet) = self.wallet.clone() else {
                    return Some(Msg::ConnectFailed(SwapError::InvalidInput(
                        "No wallet available. Set PRIVATE_KEY to connect.".to_string(),
                    )));
                };
                let config = Arc::clone(&self.config);
                let progress = self.tx.clone();
                self.spawn(async move {
                    let result = connect(wallet.as_ref(), &config, move || {
                        let _ = progress.send(Envelope::Progress(Msg::SwitchingChain));
                    })
                    .await;
                    Outcome::Msg(match result {
                        Ok(connection) => Msg::Connected {
                            account: connection.account,
                            chain_id: connection.chain_id,
                        },
                        Err(err) => Msg::ConnectFailed(err),
                    })
                });
                None
            }

            Command::BindSigner { account } => {
                self.signer = None;
                let Some(wallet) = self.wallet.clone() else {
                    return Some(Msg::SignerFailed(SwapError::InvalidInput(
                        "No wallet available.".to_string(),
                    )));
                };
                self.spawn(async move { Outcome::Signer(account, wallet.signer_handle(account).await) });
                None
            }

            Command::ReleaseSigner => {
                self.signer = None;
                None
            }

            Command::LoadReadPath => {
                let Some(reader) = self.reader.clone() else {
                    return Some(Msg::ReadPathLoaded {
                        fee: None,
                        nft_limit: None,
                    });
                };
                self.spawn(async move {
                    let (fee, limit) = tokio::join!(reader.fee(), reader.max_nfts_per_side());
                    let fee = match fee {
                        Ok(fee) => Some(fee),
                        Err(err) => {
                            tracing::warn!("Failed to read fee: {}", err);
                            None
                        }
                    };
                    let nft_limit = match limit {
                        Ok(limit) => Some(limit),
                        Err(err) => {
                            tracing::warn!("Failed to read MAX_NFTS_PER_SIDE, using configured value: {}", err);
                            None
                        }
                    };
                    Outcome::Msg(Msg::ReadPathLoaded { fee, nft_limit })
                });
                None
            }

            Command::FetchOffers { from_block } => {
                let Some(reader) = self.reader.clone() else {
                    return Some(Msg::OffersLoaded(Err(SwapError::InvalidInput(
                        "Read-only ledger handle is unavailable.".to_string(),
                    ))));
                };
                let log = Arc::clone(&self.activity_log);
                self.spawn(async move {
                    let result = load_offers(reader, from_block).await;
                    if let Ok(offers) = &result {
                        record(&log, &format!("Loaded {} active offers", offers.len()));
                    }
                    Outcome::Msg(Msg::OffersLoaded(result))
                });
                None
            }

            Command::Submit(request) => {
                let kind = TxKind::from(&request);
                let Some(signer) = self.signer.clone() else {
                    return Some(Msg::TxFailed {
                        kind,
                        error: SwapError::InvalidInput(
                            "Connect your wallet before sending transactions.".to_string(),
                        ),
                    });
                };
                let progress = self.tx.clone();
                let log = Arc::clone(&self.activity_log);
                self.spawn(async move {
                    let result = async {
                        let hash = signer.submit(&request).await?;
                        record(&log, &format!("{:?} submitted: {:?}", kind, hash));
                        let _ = progress.send(Envelope::Progress(Msg::TxSubmitted { kind, hash }));
                        signer.wait_for_inclusion(hash).await?;
                        Ok::<_, SwapError>(hash)
                    }
                    .await;

                    Outcome::Msg(match result {
                        Ok(hash) => {
                            record(&log, &format!("{:?} confirmed: {:?}", kind, hash));
                            Msg::TxConfirmed { kind }
                        }
                        Err(error) => {
                            record(&log, &format!("{:?} failed: {}", kind, error));
                            Msg::TxFailed { kind, error }
                        }
                    })
                });
                None
            }

            Command::Toast(toast) => {
                self.presenter.toast(&toast);
                None
            }

            Command::Render => {
                let now = self.clock.now();
                self.presenter.render(&self.controller, now);
                None
            }
        }
    }
}
