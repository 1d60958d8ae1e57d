use ethers::types::{Address, TxHash, U256};

use crate::config::SwapConfig;
use crate::error::SwapError;
use crate::gate::Gate;
use crate::models::{shorten_hash, AcceptButton, CancelKind, Offer, OfferActions, OfferForm};
use crate::services::ledger::TxRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub account: Address,
    pub chain_id: u64,
    pub signer_bound: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    Connecting,
    Switching,
    Connected(Session),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    NotConfigured,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOrigin {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Create,
    Accept(u64),
    Cancel(u64),
    CancelExpired(u64),
}

impl TxKind {
    fn pending_text(&self, hash: &TxHash) -> String {
        let hash = shorten_hash(hash);
        match self {
            TxKind::Create => format!("Transaction submitted: {}", hash),
            TxKind::Accept(_) => format!("Accepting offer… {}", hash),
            TxKind::Cancel(_) => format!("Cancelling offer… {}", hash),
            TxKind::CancelExpired(_) => format!("Cancelling expired offer… {}", hash),
        }
    }

    fn success_text(&self) -> &'static str {
        match self {
            TxKind::Create => "Swap offer created successfully.",
            TxKind::Accept(_) => "Offer accepted! NFTs have been swapped.",
            TxKind::Cancel(_) => "Offer cancelled and NFTs returned.",
            TxKind::CancelExpired(_) => "Expired offer cancelled and NFTs returned.",
        }
    }
}

/// How the most recent transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed(TxKind),
    Failed(TxKind),
}

impl From<&TxRequest> for TxKind {
    fn from(request: &TxRequest) -> Self {
        match request {
            TxRequest::Create { .. } => TxKind::Create,
            TxRequest::Accept(id) => TxKind::Accept(*id),
            TxRequest::Cancel(id) => TxKind::Cancel(*id),
            TxRequest::CancelExpired(id) => TxKind::CancelExpired(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

/// Everything that can happen to the client: user input, wallet
/// notifications and completions of earlier commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    Init,
    ConnectRequested,
    SwitchingChain,
    Connected { account: Address, chain_id: u64 },
    ConnectFailed(SwapError),
    SignerBound { account: Address },
    SignerFailed(SwapError),
    DisconnectRequested,
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    ReadPathLoaded { fee: Option<U256>, nft_limit: Option<u64> },
    RefreshRequested,
    VisibilityRestored,
    OfferCreated(u64),
    OffersLoaded(Result<Vec<Offer>, SwapError>),
    CreateRequested(OfferForm),
    AcceptRequested(u64),
    CancelRequested(u64),
    TxSubmitted { kind: TxKind, hash: TxHash },
    TxConfirmed { kind: TxKind },
    TxFailed { kind: TxKind, error: SwapError },
}

/// Side effects the runtime performs on the controller's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    BindSigner { account: Address },
    ReleaseSigner,
    LoadReadPath,
    FetchOffers { from_block: u64 },
    Submit(TxRequest),
    Toast(Toast),
    Render,
}

#[derive(Debug)]
pub struct OfferState {
    pub session: SessionPhase,
    pub read_available: bool,
    pub cached_fee: Option<U256>,
    /// False when the last fee read failed; the cached value is kept for payment.
    pub fee_fresh: bool,
    pub nft_limit: u64,
    pub offers: Vec<Offer>,
    pub list: ListStatus,
    pub refresh: Gate<RefreshOrigin>,
    pub activity: Gate<TxKind>,
    pub last_tx: Option<TxStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferCard<'a> {
    pub offer: &'a Offer,
    pub badges: Vec<&'static str>,
    pub actions: OfferActions,
}

fn toast(level: ToastLevel, message: impl Into<String>) -> Command {
    Command::Toast(Toast {
        level,
        message: message.into(),
    })
}

pub struct OfferController {
    config: SwapConfig,
    state: OfferState,
}

impl OfferController {
    pub fn new(config: SwapConfig) -> Self {
        let state = OfferState {
            session: SessionPhase::Disconnected,
            read_available: false,
            cached_fee: None,
            fee_fresh: false,
            nft_limit: config.max_nfts_per_side,
            offers: Vec::new(),
            list: ListStatus::Loading,
            refresh: Gate::default(),
            activity: Gate::default(),
            last_tx: None,
        };
        OfferController { config, state }
    }

    pub fn state(&self) -> &OfferState {
        &self.state
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn viewer(&self) -> Option<Address> {
        match self.state.session {
            SessionPhase::Connected(session) => Some(session.account),
            _ => None,
        }
    }

    fn signer_bound(&self) -> bool {
        matches!(self.state.session, SessionPhase::Connected(s) if s.signer_bound)
    }

    /// Offers as they should be listed: live offers for everyone, expired
    /// ones only for their creator so they can be reclaimed.
    pub fn board(&self, now: u64) -> Vec<OfferCard<'_>> {
        let viewer = self.viewer();
        let signer_bound = self.signer_bound();
        self.state
            .offers
            .iter()
            .filter(|offer| offer.is_active)
            .filter(|offer| !offer.is_expired(now) || offer.is_owned_by(viewer))
            .map(|offer| OfferCard {
                offer,
                badges: offer.badges(viewer, now),
                actions: offer.actions(viewer, signer_bound, now),
            })
            .collect()
    }

    pub fn update(&mut self, msg: Msg, now: u64) -> Vec<Command> {
        let mut out = Vec::new();
        match msg {
            Msg::Init => {
                if self.config.contract_address().is_ok() {
                    self.state.read_available = true;
                    out.push(Command::LoadReadPath);
                    self.request_refresh(RefreshOrigin::Automatic, &mut out);
                } else {
                    self.state.list = ListStatus::NotConfigured;
                    out.push(toast(
                        ToastLevel::Warning,
                        "Set a valid CONTRACT_ADDRESS to load offers.",
                    ));
                }
                out.push(Command::Render);
            }

            Msg::ConnectRequested => match self.state.session {
                SessionPhase::Disconnected => match self.config.contract_address() {
                    Ok(_) => {
                        self.state.session = SessionPhase::Connecting;
                        out.push(Command::Connect);
                        out.push(Command::Render);
                    }
                    Err(err) => out.push(toast(
                        ToastLevel::Warning,
                        format!("{}. Set a valid contract address before connecting.", err),
                    )),
                },
                SessionPhase::Connected(_) => {
                    out.push(toast(ToastLevel::Info, "Wallet already connected."));
                }
                SessionPhase::Connecting | SessionPhase::Switching => {
                    tracing::debug!("Connect already in progress");
                }
            },

            Msg::SwitchingChain => {
                if self.state.session == SessionPhase::Connecting {
                    self.state.session = SessionPhase::Switching;
                    out.push(Command::Render);
                }
            }

            Msg::Connected { account, chain_id } => {
                if self.is_connecting() {
                    self.state.session = SessionPhase::Connected(Session {
                        account,
                        chain_id,
                        signer_bound: false,
                    });
                    out.push(Command::BindSigner { account });
                    out.push(toast(ToastLevel::Success, "Wallet connected."));
                    out.push(Command::Render);
                }
            }

            Msg::ConnectFailed(err) => {
                if self.is_connecting() {
                    self.state.session = SessionPhase::Disconnected;
                    out.push(toast(ToastLevel::Error, err.to_string()));
                    out.push(Command::Render);
                }
            }

            Msg::SignerBound { account } => {
                if let SessionPhase::Connected(session) = &mut self.state.session {
                    if session.account == account {
                        session.signer_bound = true;
                        out.push(Command::Render);
                    }
                }
            }

            Msg::SignerFailed(err) => {
                out.push(toast(ToastLevel::Error, err.to_string()));
            }

            Msg::DisconnectRequested => self.disconnect(&mut out),

            Msg::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    if self.state.session != SessionPhase::Disconnected {
                        self.disconnect(&mut out);
                    }
                }
                Some(&account) => {
                    if let SessionPhase::Connected(session) = &mut self.state.session {
                        session.account = account;
                        session.signer_bound = false;
                        out.push(Command::BindSigner { account });
                        out.push(Command::Render);
                    }
                }
            },

            Msg::ChainChanged(chain_id) => {
                let account = match &mut self.state.session {
                    SessionPhase::Connected(session) => {
                        session.chain_id = chain_id;
                        session.signer_bound = false;
                        session.account
                    }
                    _ => return out,
                };

                out.push(Command::BindSigner { account });
                if self.state.read_available {
                    out.push(Command::LoadReadPath);
                }
                if chain_id == self.config.target_chain_id {
                    self.request_refresh(RefreshOrigin::Automatic, &mut out);
                } else {
                    out.push(toast(
                        ToastLevel::Warning,
                        "You switched to an unsupported network.",
                    ));
                }
                out.push(Command::Render);
            }

            Msg::ReadPathLoaded { fee, nft_limit } => {
                match fee {
                    Some(fee) => {
                        self.state.cached_fee = Some(fee);
                        self.state.fee_fresh = true;
                    }
                    None => self.state.fee_fresh = false,
                }
                self.state.nft_limit = nft_limit.unwrap_or(self.config.max_nfts_per_side);
                out.push(Command::Render);
            }

            Msg::RefreshRequested => self.request_refresh(RefreshOrigin::Manual, &mut out),

            Msg::VisibilityRestored | Msg::OfferCreated(_) => {
                self.request_refresh(RefreshOrigin::Automatic, &mut out)
            }

            Msg::OffersLoaded(result) => {
                let origin = self.state.refresh.finish();
                match result {
                    Ok(mut offers) => {
                        offers.retain(|offer| offer.is_active);
                        offers.sort_by_key(|offer| offer.expires_at);
                        self.state.offers = offers;
                        self.state.list = ListStatus::Ready;
                        if origin == Some(RefreshOrigin::Manual) {
                            out.push(toast(ToastLevel::Success, "Offers refreshed."));
                        }
                    }
                    Err(err) => {
                        tracing::warn!("Failed to load offers: {}", err);
                        self.state.list = ListStatus::Failed;
                    }
                }
                out.push(Command::Render);
            }

            Msg::CreateRequested(form) => self.create(form, &mut out),

            Msg::AcceptRequested(offer_id) => self.accept(offer_id, now, &mut out),

            Msg::CancelRequested(offer_id) => self.cancel(offer_id, now, &mut out),

            Msg::TxSubmitted { kind, hash } => {
                out.push(toast(ToastLevel::Info, kind.pending_text(&hash)));
            }

            Msg::TxConfirmed { kind } => {
                self.state.activity.finish();
                self.state.last_tx = Some(TxStatus::Confirmed(kind));
                out.push(toast(ToastLevel::Success, kind.success_text()));
                self.request_refresh(RefreshOrigin::Automatic, &mut out);
                out.push(Command::Render);
            }

            Msg::TxFailed { kind, error } => {
                self.state.activity.finish();
                self.state.last_tx = Some(TxStatus::Failed(kind));
                tracing::warn!("{:?} failed: {}", kind, error);
                out.push(toast(ToastLevel::Error, error.to_string()));
                out.push(Command::Render);
            }
        }
        out
    }

    fn is_connecting(&self) -> bool {
        matches!(
            self.state.session,
            SessionPhase::Connecting | SessionPhase::Switching
        )
    }

    fn disconnect(&mut self, out: &mut Vec<Command>) {
        self.state.session = SessionPhase::Disconnected;
        out.push(Command::ReleaseSigner);
        out.push(Command::Render);
    }

    fn request_refresh(&mut self, origin: RefreshOrigin, out: &mut Vec<Command>) {
        if !self.state.read_available {
            self.state.list = ListStatus::NotConfigured;
            out.push(Command::Render);
            return;
        }
        if !self.state.refresh.try_begin(origin) {
            tracing::debug!("Refresh already in flight; coalescing {:?} request", origin);
            return;
        }
        self.state.list = ListStatus::Loading;
        out.push(Command::FetchOffers {
            from_block: self.config.event_query_start_block,
        });
        out.push(Command::Render);
    }

    /// The connected session, if it can sign; otherwise queues a warning.
    fn ready_signer(&self, doing: &str, out: &mut Vec<Command>) -> Option<Session> {
        match self.state.session {
            SessionPhase::Connected(session) if session.signer_bound => Some(session),
            _ => {
                out.push(toast(
                    ToastLevel::Warning,
                    format!("Connect your wallet before {}.", doing),
                ));
                None
            }
        }
    }

    fn ensure_idle(&self, out: &mut Vec<Command>) -> bool {
        if self.state.activity.is_idle() {
            return true;
        }
        out.push(toast(
            ToastLevel::Warning,
            "Another transaction is still pending.",
        ));
        false
    }

    fn submit(&mut self, request: TxRequest, out: &mut Vec<Command>) {
        if self.state.activity.try_begin(TxKind::from(&request)) {
            out.push(Command::Submit(request));
            out.push(Command::Render);
        }
    }

    fn create(&mut self, form: OfferForm, out: &mut Vec<Command>) {
        if self.ready_signer("creating an offer", out).is_none() || !self.ensure_idle(out) {
            return;
        }

        let draft = match form.validate(self.state.nft_limit) {
            Ok(draft) => draft,
            Err(err) => {
                out.push(toast(ToastLevel::Error, err.to_string()));
                return;
            }
        };

        let Some(fee) = self.state.cached_fee else {
            out.push(toast(
                ToastLevel::Error,
                "The offer fee is not known yet; try again shortly.",
            ));
            out.push(Command::LoadReadPath);
            return;
        };

        self.submit(TxRequest::Create { draft, fee }, out);
    }

    fn listed_actions(&self, offer_id: u64, session: Session, now: u64) -> Option<OfferActions> {
        self.state
            .offers
            .iter()
            .find(|offer| offer.offer_id == offer_id)
            .map(|offer| offer.actions(Some(session.account), session.signer_bound, now))
    }

    fn accept(&mut self, offer_id: u64, now: u64, out: &mut Vec<Command>) {
        let Some(session) = self.ready_signer("accepting offers", out) else {
            return;
        };
        if !self.ensure_idle(out) {
            return;
        }

        match self.listed_actions(offer_id, session, now) {
            None => out.push(toast(
                ToastLevel::Error,
                format!("Offer #{} is not in the current list.", offer_id),
            )),
            Some(actions) if actions.accept != AcceptButton::Enabled => out.push(toast(
                ToastLevel::Warning,
                format!("Offer #{} cannot be accepted.", offer_id),
            )),
            Some(_) => self.submit(TxRequest::Accept(offer_id), out),
        }
    }

    fn cancel(&mut self, offer_id: u64, now: u64, out: &mut Vec<Command>) {
        let Some(session) = self.ready_signer("cancelling offers", out) else {
            return;
        };
        if !self.ensure_idle(out) {
            return;
        }

        match self.listed_actions(offer_id, session, now) {
            None => out.push(toast(
                ToastLevel::Error,
                format!("Offer #{} is not in the current list.", offer_id),
            )),
            Some(actions) => match actions.cancel {
                Some(CancelKind::Active) => self.submit(TxRequest::Cancel(offer_id), out),
                Some(CancelKind::Expired) => self.submit(TxRequest::CancelExpired(offer_id), out),
                None => out.push(toast(
                    ToastLevel::Warning,
                    format!("Only the creator can cancel offer #{}.", offer_id),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NftRow;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const NOW: u64 = 1_700_000_000;

    fn config(with_contract: bool) -> SwapConfig {
        SwapConfig::from_lookup(|key| match key {
            "CONTRACT_ADDRESS" if with_contract => Some(CONTRACT.to_string()),
            "EVENT_QUERY_START_BLOCK" => Some("77".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn me() -> Address {
        Address::from_low_u64_be(0xa11ce)
    }

    fn other() -> Address {
        Address::from_low_u64_be(0xb0b)
    }

    fn offer(offer_id: u64, creator: Address, expires_at: u64) -> Offer {
        Offer {
            offer_id,
            creator,
            recipient: None,
            escrowed: vec![],
            requested: vec![],
            expires_at,
            is_active: true,
        }
    }

    fn fetches(commands: &[Command]) -> usize {
        commands
            .iter()
            .filter(|c| matches!(c, Command::FetchOffers { .. }))
            .count()
    }

    fn toasts(commands: &[Command]) -> Vec<(ToastLevel, String)> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Toast(t) => Some((t.level, t.message.clone())),
                _ => None,
            })
            .collect()
    }

    /// Controller after init, one finished load, and a bound signer for `me()`.
    fn connected_with(offers: Vec<Offer>) -> OfferController {
        let mut controller = OfferController::new(config(true));
        controller.update(Msg::Init, NOW);
        controller.update(
            Msg::ReadPathLoaded {
                fee: Some(U256::from(10)),
                nft_limit: Some(3),
            },
            NOW,
        );
        controller.update(Msg::OffersLoaded(Ok(offers)), NOW);
        controller.update(Msg::ConnectRequested, NOW);
        controller.update(
            Msg::Connected {
                account: me(),
                chain_id: 43113,
            },
            NOW,
        );
        controller.update(Msg::SignerBound { account: me() }, NOW);
        controller
    }

    fn valid_form() -> OfferForm {
        OfferForm {
            offered: vec![NftRow::new(CONTRACT, "1")],
            requested: vec![NftRow::new(CONTRACT, "2")],
            duration_hours: "2".to_string(),
        }
    }

    #[test]
    fn init_without_contract_blocks_listing() {
        let mut controller = OfferController::new(config(false));
        let commands = controller.update(Msg::Init, NOW);

        assert_eq!(controller.state().list, ListStatus::NotConfigured);
        assert_eq!(fetches(&commands), 0);
        assert_eq!(toasts(&commands)[0].0, ToastLevel::Warning);

        let commands = controller.update(Msg::RefreshRequested, NOW);
        assert_eq!(fetches(&commands), 0);
    }

    #[test]
    fn init_loads_read_path_and_offers_from_start_block() {
        let mut controller = OfferController::new(config(true));
        let commands = controller.update(Msg::Init, NOW);

        assert!(commands.contains(&Command::LoadReadPath));
        assert!(commands.contains(&Command::FetchOffers { from_block: 77 }));
        assert_eq!(controller.state().list, ListStatus::Loading);
    }

    #[test]
    fn refresh_in_flight_coalesces_new_requests() {
        let mut controller = OfferController::new(config(true));
        assert_eq!(fetches(&controller.update(Msg::Init, NOW)), 1);
        assert_eq!(fetches(&controller.update(Msg::RefreshRequested, NOW)), 0);
        assert_eq!(fetches(&controller.update(Msg::VisibilityRestored, NOW)), 0);

        controller.update(Msg::OffersLoaded(Ok(vec![])), NOW);
        assert_eq!(fetches(&controller.update(Msg::RefreshRequested, NOW)), 1);
    }

    #[test]
    fn manual_refresh_announces_completion() {
        let mut controller = OfferController::new(config(true));
        controller.update(Msg::Init, NOW);
        let quiet = controller.update(Msg::OffersLoaded(Ok(vec![])), NOW);
        assert!(toasts(&quiet).is_empty());

        controller.update(Msg::RefreshRequested, NOW);
        let loud = controller.update(Msg::OffersLoaded(Ok(vec![])), NOW);
        assert_eq!(toasts(&loud), vec![(ToastLevel::Success, "Offers refreshed.".to_string())]);
    }

    #[test]
    fn loaded_offers_replace_list_sorted_and_active_only() {
        let mut controller = OfferController::new(config(true));
        controller.update(Msg::Init, NOW);
        let mut inactive = offer(3, other(), NOW + 10);
        inactive.is_active = false;
        controller.update(
            Msg::OffersLoaded(Ok(vec![offer(1, other(), NOW + 500), inactive, offer(2, other(), NOW + 100)])),
            NOW,
        );
        let ids: Vec<u64> = controller.state().offers.iter().map(|o| o.offer_id).collect();
        assert_eq!(ids, vec![2, 1]);

        controller.update(Msg::RefreshRequested, NOW);
        controller.update(Msg::OffersLoaded(Ok(vec![offer(9, other(), NOW + 1)])), NOW);
        assert_eq!(controller.state().offers.len(), 1);
    }

    #[test]
    fn failed_load_degrades_list_and_reopens_gate() {
        let mut controller = OfferController::new(config(true));
        controller.update(Msg::Init, NOW);
        controller.update(
            Msg::OffersLoaded(Err(SwapError::NetworkFailure("timeout".to_string()))),
            NOW,
        );
        assert_eq!(controller.state().list, ListStatus::Failed);
        assert!(controller.state().refresh.is_idle());
    }

    #[test]
    fn session_walks_through_switching_to_connected() {
        let mut controller = OfferController::new(config(true));
        let commands = controller.update(Msg::ConnectRequested, NOW);
        assert_eq!(controller.state().session, SessionPhase::Connecting);
        assert!(commands.contains(&Command::Connect));

        assert!(controller.update(Msg::ConnectRequested, NOW).is_empty());

        controller.update(Msg::SwitchingChain, NOW);
        assert_eq!(controller.state().session, SessionPhase::Switching);

        let commands = controller.update(
            Msg::Connected {
                account: me(),
                chain_id: 43113,
            },
            NOW,
        );
        assert!(commands.contains(&Command::BindSigner { account: me() }));
        assert_eq!(controller.viewer(), Some(me()));
    }

    #[test]
    fn failed_switch_returns_to_disconnected() {
        let mut controller = OfferController::new(config(true));
        controller.update(Msg::ConnectRequested, NOW);
        controller.update(Msg::SwitchingChain, NOW);
        let commands = controller.update(
            Msg::ConnectFailed(SwapError::UserRejected("User rejected the request.".to_string())),
            NOW,
        );
        assert_eq!(controller.state().session, SessionPhase::Disconnected);
        assert_eq!(
            toasts(&commands),
            vec![(ToastLevel::Error, "User rejected the request.".to_string())]
        );
    }

    #[test]
    fn connect_requires_valid_contract() {
        let mut controller = OfferController::new(config(false));
        let commands = controller.update(Msg::ConnectRequested, NOW);
        assert_eq!(controller.state().session, SessionPhase::Disconnected);
        assert!(!commands.contains(&Command::Connect));
    }

    #[test]
    fn empty_account_list_disconnects() {
        let mut controller = connected_with(vec![]);
        let commands = controller.update(Msg::AccountsChanged(vec![]), NOW);
        assert_eq!(controller.state().session, SessionPhase::Disconnected);
        assert!(commands.contains(&Command::ReleaseSigner));
    }

    #[test]
    fn account_change_rebinds_signer() {
        let mut controller = connected_with(vec![]);
        let commands = controller.update(Msg::AccountsChanged(vec![other()]), NOW);
        assert_eq!(controller.viewer(), Some(other()));
        assert!(commands.contains(&Command::BindSigner { account: other() }));
        assert!(!controller.signer_bound());
    }

    #[test]
    fn chain_change_refreshes_only_on_supported_chain() {
        let mut controller = connected_with(vec![]);
        let commands = controller.update(Msg::ChainChanged(1), NOW);
        assert_eq!(fetches(&commands), 0);
        assert!(commands.contains(&Command::LoadReadPath));
        assert_eq!(
            toasts(&commands),
            vec![(ToastLevel::Warning, "You switched to an unsupported network.".to_string())]
        );

        let commands = controller.update(Msg::ChainChanged(43113), NOW);
        assert_eq!(fetches(&commands), 1);
    }

    #[test]
    fn failed_limit_read_falls_back_to_configured_ceiling() {
        let mut controller = OfferController::new(config(true));
        controller.update(
            Msg::ReadPathLoaded {
                fee: Some(U256::from(5)),
                nft_limit: Some(4),
            },
            NOW,
        );
        controller.update(Msg::ReadPathLoaded { fee: None, nft_limit: None }, NOW);
        assert_eq!(controller.state().nft_limit, 20);
        assert_eq!(controller.state().cached_fee, Some(U256::from(5)));
        assert!(!controller.state().fee_fresh);
    }

    #[test]
    fn create_needs_a_bound_signer() {
        let mut controller = OfferController::new(config(true));
        let commands = controller.update(Msg::CreateRequested(valid_form()), NOW);
        assert_eq!(
            toasts(&commands),
            vec![(
                ToastLevel::Warning,
                "Connect your wallet before creating an offer.".to_string()
            )]
        );
    }

    #[test]
    fn create_submits_with_cached_fee_and_locks() {
        let mut controller = connected_with(vec![]);
        let commands = controller.update(Msg::CreateRequested(valid_form()), NOW);
        let submitted = commands.iter().find_map(|c| match c {
            Command::Submit(TxRequest::Create { draft, fee }) => Some((draft.clone(), *fee)),
            _ => None,
        });
        let (draft, fee) = submitted.expect("create submitted");
        assert_eq!(fee, U256::from(10));
        assert_eq!(draft.duration_secs, U256::from(7_200));

        let again = controller.update(Msg::CreateRequested(valid_form()), NOW);
        assert_eq!(
            toasts(&again),
            vec![(ToastLevel::Warning, "Another transaction is still pending.".to_string())]
        );
    }

    #[test]
    fn invalid_form_is_not_submitted() {
        let mut controller = connected_with(vec![]);
        let mut form = valid_form();
        form.requested.clear();
        let commands = controller.update(Msg::CreateRequested(form), NOW);
        assert!(!commands.iter().any(|c| matches!(c, Command::Submit(_))));
        assert!(controller.state().activity.is_idle());
    }

    #[test]
    fn create_respects_ledger_limit() {
        let mut controller = connected_with(vec![]);
        let mut form = valid_form();
        form.offered = (1..=4).map(|i| NftRow::new(CONTRACT, i.to_string())).collect();
        let commands = controller.update(Msg::CreateRequested(form), NOW);
        assert_eq!(
            toasts(&commands),
            vec![(
                ToastLevel::Error,
                "You can only include up to 3 NFTs on each side.".to_string()
            )]
        );
    }

    #[test]
    fn accept_is_refused_for_own_or_expired_offers() {
        let mut controller = connected_with(vec![
            offer(1, me(), NOW + 100),
            offer(2, other(), NOW - 1),
            offer(3, other(), NOW + 100),
        ]);

        for id in [1, 2] {
            let commands = controller.update(Msg::AcceptRequested(id), NOW);
            assert!(!commands.iter().any(|c| matches!(c, Command::Submit(_))), "offer {}", id);
        }

        let commands = controller.update(Msg::AcceptRequested(3), NOW);
        assert!(commands.contains(&Command::Submit(TxRequest::Accept(3))));
    }

    #[test]
    fn cancel_routes_by_expiry_and_ownership() {
        let mut controller = connected_with(vec![
            offer(1, me(), NOW + 100),
            offer(2, me(), NOW - 100),
            offer(3, other(), NOW + 100),
        ]);

        let commands = controller.update(Msg::CancelRequested(3), NOW);
        assert!(!commands.iter().any(|c| matches!(c, Command::Submit(_))));

        let commands = controller.update(Msg::CancelRequested(2), NOW);
        assert!(commands.contains(&Command::Submit(TxRequest::CancelExpired(2))));
        controller.update(Msg::TxConfirmed { kind: TxKind::CancelExpired(2) }, NOW);
        controller.update(Msg::OffersLoaded(Ok(vec![offer(1, me(), NOW + 100)])), NOW);

        let commands = controller.update(Msg::CancelRequested(1), NOW);
        assert!(commands.contains(&Command::Submit(TxRequest::Cancel(1))));
    }

    #[test]
    fn confirmation_unlocks_and_refreshes() {
        let mut controller = connected_with(vec![offer(3, other(), NOW + 100)]);
        controller.update(Msg::AcceptRequested(3), NOW);

        let hash = TxHash::repeat_byte(0x11);
        let pending = controller.update(Msg::TxSubmitted { kind: TxKind::Accept(3), hash }, NOW);
        assert_eq!(
            toasts(&pending),
            vec![(ToastLevel::Info, "Accepting offer… 0x11111111…111111".to_string())]
        );
        assert!(!controller.state().activity.is_idle());

        let done = controller.update(Msg::TxConfirmed { kind: TxKind::Accept(3) }, NOW);
        assert!(controller.state().activity.is_idle());
        assert_eq!(controller.state().last_tx, Some(TxStatus::Confirmed(TxKind::Accept(3))));
        assert_eq!(fetches(&done), 1);
        assert_eq!(
            toasts(&done),
            vec![(ToastLevel::Success, "Offer accepted! NFTs have been swapped.".to_string())]
        );
    }

    #[test]
    fn failure_unlocks_without_refresh() {
        let mut controller = connected_with(vec![offer(3, other(), NOW + 100)]);
        controller.update(Msg::AcceptRequested(3), NOW);
        let commands = controller.update(
            Msg::TxFailed {
                kind: TxKind::Accept(3),
                error: SwapError::RemoteRevert("Offer expired".to_string()),
            },
            NOW,
        );
        assert!(controller.state().activity.is_idle());
        assert_eq!(controller.state().last_tx, Some(TxStatus::Failed(TxKind::Accept(3))));
        assert_eq!(fetches(&commands), 0);
        assert_eq!(toasts(&commands), vec![(ToastLevel::Error, "Offer expired".to_string())]);
    }

    #[test]
    fn board_hides_foreign_expired_offers_and_gates_accept() {
        let controller = connected_with(vec![offer(1, other(), NOW - 5), offer(2, other(), NOW + 3_600)]);
        let board = controller.board(NOW);

        assert_eq!(board.len(), 1);
        assert_eq!(board[0].offer.offer_id, 2);
        assert_eq!(board[0].actions.accept, AcceptButton::Enabled);
        assert!(board[0].badges.is_empty());
    }

    #[test]
    fn board_keeps_own_expired_offer_for_reclaiming() {
        let controller = connected_with(vec![offer(1, me(), NOW - 5), offer(2, me(), NOW + 60)]);
        let board = controller.board(NOW);

        assert_eq!(board.len(), 2);
        assert_eq!(board[0].actions.cancel, Some(CancelKind::Expired));
        assert_eq!(board[0].badges, vec!["You created this", "Expired"]);
        assert_eq!(board[1].actions.accept, AcceptButton::Hidden);
    }
}
