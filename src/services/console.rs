use crate::models::{format_countdown, format_fee, shorten_address, AcceptButton, CancelKind, NftItem};
use crate::services::controller::{ListStatus, Msg, OfferCard, OfferController, SessionPhase, Toast, ToastLevel};
use crate::services::runtime::Presenter;

/// Prints toasts and the offer board to stdout.
pub struct ConsolePresenter {
    quiet_render: bool,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        ConsolePresenter { quiet_render: false }
    }

    /// Only toasts are printed; callers print `render_board` themselves.
    pub fn toasts_only() -> Self {
        ConsolePresenter { quiet_render: true }
    }
}

impl Presenter for ConsolePresenter {
    fn toast(&self, toast: &Toast) {
        println!("{}", toast_line(toast));
    }

    fn render(&self, controller: &OfferController, now: u64) {
        if !self.quiet_render {
            print!("{}", render_board(controller, now));
        }
    }
}

pub fn toast_line(toast: &Toast) -> String {
    let tag = match toast.level {
        ToastLevel::Info => "info",
        ToastLevel::Success => "ok",
        ToastLevel::Warning => "warn",
        ToastLevel::Error => "error",
    };
    format!("[{}] {}", tag, toast.message)
}

fn session_line(controller: &OfferController) -> String {
    match controller.state().session {
        SessionPhase::Disconnected => "Wallet: not connected".to_string(),
        SessionPhase::Connecting => "Wallet: connecting…".to_string(),
        SessionPhase::Switching => "Wallet: switching network…".to_string(),
        SessionPhase::Connected(session) => format!(
            "Wallet: {} on {}",
            shorten_address(&session.account),
            controller.config().network_label(session.chain_id)
        ),
    }
}

fn fee_line(controller: &OfferController) -> String {
    let state = controller.state();
    match state.cached_fee {
        Some(fee) if state.fee_fresh => {
            format!("Fee: {}", format_fee(fee, controller.config().native_symbol()))
        }
        _ => "Fee: --".to_string(),
    }
}

fn items(items: &[NftItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} #{}", shorten_address(&item.nft_contract), item.token_id))
        .collect::<Vec<String>>()
        .join(", ")
}

fn card_lines(card: &OfferCard<'_>, now: u64) -> String {
    let offer = card.offer;
    let mut out = format!("#{} by {}", offer.offer_id, shorten_address(&offer.creator));
    for badge in &card.badges {
        out.push_str(&format!(" [{}]", badge));
    }
    out.push('\n');
    out.push_str(&format!("    gives: {}\n", items(&offer.escrowed)));
    out.push_str(&format!("    wants: {}\n", items(&offer.requested)));
    out.push_str(&format!("    expires in: {}\n", format_countdown(offer.expires_at, now)));

    let mut actions = Vec::new();
    match card.actions.accept {
        AcceptButton::Enabled => actions.push(format!("accept {}", offer.offer_id)),
        AcceptButton::Disabled => actions.push("accept (connect wallet)".to_string()),
        AcceptButton::Hidden => {}
    }
    match card.actions.cancel {
        Some(CancelKind::Active) => actions.push(format!("cancel {}", offer.offer_id)),
        Some(CancelKind::Expired) => actions.push(format!("cancel {} (expired)", offer.offer_id)),
        None => {}
    }
    if !actions.is_empty() {
        out.push_str(&format!("    actions: {}\n", actions.join(" | ")));
    }
    out
}

pub fn render_board(controller: &OfferController, now: u64) -> String {
    let mut lines = vec![
        session_line(controller),
        format!(
            "{} | Max NFTs per side: {}",
            fee_line(controller),
            controller.state().nft_limit
        ),
    ];

    match controller.state().list {
        ListStatus::NotConfigured => lines.push("Offers unavailable: contract address not configured.".to_string()),
        ListStatus::Loading => lines.push("Loading offers…".to_string()),
        ListStatus::Failed => lines.push("Could not load offers.".to_string()),
        ListStatus::Ready => {
            let board = controller.board(now);
            if board.is_empty() {
                lines.push("No active offers.".to_string());
            }
            for card in &board {
                lines.push(card_lines(card, now).trim_end().to_string());
            }
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Commands accepted on stdin while watching.
pub fn parse_watch_command(line: &str) -> Result<Msg, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default().to_ascii_lowercase();
    let offer_id = |word: Option<&str>| {
        word.and_then(|w| w.trim_start_matches('#').parse::<u64>().ok())
            .ok_or_else(|| format!("Usage: {} <offer id>", command))
    };

    match command.as_str() {
        "refresh" => Ok(Msg::RefreshRequested),
        "connect" => Ok(Msg::ConnectRequested),
        "disconnect" => Ok(Msg::DisconnectRequested),
        "accept" => Ok(Msg::AcceptRequested(offer_id(words.next())?)),
        "cancel" => Ok(Msg::CancelRequested(offer_id(words.next())?)),
        _ => Err("Commands: refresh | connect | disconnect | accept <id> | cancel <id>".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwapConfig;
    use crate::models::Offer;
    use ethers::types::{Address, U256};

    const NOW: u64 = 1_700_000_000;

    fn controller() -> OfferController {
        let config = SwapConfig::from_lookup(|key| {
            (key == "CONTRACT_ADDRESS").then(|| "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string())
        })
        .unwrap();
        OfferController::new(config)
    }

    #[test]
    fn toast_lines_are_tagged() {
        let toast = Toast {
            level: ToastLevel::Warning,
            message: "Another transaction is still pending.".to_string(),
        };
        assert_eq!(toast_line(&toast), "[warn] Another transaction is still pending.");
    }

    #[test]
    fn board_shows_placeholder_fee_and_offer_details() {
        let mut controller = controller();
        controller.update(Msg::Init, NOW);
        controller.update(
            Msg::OffersLoaded(Ok(vec![Offer {
                offer_id: 4,
                creator: Address::from_low_u64_be(7),
                recipient: None,
                escrowed: vec![NftItem {
                    nft_contract: Address::from_low_u64_be(1),
                    token_id: U256::from(12),
                }],
                requested: vec![],
                expires_at: NOW + 2 * 3600 + 300,
                is_active: true,
            }])),
            NOW,
        );

        let text = render_board(&controller, NOW);
        assert!(text.contains("Wallet: not connected"));
        assert!(text.contains("Fee: --"));
        assert!(text.contains("#4 by 0x0000…0007"));
        assert!(text.contains("#12"));
        assert!(text.contains("expires in: 2h 5m"));
        assert!(text.contains("accept (connect wallet)"));
    }

    #[test]
    fn board_shows_fee_once_read() {
        let mut controller = controller();
        controller.update(Msg::Init, NOW);
        controller.update(
            Msg::ReadPathLoaded {
                fee: Some(U256::exp10(16)),
                nft_limit: Some(5),
            },
            NOW,
        );
        let text = render_board(&controller, NOW);
        assert!(text.contains("Fee: 0.01"));
        assert!(text.contains("AVAX | Max NFTs per side: 5"));
        assert!(text.contains("Loading offers…"));
    }

    #[test]
    fn watch_commands_map_to_messages() {
        assert_eq!(parse_watch_command("refresh"), Ok(Msg::RefreshRequested));
        assert_eq!(parse_watch_command(" Disconnect "), Ok(Msg::DisconnectRequested));
        assert_eq!(parse_watch_command("accept 7"), Ok(Msg::AcceptRequested(7)));
        assert_eq!(parse_watch_command("cancel #3"), Ok(Msg::CancelRequested(3)));
        assert_eq!(
            parse_watch_command("accept"),
            Err("Usage: accept <offer id>".to_string())
        );
        assert!(parse_watch_command("sell 4").is_err());
    }
}
