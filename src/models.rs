use ethers::types::{Address, TxHash, U256};
use ethers::utils::{format_ether, to_checksum};
use serde::{Deserialize, Serialize};

use crate::error::SwapError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftItem {
    pub nft_contract: Address,
    pub token_id: U256,
}

impl NftItem {
    /// Pairs the ledger's parallel contract/token-id arrays.
    pub fn zip(contracts: Vec<Address>, token_ids: Vec<U256>) -> Vec<NftItem> {
        contracts
            .into_iter()
            .zip(token_ids)
            .map(|(nft_contract, token_id)| NftItem {
                nft_contract,
                token_id,
            })
            .collect()
    }

    pub fn unzip(items: &[NftItem]) -> (Vec<Address>, Vec<U256>) {
        items
            .iter()
            .map(|item| (item.nft_contract, item.token_id))
            .unzip()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: u64,
    pub creator: Address,
    pub recipient: Option<Address>,
    pub escrowed: Vec<NftItem>,
    pub requested: Vec<NftItem>,
    pub expires_at: u64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    Active,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptButton {
    Hidden,
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferActions {
    pub accept: AcceptButton,
    pub cancel: Option<CancelKind>,
}

impl Offer {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    pub fn is_owned_by(&self, viewer: Option<Address>) -> bool {
        viewer.map_or(false, |account| account == self.creator)
    }

    /// Accept is only enabled for live offers the viewer does not own;
    /// cancel is only offered to the owner.
    pub fn actions(&self, viewer: Option<Address>, signer_bound: bool, now: u64) -> OfferActions {
        if self.is_owned_by(viewer) {
            let cancel = if self.is_expired(now) {
                CancelKind::Expired
            } else {
                CancelKind::Active
            };
            return OfferActions {
                accept: AcceptButton::Hidden,
                cancel: Some(cancel),
            };
        }

        let accept = if self.is_expired(now) || !signer_bound {
            AcceptButton::Disabled
        } else {
            AcceptButton::Enabled
        };
        OfferActions {
            accept,
            cancel: None,
        }
    }

    pub fn badges(&self, viewer: Option<Address>, now: u64) -> Vec<&'static str> {
        let mut badges = Vec::new();
        if self.is_owned_by(viewer) {
            badges.push("You created this");
        }
        if self.is_expired(now) {
            badges.push("Expired");
        }
        if self.recipient.is_some() {
            badges.push("Accepted");
        }
        badges
    }
}

/// One user-entered row of the create form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NftRow {
    pub contract: String,
    pub token_id: String,
}

impl NftRow {
    pub fn new(contract: impl Into<String>, token_id: impl Into<String>) -> Self {
        NftRow {
            contract: contract.into(),
            token_id: token_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferForm {
    pub offered: Vec<NftRow>,
    pub requested: Vec<NftRow>,
    pub duration_hours: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferDraft {
    pub escrowed: Vec<NftItem>,
    pub requested: Vec<NftItem>,
    pub duration_secs: U256,
}

const SECONDS_PER_HOUR: u64 = 3600;

impl OfferForm {
    pub fn validate(&self, nft_limit: u64) -> Result<OfferDraft, SwapError> {
        let escrowed = read_rows(&self.offered, nft_limit)?;
        let requested = read_rows(&self.requested, nft_limit)?;
        if escrowed.is_empty() || requested.is_empty() {
            return Err(SwapError::InvalidInput(
                "You must specify at least one NFT on each side.".to_string(),
            ));
        }

        let hours = self
            .duration_hours
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| {
                SwapError::InvalidInput("Duration must be a positive number of hours.".to_string())
            })?;

        Ok(OfferDraft {
            escrowed,
            requested,
            duration_secs: U256::from(hours as u64) * U256::from(SECONDS_PER_HOUR),
        })
    }
}

fn read_rows(rows: &[NftRow], nft_limit: u64) -> Result<Vec<NftItem>, SwapError> {
    let mut items = Vec::new();
    for row in rows {
        let contract = row.contract.trim();
        let token = row.token_id.trim();
        if contract.is_empty() && token.is_empty() {
            continue;
        }

        let nft_contract = parse_address(contract).ok_or_else(|| {
            SwapError::InvalidInput(format!("Invalid NFT contract address: {}", contract))
        })?;
        if token.is_empty() {
            return Err(SwapError::InvalidInput(
                "Token ID is required for each NFT.".to_string(),
            ));
        }
        let token_id = U256::from_dec_str(token)
            .map_err(|_| SwapError::InvalidInput(format!("Invalid token ID: {}", token)))?;

        items.push(NftItem {
            nft_contract,
            token_id,
        });
    }

    if items.len() as u64 > nft_limit {
        return Err(SwapError::InvalidInput(format!(
            "You can only include up to {} NFTs on each side.",
            nft_limit
        )));
    }
    Ok(items)
}

/// Accepts `0x` + 40 hex digits. Mixed-case input must carry a valid
/// EIP-55 checksum; all-lower or all-upper input is normalized.
pub fn parse_address(value: &str) -> Option<Address> {
    let hex_part = value.strip_prefix("0x")?;
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let address: Address = value.parse().ok()?;

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address, None) != value {
        return None;
    }
    Some(address)
}

pub fn shorten_address(address: &Address) -> String {
    let full = to_checksum(address, None);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

pub fn shorten_hash(hash: &TxHash) -> String {
    let full = format!("0x{}", hex::encode(hash.as_bytes()));
    format!("{}…{}", &full[..10], &full[full.len() - 6..])
}

pub fn format_countdown(expires_at: u64, now: u64) -> String {
    if expires_at <= now {
        return "Expired".to_string();
    }
    let diff = expires_at - now;
    let hours = diff / 3600;
    let minutes = (diff % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn format_fee(fee: U256, symbol: &str) -> String {
    format!("{} {}", format_ether(fee), symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NFT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn offer(creator: Address, expires_at: u64) -> Offer {
        Offer {
            offer_id: 1,
            creator,
            recipient: None,
            escrowed: vec![],
            requested: vec![],
            expires_at,
            is_active: true,
        }
    }

    #[test]
    fn owner_gets_cancel_routed_by_expiry() {
        let me = Address::from_low_u64_be(1);
        let live = offer(me, 2_000);
        let stale = offer(me, 1_000);

        assert_eq!(
            live.actions(Some(me), true, 1_500),
            OfferActions {
                accept: AcceptButton::Hidden,
                cancel: Some(CancelKind::Active)
            }
        );
        assert_eq!(stale.actions(Some(me), true, 1_500).cancel, Some(CancelKind::Expired));
    }

    #[test]
    fn accept_requires_live_offer_and_signer() {
        let creator = Address::from_low_u64_be(1);
        let viewer = Some(Address::from_low_u64_be(2));
        let live = offer(creator, 2_000);

        assert_eq!(live.actions(viewer, true, 1_000).accept, AcceptButton::Enabled);
        assert_eq!(live.actions(viewer, false, 1_000).accept, AcceptButton::Disabled);
        assert_eq!(live.actions(viewer, true, 2_000).accept, AcceptButton::Disabled);
        assert_eq!(live.actions(viewer, true, 1_000).cancel, None);
    }

    #[test]
    fn form_builds_draft_with_hours_in_seconds() {
        let form = OfferForm {
            offered: vec![NftRow::new(NFT, "1"), NftRow::default()],
            requested: vec![NftRow::new(NFT.to_lowercase(), "42")],
            duration_hours: "24".to_string(),
        };
        let draft = form.validate(20).unwrap();
        assert_eq!(draft.escrowed.len(), 1);
        assert_eq!(draft.requested[0].token_id, U256::from(42));
        assert_eq!(draft.duration_secs, U256::from(86_400));
    }

    #[test]
    fn form_rejects_empty_side() {
        let form = OfferForm {
            offered: vec![NftRow::new(NFT, "1")],
            requested: vec![NftRow::default()],
            duration_hours: "1".to_string(),
        };
        assert_eq!(
            form.validate(20),
            Err(SwapError::InvalidInput(
                "You must specify at least one NFT on each side.".to_string()
            ))
        );
    }

    #[test]
    fn form_rejects_missing_token_and_bad_duration() {
        let missing_token = OfferForm {
            offered: vec![NftRow::new(NFT, "")],
            requested: vec![NftRow::new(NFT, "2")],
            duration_hours: "1".to_string(),
        };
        assert!(matches!(missing_token.validate(20), Err(SwapError::InvalidInput(m)) if m.contains("Token ID")));

        for hours in ["0", "-3", "soon", ""] {
            let form = OfferForm {
                offered: vec![NftRow::new(NFT, "1")],
                requested: vec![NftRow::new(NFT, "2")],
                duration_hours: hours.to_string(),
            };
            assert!(form.validate(20).is_err(), "duration {:?} accepted", hours);
        }
    }

    #[test]
    fn form_enforces_per_side_limit() {
        let form = OfferForm {
            offered: vec![NftRow::new(NFT, "1"), NftRow::new(NFT, "2"), NftRow::new(NFT, "3")],
            requested: vec![NftRow::new(NFT, "4")],
            duration_hours: "1".to_string(),
        };
        assert!(form.validate(2).is_err());
        assert!(form.validate(3).is_ok());
    }

    #[test]
    fn parse_address_checks_shape_and_checksum() {
        assert!(parse_address(NFT).is_some());
        assert!(parse_address(&NFT.to_lowercase()).is_some());
        assert!(parse_address("0x5fbDB2315678afecb367f032d93F642f64180aa3").is_none());
        assert!(parse_address("5FbDB2315678afecb367f032d93F642f64180aa3").is_none());
        assert!(parse_address("0xYourContractAddress").is_none());
    }

    #[test]
    fn countdown_formats() {
        assert_eq!(format_countdown(100, 100), "Expired");
        assert_eq!(format_countdown(100 + 7_500, 100), "2h 5m");
        assert_eq!(format_countdown(100 + 59, 100), "0m");
        assert_eq!(format_countdown(100 + 600, 100), "10m");
    }

    #[test]
    fn short_forms() {
        let address: Address = NFT.parse().unwrap();
        assert_eq!(shorten_address(&address), "0x5FbD…0aa3");
        let hash = TxHash::repeat_byte(0xab);
        assert_eq!(shorten_hash(&hash), "0xabababab…ababab");
    }

    #[test]
    fn fee_is_shown_in_ether() {
        let fee = U256::exp10(16);
        assert!(format_fee(fee, "AVAX").starts_with("0.01"));
        assert!(format_fee(fee, "AVAX").ends_with(" AVAX"));
    }
}
