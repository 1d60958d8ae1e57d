use async_trait::async_trait;
use ethers::contract::ContractCall;
use ethers::prelude::abigen;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::LocalWallet;
use ethers::middleware::SignerMiddleware;
use ethers::abi::Detokenize;
use ethers::types::{Address, BlockNumber, TxHash, U256, U64};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::{contract_failure, provider_failure, SwapError};
use crate::models::{NftItem, Offer, OfferDraft};
use crate::try_join_all;

abigen!(
    NftSwap,
    r#"[
        function fee() external view returns (uint256)
        function MAX_NFTS_PER_SIDE() external view returns (uint256)
        function getOfferDetails(uint256 offerId) external view returns (address creator, address recipient, address[] tokenAContracts, uint256[] tokenAIds, address[] tokenBContracts, uint256[] tokenBIds, uint256 expiresAt, bool isActive)
        function createMultiSwapOffer(address[] tokenAContracts, uint256[] tokenAIds, address[] tokenBContracts, uint256[] tokenBIds, uint256 duration) external payable returns (uint256)
        function acceptMultiSwapOffer(uint256 offerId) external
        function cancelSwapOffer(uint256 offerId) external
        function cancelExpiredOffer(uint256 offerId) external
        event MultiSwapOfferCreated(uint256 indexed offerId, address indexed creator, uint256 expiresAt)
    ]"#
);

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A state-changing ledger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxRequest {
    Create { draft: OfferDraft, fee: U256 },
    Accept(u64),
    Cancel(u64),
    CancelExpired(u64),
}

/// Read-only view of the ledger; needs no wallet.
#[async_trait]
pub trait OfferReader: Send + Sync {
    async fn fee(&self) -> Result<U256, SwapError>;
    async fn max_nfts_per_side(&self) -> Result<u64, SwapError>;
    async fn created_offer_ids(&self, from_block: u64) -> Result<Vec<U256>, SwapError>;
    async fn offer_details(&self, offer_id: U256) -> Result<Offer, SwapError>;
}

/// Signer-bound handle. Submission returns as soon as the transaction has a
/// hash; inclusion is awaited separately.
#[async_trait]
pub trait OfferWriter: Send + Sync {
    async fn submit(&self, request: &TxRequest) -> Result<TxHash, SwapError>;
    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<(), SwapError>;
}

fn small_number(value: U256, what: &str) -> Result<u64, SwapError> {
    if value > U256::from(u64::MAX) {
        return Err(SwapError::NetworkFailure(format!(
            "{} {} does not fit in 64 bits",
            what, value
        )));
    }
    Ok(value.as_u64())
}

pub struct EthersReader {
    contract: NftSwap<Provider<Http>>,
}

impl EthersReader {
    pub fn new(address: Address, rpc_url: &str) -> Result<Self, SwapError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| SwapError::InvalidInput(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;
        let client = Arc::new(provider);
        Ok(EthersReader {
            contract: NftSwap::new(address, client),
        })
    }

    pub fn contract(&self) -> &NftSwap<Provider<Http>> {
        &self.contract
    }
}

#[async_trait]
impl OfferReader for EthersReader {
    async fn fee(&self) -> Result<U256, SwapError> {
        self.contract.fee().call().await.map_err(contract_failure)
    }

    async fn max_nfts_per_side(&self) -> Result<u64, SwapError> {
        let limit = self
            .contract
            .max_nfts_per_side()
            .call()
            .await
            .map_err(contract_failure)?;
        small_number(limit, "MAX_NFTS_PER_SIDE")
    }

    async fn created_offer_ids(&self, from_block: u64) -> Result<Vec<U256>, SwapError> {
        let events = self
            .contract
            .multi_swap_offer_created_filter()
            .from_block(from_block)
            .to_block(BlockNumber::Latest)
            .query()
            .await
            .map_err(contract_failure)?;
        Ok(events.into_iter().map(|event| event.offer_id).collect())
    }

    async fn offer_details(&self, offer_id: U256) -> Result<Offer, SwapError> {
        let (creator, recipient, a_contracts, a_ids, b_contracts, b_ids, expires_at, is_active) = self
            .contract
            .get_offer_details(offer_id)
            .call()
            .await
            .map_err(contract_failure)?;

        Ok(Offer {
            offer_id: small_number(offer_id, "offer id")?,
            creator,
            recipient: (recipient != Address::zero()).then_some(recipient),
            escrowed: NftItem::zip(a_contracts, a_ids),
            requested: NftItem::zip(b_contracts, b_ids),
            expires_at: small_number(expires_at, "expiry")?,
            is_active,
        })
    }
}

pub struct EthersWriter {
    client: Arc<SignerClient>,
    contract: NftSwap<SignerClient>,
}

impl EthersWriter {
    pub fn new(address: Address, client: SignerClient) -> Self {
        let client = Arc::new(client);
        EthersWriter {
            contract: NftSwap::new(address, client.clone()),
            client,
        }
    }

    async fn send<D: Detokenize>(&self, call: ContractCall<SignerClient, D>) -> Result<TxHash, SwapError> {
        let pending = call.send().await.map_err(contract_failure)?;
        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl OfferWriter for EthersWriter {
    async fn submit(&self, request: &TxRequest) -> Result<TxHash, SwapError> {
        match request {
            TxRequest::Create { draft, fee } => {
                let (a_contracts, a_ids) = NftItem::unzip(&draft.escrowed);
                let (b_contracts, b_ids) = NftItem::unzip(&draft.requested);
                let call = self
                    .contract
                    .create_multi_swap_offer(a_contracts, a_ids, b_contracts, b_ids, draft.duration_secs)
                    .value(*fee);
                self.send(call).await
            }
            TxRequest::Accept(id) => self.send(self.contract.accept_multi_swap_offer(U256::from(*id))).await,
            TxRequest::Cancel(id) => self.send(self.contract.cancel_swap_offer(U256::from(*id))).await,
            TxRequest::CancelExpired(id) => {
                self.send(self.contract.cancel_expired_offer(U256::from(*id))).await
            }
        }
    }

    async fn wait_for_inclusion(&self, tx_hash: TxHash) -> Result<(), SwapError> {
        let receipt = PendingTransaction::new(tx_hash, self.client.inner())
            .await
            .map_err(provider_failure)?
            .ok_or_else(|| SwapError::NetworkFailure("Transaction was dropped before inclusion.".to_string()))?;

        if receipt.status == Some(U64::zero()) {
            return Err(SwapError::RemoteRevert("Transaction reverted on-chain.".to_string()));
        }
        Ok(())
    }
}

type OfferTask = JoinHandle<Result<Offer, SwapError>>;

/// Resolves every creation event to its detail record, keeps active offers
/// and orders them by expiry. The result replaces the whole list.
pub async fn load_offers(reader: Arc<dyn OfferReader>, from_block: u64) -> Result<Vec<Offer>, SwapError> {
    let offer_ids = reader.created_offer_ids(from_block).await?;

    let mut handles: Vec<OfferTask> = Vec::new();
    for offer_id in offer_ids {
        let reader_clone: Arc<dyn OfferReader> = Arc::clone(&reader);
        let handle: OfferTask = tokio::spawn(async move { reader_clone.offer_details(offer_id).await });
        handles.push(handle);
    }

    let results = try_join_all(handles)
        .await
        .map_err(|e| SwapError::NetworkFailure(format!("Offer lookup task failed: {}", e)))?;

    let mut offers = results
        .into_iter()
        .collect::<Result<Vec<Offer>, SwapError>>()?
        .into_iter()
        .filter(|offer| offer.is_active)
        .collect::<Vec<Offer>>();
    offers.sort_by_key(|offer| offer.expires_at);

    tracing::debug!("Loaded {} active offers from block {}", offers.len(), from_block);
    Ok(offers)
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryLedger;
    use super::*;

    fn offer(offer_id: u64, expires_at: u64, is_active: bool) -> Offer {
        Offer {
            offer_id,
            creator: Address::from_low_u64_be(9),
            recipient: None,
            escrowed: vec![],
            requested: vec![],
            expires_at,
            is_active,
        }
    }

    #[tokio::test]
    async fn load_offers_keeps_active_sorted_by_expiry() {
        let ledger: Arc<dyn OfferReader> = Arc::new(MemoryLedger::with_offers(vec![
            offer(1, 300, true),
            offer(2, 100, true),
            offer(3, 50, false),
            offer(4, 200, true),
        ]));

        let offers = load_offers(ledger, 0).await.unwrap();
        let ids: Vec<u64> = offers.iter().map(|o| o.offer_id).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[tokio::test]
    async fn load_offers_surfaces_listing_failure() {
        let ledger = MemoryLedger {
            fail_listing: true,
            ..Default::default()
        };
        let result = load_offers(Arc::new(ledger), 0).await;
        assert_eq!(result, Err(SwapError::NetworkFailure("rpc down".to_string())));
    }

    #[test]
    fn oversized_numbers_are_rejected() {
        assert_eq!(small_number(U256::from(7), "id"), Ok(7));
        assert!(small_number(U256::MAX, "id").is_err());
    }
}
