use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::sync::{Arc, Mutex, RwLock};

use crate::config::{ChainParams, SwapConfig};
use crate::error::{normalize, provider_failure, ProviderFault, SwapError, UNRECOGNIZED_CHAIN_CODE};
use crate::services::ledger::{EthersWriter, OfferWriter};

/// The wallet a user connects with: hands out accounts, reports and switches
/// chains, and binds a transaction-capable ledger handle to an account.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, SwapError>;
    async fn chain_id(&self) -> Result<u64, SwapError>;
    /// Errors are returned raw so the caller can react to code 4902.
    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), ProviderFault>;
    async fn add_chain(&self, params: &ChainParams) -> Result<(), SwapError>;
    async fn signer_handle(&self, account: Address) -> Result<Arc<dyn OfferWriter>, SwapError>;
    /// Account and chain changes since the previous call.
    async fn poll_changes(&self) -> Result<Vec<WalletEvent>, SwapError>;
}

/// Notifications a wallet raises on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub account: Address,
    pub chain_id: u64,
}

/// Requests accounts, then makes sure the wallet sits on the target chain,
/// switching (or adding) it when needed. `on_switch` fires before a switch.
pub async fn connect<F>(
    wallet: &dyn WalletProvider,
    config: &SwapConfig,
    on_switch: F,
) -> Result<Connection, SwapError>
where
    F: FnOnce() + Send,
{
    let accounts = wallet.request_accounts().await?;
    let account = *accounts
        .first()
        .ok_or_else(|| SwapError::UserRejected("No account was authorised.".to_string()))?;

    let mut chain_id = wallet.chain_id().await?;
    if chain_id != config.target_chain_id {
        on_switch();
        switch_network(wallet, config).await?;
        chain_id = wallet.chain_id().await?;
        if chain_id != config.target_chain_id {
            return Err(SwapError::ChainMismatch(format!(
                "Wallet is on chain {}, expected {}.",
                chain_id, config.target_chain_id
            )));
        }
    }

    Ok(Connection { account, chain_id })
}

async fn switch_network(wallet: &dyn WalletProvider, config: &SwapConfig) -> Result<(), SwapError> {
    let params = config.chain_params()?;
    match wallet.switch_chain(&params.chain_id).await {
        Ok(()) => {
            tracing::info!("Switched to {}.", params.chain_name);
            Ok(())
        }
        Err(fault) if fault.code == Some(UNRECOGNIZED_CHAIN_CODE) => {
            tracing::info!("{} unknown to wallet; adding it", params.chain_name);
            wallet.add_chain(params).await
        }
        Err(fault) => Err(normalize(fault)),
    }
}

/// A wallet backed by a local private key. It "lives" on whatever chain its
/// RPC endpoint serves, so switching succeeds only if that endpoint already
/// serves the requested chain, and adding a chain repoints the endpoint.
pub struct LocalWalletProvider {
    wallet: LocalWallet,
    contract_address: Address,
    provider: RwLock<Provider<Http>>,
    seen_chain: Mutex<Option<u64>>,
}

impl LocalWalletProvider {
    pub fn new(private_key: &str, rpc_url: &str, contract_address: Address) -> Result<Self, SwapError> {
        let wallet: LocalWallet = private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| SwapError::InvalidInput("PRIVATE_KEY is not a valid secp256k1 key.".to_string()))?;
        Ok(LocalWalletProvider {
            wallet,
            contract_address,
            provider: RwLock::new(http_provider(rpc_url)?),
            seen_chain: Mutex::new(None),
        })
    }

    /// Stores the chain last reported and returns the one it replaced.
    fn observe_chain(&self, chain_id: u64) -> Option<u64> {
        let mut seen = match self.seen_chain.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.replace(chain_id)
    }

    fn current_provider(&self) -> Provider<Http> {
        match self.provider.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_provider(&self, provider: Provider<Http>) {
        match self.provider.write() {
            Ok(mut guard) => *guard = provider,
            Err(poisoned) => *poisoned.into_inner() = provider,
        }
    }
}

fn http_provider(rpc_url: &str) -> Result<Provider<Http>, SwapError> {
    Provider::<Http>::try_from(rpc_url)
        .map_err(|e| SwapError::InvalidInput(format!("Invalid RPC URL {}: {}", rpc_url, e)))
}

async fn provider_chain_id(provider: &Provider<Http>) -> Result<u64, SwapError> {
    Ok(provider.get_chainid().await.map_err(provider_failure)?.as_u64())
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, SwapError> {
        Ok(vec![self.wallet.address()])
    }

    async fn chain_id(&self) -> Result<u64, SwapError> {
        let chain_id = provider_chain_id(&self.current_provider()).await?;
        self.observe_chain(chain_id);
        Ok(chain_id)
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), ProviderFault> {
        let wanted = u64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)
            .map_err(|_| ProviderFault::with_code(-32602, format!("Invalid chain id {}", chain_id_hex)))?;
        let serving = self
            .chain_id()
            .await
            .map_err(|e| ProviderFault::with_code(-32603, e.to_string()))?;
        if serving == wanted {
            Ok(())
        } else {
            Err(ProviderFault::with_code(
                UNRECOGNIZED_CHAIN_CODE,
                format!("Unrecognized chain ID \"{}\".", chain_id_hex),
            ))
        }
    }

    async fn add_chain(&self, params: &ChainParams) -> Result<(), SwapError> {
        let rpc_url = params
            .rpc_urls
            .first()
            .ok_or_else(|| SwapError::InvalidInput("Target network has no RPC URL.".to_string()))?;
        let provider = http_provider(rpc_url)?;
        let served = provider_chain_id(&provider).await?;
        if Some(served) != params.numeric_chain_id() {
            return Err(SwapError::ChainMismatch(format!(
                "{} serves chain {}, not {}.",
                rpc_url, served, params.chain_id
            )));
        }
        self.replace_provider(provider);
        tracing::info!("Added {} via {}", params.chain_name, rpc_url);
        Ok(())
    }

    async fn signer_handle(&self, account: Address) -> Result<Arc<dyn OfferWriter>, SwapError> {
        if account != self.wallet.address() {
            return Err(SwapError::UserRejected(
                "That account is not managed by this wallet.".to_string(),
            ));
        }
        let provider = self.current_provider();
        let chain_id = provider_chain_id(&provider).await?;
        let client = SignerMiddleware::new(provider, self.wallet.clone().with_chain_id(chain_id));
        Ok(Arc::new(EthersWriter::new(self.contract_address, client)))
    }

    /// The key never changes accounts; the endpoint may start serving
    /// another chain.
    async fn poll_changes(&self) -> Result<Vec<WalletEvent>, SwapError> {
        let chain_id = provider_chain_id(&self.current_provider()).await?;
        Ok(changed_chain(self.observe_chain(chain_id), chain_id)
            .into_iter()
            .collect())
    }
}

fn changed_chain(previous: Option<u64>, current: u64) -> Option<WalletEvent> {
    match previous {
        Some(previous) if previous != current => Some(WalletEvent::ChainChanged(current)),
        _ => None,
    }
}
