use ethers::types::Address;
use serde::Serialize;
use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::models::parse_address;

const DEFAULT_CHAIN_ID: u64 = 43113;
const DEFAULT_CHAIN_NAME: &str = "Avalanche Fuji";
const DEFAULT_RPC_URL: &str = "https://api.avax-test.network/ext/bc/C/rpc";
const DEFAULT_EXPLORER_URL: &str = "https://testnet.snowtrace.io";
const DEFAULT_MAX_NFTS_PER_SIDE: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Parameters for `wallet_addEthereumChain`, serialized in the wallet's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl ChainParams {
    pub fn numeric_chain_id(&self) -> Option<u64> {
        u64::from_str_radix(self.chain_id.trim_start_matches("0x"), 16).ok()
    }
}

#[derive(Debug, Clone)]
pub struct SwapConfig {
    pub contract_address: String,
    pub target_chain_id: u64,
    pub chain_params: Option<ChainParams>,
    pub read_rpc_url: String,
    pub event_query_start_block: u64,
    pub max_nfts_per_side: u64,
    pub private_key: Option<String>,
    pub activity_log: PathBuf,
}

impl SwapConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target_chain_id = match var("TARGET_CHAIN_ID") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                var: "TARGET_CHAIN_ID",
                value,
            })?,
            None => DEFAULT_CHAIN_ID,
        };

        let chain_rpc_url = var("CHAIN_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let chain_params = var("CHAIN_NAME")
            .or_else(|| (target_chain_id == DEFAULT_CHAIN_ID).then(|| DEFAULT_CHAIN_NAME.to_string()))
            .map(|chain_name| ChainParams {
                chain_id: format!("0x{:X}", target_chain_id),
                chain_name,
                native_currency: NativeCurrency {
                    name: var("NATIVE_CURRENCY_NAME").unwrap_or_else(|| "Avalanche".to_string()),
                    symbol: var("NATIVE_CURRENCY_SYMBOL").unwrap_or_else(|| "AVAX".to_string()),
                    decimals: var("NATIVE_CURRENCY_DECIMALS")
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(18),
                },
                rpc_urls: vec![chain_rpc_url.clone()],
                block_explorer_urls: var("BLOCK_EXPLORER_URL")
                    .or_else(|| Some(DEFAULT_EXPLORER_URL.to_string()))
                    .into_iter()
                    .collect(),
            });

        let event_query_start_block = match var("EVENT_QUERY_START_BLOCK") {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!("EVENT_QUERY_START_BLOCK {:?} is not a block number; using 0", value);
                0
            }),
            None => 0,
        };

        let max_nfts_per_side = match var("MAX_NFTS_PER_SIDE") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                var: "MAX_NFTS_PER_SIDE",
                value,
            })?,
            None => DEFAULT_MAX_NFTS_PER_SIDE,
        };

        Ok(SwapConfig {
            contract_address: var("CONTRACT_ADDRESS").unwrap_or_default(),
            target_chain_id,
            chain_params,
            read_rpc_url: var("READ_RPC_URL").unwrap_or(chain_rpc_url),
            event_query_start_block,
            max_nfts_per_side,
            private_key: var("PRIVATE_KEY"),
            activity_log: var("ACTIVITY_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs/activity.log")),
        })
    }

    /// Warns about settings that will disable part of the client.
    pub fn validate(&self) {
        if let Err(err) = self.contract_address() {
            tracing::warn!("{}; offers cannot be loaded", err);
        }
        if self.chain_params.is_none() {
            tracing::warn!("CHAIN_NAME is not set; automatic network switching is disabled");
        }
        if self.max_nfts_per_side == 0 {
            tracing::warn!("MAX_NFTS_PER_SIDE is 0; no offer can be created until the ledger reports its limit");
        }
        if self.private_key.is_none() {
            tracing::info!("PRIVATE_KEY is not set; running read-only");
        }
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        if self.contract_address.is_empty() {
            return Err(ConfigError::MissingContractAddress);
        }
        parse_address(&self.contract_address)
            .ok_or_else(|| ConfigError::InvalidContractAddress(self.contract_address.clone()))
    }

    pub fn chain_params(&self) -> Result<&ChainParams, ConfigError> {
        self.chain_params.as_ref().ok_or(ConfigError::MissingChainParams)
    }

    pub fn native_symbol(&self) -> &str {
        self.chain_params
            .as_ref()
            .map(|p| p.native_currency.symbol.as_str())
            .unwrap_or("ETH")
    }

    pub fn network_label(&self, chain_id: u64) -> String {
        match &self.chain_params {
            Some(params) if params.numeric_chain_id() == Some(chain_id) => {
                format!("{} ({})", params.chain_name, chain_id)
            }
            _ => format!("Chain ID {}", chain_id),
        }
    }
}
