use ethers::contract::ContractError;
use ethers::providers::{JsonRpcError, Middleware, MiddlewareError, ProviderError, RpcError};
use thiserror::Error;

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 / MetaMask code for `wallet_switchEthereumChain` on an unknown chain.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Every failure the offer client can surface. The payload is the text shown
/// to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("{0}")]
    UserRejected(String),

    #[error("{0}")]
    ChainMismatch(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    RemoteRevert(String),

    #[error("{0}")]
    NetworkFailure(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CONTRACT_ADDRESS is not set")]
    MissingContractAddress,

    #[error("CONTRACT_ADDRESS is not a valid address: {0}")]
    InvalidContractAddress(String),

    #[error("Target network configuration missing.")]
    MissingChainParams,

    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("PRIVATE_KEY is not set; a wallet is required for this command")]
    MissingPrivateKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BattleError {
    #[error("Wait for the current turn to finish.")]
    Busy,

    #[error("The battle is over. Restart to play again.")]
    Finished,

    #[error("Press play to start a battle.")]
    NotStarted,

    #[error("No {0} left.")]
    OutOfItem(&'static str),

    #[error("That action is not available from this menu.")]
    WrongMenu,

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

impl From<ConfigError> for SwapError {
    fn from(err: ConfigError) -> Self {
        SwapError::InvalidInput(err.to_string())
    }
}

/// The loosely shaped error a wallet or node hands back. Any field may be
/// missing; [`normalize`] turns it into a [`SwapError`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFault {
    pub code: Option<i64>,
    /// `error.error.message`: the message of a wrapped JSON-RPC error.
    pub error_message: Option<String>,
    /// `error.data.message`: the message nested in the error's data payload.
    pub data_message: Option<String>,
    /// Decoded revert reason.
    pub reason: Option<String>,
    pub message: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ProviderFault {
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        ProviderFault {
            code: Some(code),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// First non-empty of: wrapped error message, data message, revert
    /// reason, first line of the generic message.
    pub fn display_message(&self) -> Option<String> {
        non_empty(&self.error_message)
            .or_else(|| non_empty(&self.data_message))
            .or_else(|| non_empty(&self.reason))
            .map(str::to_string)
            .or_else(|| {
                non_empty(&self.message)
                    .and_then(|m| m.lines().next())
                    .map(|line| line.trim().to_string())
            })
    }

    fn absorb_rpc(&mut self, response: &JsonRpcError) {
        self.code = Some(response.code);
        self.error_message = Some(response.message.clone());
        self.data_message = response
            .data
            .as_ref()
            .and_then(|data| data.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);
        if self.reason.is_none() {
            if let Some(reason) = response.message.strip_prefix("execution reverted: ") {
                self.reason = Some(reason.to_string());
            } else if response.message == "execution reverted" {
                self.reason = Some(response.message.clone());
            }
        }
    }

    pub fn from_contract_error<M: Middleware>(err: &ContractError<M>) -> Self {
        let mut fault = ProviderFault {
            message: Some(err.to_string()),
            ..Default::default()
        };

        if let Some(reason) = err.decode_revert::<String>() {
            fault.reason = Some(reason);
        } else if err.is_revert() {
            fault.reason = Some("execution reverted".to_string());
        }

        let response = match err {
            ContractError::MiddlewareError { e } => MiddlewareError::as_error_response(e),
            ContractError::ProviderError { e } => RpcError::as_error_response(e),
            _ => None,
        };
        if let Some(response) = response {
            fault.absorb_rpc(response);
        }
        fault
    }
}

impl From<&ProviderError> for ProviderFault {
    fn from(err: &ProviderError) -> Self {
        let mut fault = ProviderFault {
            message: Some(err.to_string()),
            ..Default::default()
        };
        if let Some(response) = RpcError::as_error_response(err) {
            fault.absorb_rpc(response);
        }
        fault
    }
}

/// Maps any inbound provider or ledger error onto one [`SwapError`] variant.
pub fn normalize(fault: ProviderFault) -> SwapError {
    let text = fault
        .display_message()
        .unwrap_or_else(|| "Unknown provider error".to_string());

    match fault.code {
        Some(USER_REJECTED_CODE) => SwapError::UserRejected(text),
        Some(UNRECOGNIZED_CHAIN_CODE) => SwapError::ChainMismatch(text),
        _ if fault.reason.is_some() => SwapError::RemoteRevert(text),
        _ => SwapError::NetworkFailure(text),
    }
}

pub fn contract_failure<M: Middleware>(err: ContractError<M>) -> SwapError {
    normalize(ProviderFault::from_contract_error(&err))
}

pub fn provider_failure(err: ProviderError) -> SwapError {
    normalize(ProviderFault::from(&err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fault() -> ProviderFault {
        ProviderFault {
            code: Some(-32603),
            error_message: Some("insufficient funds for gas".to_string()),
            data_message: Some("data says no".to_string()),
            reason: Some("Fee mismatch".to_string()),
            message: Some("top level\nstack line".to_string()),
        }
    }

    #[test]
    fn wrapped_error_message_wins() {
        assert_eq!(
            full_fault().display_message().as_deref(),
            Some("insufficient funds for gas")
        );
    }

    #[test]
    fn precedence_falls_through_empty_fields() {
        let mut fault = full_fault();
        fault.error_message = Some("   ".to_string());
        assert_eq!(fault.display_message().as_deref(), Some("data says no"));

        fault.data_message = None;
        assert_eq!(fault.display_message().as_deref(), Some("Fee mismatch"));

        fault.reason = None;
        assert_eq!(fault.display_message().as_deref(), Some("top level"));

        fault.message = None;
        assert_eq!(fault.display_message(), None);
    }

    #[test]
    fn user_rejection_code_maps_to_user_rejected() {
        let err = normalize(ProviderFault::with_code(
            USER_REJECTED_CODE,
            "User denied transaction signature.",
        ));
        assert_eq!(
            err,
            SwapError::UserRejected("User denied transaction signature.".to_string())
        );
    }

    #[test]
    fn unknown_chain_code_maps_to_chain_mismatch() {
        let err = normalize(ProviderFault::with_code(UNRECOGNIZED_CHAIN_CODE, "Unrecognized chain ID"));
        assert!(matches!(err, SwapError::ChainMismatch(_)));
    }

    #[test]
    fn revert_reason_maps_to_remote_revert() {
        let fault = ProviderFault {
            reason: Some("Offer expired".to_string()),
            message: Some("call reverted".to_string()),
            ..Default::default()
        };
        assert_eq!(normalize(fault), SwapError::RemoteRevert("Offer expired".to_string()));
    }

    #[test]
    fn bare_fault_is_network_failure() {
        assert_eq!(
            normalize(ProviderFault::default()),
            SwapError::NetworkFailure("Unknown provider error".to_string())
        );
    }

    #[test]
    fn rpc_response_fills_nested_fields() {
        let mut fault = ProviderFault::default();
        fault.absorb_rpc(&JsonRpcError {
            code: 3,
            message: "execution reverted: Not offer creator".to_string(),
            data: Some(serde_json::json!({ "message": "Not offer creator" })),
        });
        assert_eq!(fault.reason.as_deref(), Some("Not offer creator"));
        assert_eq!(fault.data_message.as_deref(), Some("Not offer creator"));
        assert!(matches!(normalize(fault), SwapError::RemoteRevert(_)));
    }
}
