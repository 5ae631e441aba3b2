//! Chain-side error kinds.
//!
//! JSON-RPC failures are classified here, at the transport boundary, so that
//! callers can switch on the kind instead of inspecting message text.

use alloy::transports::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Result alias for chain operations.
pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Errors produced by [`ChainClient`](crate::ChainClient).
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Network-level failure (connection refused, DNS, TLS, malformed body).
    #[error("transport error: {0}")]
    Transport(String),

    /// The sender cannot pay for gas.
    #[error("insufficient funds for gas: {0}")]
    InsufficientFunds(String),

    /// Nonce already used or a transaction with this nonce is pending.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    /// Execution reverted (during estimation or call).
    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    /// Any other JSON-RPC error response.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Request did not complete within the configured deadline.
    #[error("rpc request timed out after {0:?}")]
    Timeout(Duration),

    /// Response or request could not be interpreted.
    #[error("invalid rpc data: {0}")]
    InvalidResponse(String),
}

/// JSON-RPC error code used by most clients for reverted execution.
const EXECUTION_REVERTED_CODE: i64 = 3;

impl ChainError {
    /// Classify a JSON-RPC error response.
    ///
    /// Node implementations (geth, erigon, reth, nethermind, hosted providers)
    /// disagree on codes for these conditions, so classification falls back to
    /// the well-known message fragments they share.
    pub fn classify(code: i64, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if lower.contains("insufficient funds") {
            return Self::InsufficientFunds(message.to_string());
        }

        if lower.contains("nonce too low")
            || lower.contains("nonce too high")
            || lower.contains("already known")
            || lower.contains("replacement transaction underpriced")
            || lower.contains("known transaction")
        {
            return Self::NonceConflict(message.to_string());
        }

        if code == EXECUTION_REVERTED_CODE || lower.contains("execution reverted") {
            return Self::ExecutionReverted(message.to_string());
        }

        Self::Rpc {
            code,
            message: message.to_string(),
        }
    }

    /// Whether the revert reason indicates the token balance was too small.
    pub fn is_balance_shortfall(&self) -> bool {
        match self {
            Self::ExecutionReverted(reason) => {
                let lower = reason.to_ascii_lowercase();
                lower.contains("exceeds balance")
                    || lower.contains("insufficient balance")
                    || lower.contains("erc20insufficientbalance")
                    // OpenZeppelin v5 custom error selector
                    || lower.contains("0xe450d38c")
            }
            _ => false,
        }
    }
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::classify(payload.code, &payload.message),
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(inner) => inner.into(),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_insufficient_funds() {
        let err = ChainError::classify(
            -32000,
            "insufficient funds for gas * price + value: balance 0, tx cost 42000",
        );
        assert!(matches!(err, ChainError::InsufficientFunds(_)));
    }

    #[test]
    fn test_classify_nonce_conflicts() {
        for message in [
            "nonce too low: next nonce 5, tx nonce 4",
            "already known",
            "replacement transaction underpriced",
        ] {
            let err = ChainError::classify(-32000, message);
            assert!(matches!(err, ChainError::NonceConflict(_)), "{message}");
        }
    }

    #[test]
    fn test_classify_revert() {
        let err = ChainError::classify(3, "execution reverted: ERC20: transfer amount exceeds balance");
        assert!(matches!(err, ChainError::ExecutionReverted(_)));
        assert!(err.is_balance_shortfall());

        let err = ChainError::classify(-32000, "execution reverted: Pausable: paused");
        assert!(matches!(err, ChainError::ExecutionReverted(_)));
        assert!(!err.is_balance_shortfall());
    }

    #[test]
    fn test_classify_other() {
        let err = ChainError::classify(-32601, "method not found");
        match err {
            ChainError::Rpc { code, message } => {
                assert_eq!(code, -32601);
                assert_eq!(message, "method not found");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
