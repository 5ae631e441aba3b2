//! Error taxonomy for configuration, the wallet registry and sweep attempts.
//!
//! Chain and custody adapters produce their own tagged kinds; the `From`
//! impls below fold them into [`SweepError`] so the executor only ever
//! matches on a kind.

use std::path::PathBuf;
use std::time::Duration;
use sweeper_api::CustodyError;
use sweeper_chain::ChainError;
use thiserror::Error;

/// Missing or invalid configuration. Fatal before the poll loop starts.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(String),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("no tracked tokens resolved; set <SYMBOL>_ADDRESS for at least one of {0}")]
    NoTokens(String),

    #[error("failed to read tuning file {path}: {reason}")]
    TuningFile { path: PathBuf, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Wallet registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No wallets provisioned yet. Not an error for the operator.
    #[error("wallet registry {0} is empty")]
    Empty(PathBuf),

    #[error("wallet registry io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wallet registry {path} is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("user {0} already has a deposit wallet")]
    DuplicateUser(String),
}

/// Classified failure of one (wallet, token) sweep attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    /// Transient read or RPC failure. Retried on the next pass.
    #[error("rpc failure: {0}")]
    Rpc(String),

    /// Native balance cannot cover the transfer's gas.
    #[error("insufficient gas: {0}")]
    InsufficientGas(String),

    /// Token balance dropped below the transfer amount after it was read.
    #[error("insufficient token balance: {0}")]
    InsufficientBalance(String),

    /// Nonce already used or pending.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    /// Custody API refused or failed to sign.
    #[error("signer error: {0}")]
    Signer(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unclassified: {0}")]
    Unclassified(String),
}

impl SweepError {
    /// Short kind label for logs and status tracking.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rpc(_) => "rpc",
            Self::InsufficientGas(_) => "insufficient_gas",
            Self::InsufficientBalance(_) => "insufficient_balance",
            Self::NonceConflict(_) => "nonce_conflict",
            Self::Signer(_) => "signer",
            Self::Timeout(_) => "timeout",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

impl From<ChainError> for SweepError {
    fn from(err: ChainError) -> Self {
        if err.is_balance_shortfall() {
            return Self::InsufficientBalance(err.to_string());
        }
        match err {
            ChainError::InsufficientFunds(msg) => Self::InsufficientGas(msg),
            ChainError::NonceConflict(msg) => Self::NonceConflict(msg),
            ChainError::Timeout(after) => Self::Timeout(after),
            ChainError::Transport(_) | ChainError::Rpc { .. } | ChainError::InvalidResponse(_) => {
                Self::Rpc(err.to_string())
            }
            ChainError::ExecutionReverted(_) => Self::Unclassified(err.to_string()),
        }
    }
}

impl From<CustodyError> for SweepError {
    fn from(err: CustodyError) -> Self {
        Self::Signer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_error_classification() {
        assert_eq!(
            SweepError::from(ChainError::InsufficientFunds("gas * price + value".into())).kind(),
            "insufficient_gas"
        );
        assert_eq!(
            SweepError::from(ChainError::NonceConflict("nonce too low".into())).kind(),
            "nonce_conflict"
        );
        assert_eq!(
            SweepError::from(ChainError::ExecutionReverted(
                "ERC20: transfer amount exceeds balance".into()
            ))
            .kind(),
            "insufficient_balance"
        );
        assert_eq!(
            SweepError::from(ChainError::ExecutionReverted("paused".into())).kind(),
            "unclassified"
        );
        assert_eq!(
            SweepError::from(ChainError::Transport("connection refused".into())).kind(),
            "rpc"
        );
        assert_eq!(
            SweepError::from(ChainError::Timeout(Duration::from_secs(10))),
            SweepError::Timeout(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_custody_errors_are_signer_errors() {
        let err = SweepError::from(CustodyError::ActivityFailed {
            activity_id: "a-1".into(),
            status: "ACTIVITY_STATUS_REJECTED".into(),
        });
        assert_eq!(err.kind(), "signer");
        assert!(err.to_string().contains("REJECTED"));

        let err = SweepError::from(CustodyError::Api {
            status: 403,
            message: "policy denied".into(),
        });
        assert!(matches!(err, SweepError::Signer(_)));
    }
}
