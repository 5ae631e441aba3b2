//! Sweep decision and execution for a single (wallet, token) pair.

use crate::config::TokenDescriptor;
use crate::error::SweepError;
use crate::registry::DepositWallet;
use crate::signer::{SignerBinder, UnsignedTransfer};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use sweeper_chain::ChainClient;
use tokio::sync::Mutex;
use tracing::debug;

/// Read-only balance queries.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, SweepError>;
    async fn native_balance(&self, owner: Address) -> Result<U256, SweepError>;
}

#[async_trait]
impl BalanceSource for ChainClient {
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, SweepError> {
        Ok(ChainClient::token_balance(self, token, owner).await?)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256, SweepError> {
        Ok(ChainClient::native_balance(self, owner).await?)
    }
}

/// Result of one sweep attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Full balance transferred to the omnibus address
    Swept { tx_hash: B256, amount: U256 },
    /// Balance at or below threshold, nothing to do
    BelowThreshold { balance: U256 },
    /// Balance above threshold but no native balance for gas
    NeedsGas { balance: U256 },
    Failed(SweepError),
}

impl SweepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Swept { .. } => "swept",
            Self::BelowThreshold { .. } => "below_threshold",
            Self::NeedsGas { .. } => "needs_gas",
            Self::Failed(err) => err.kind(),
        }
    }
}

/// Whether `balance` should be swept. Equal to threshold is not enough.
pub fn exceeds_threshold(balance: U256, threshold: U256) -> bool {
    balance > threshold
}

/// Executes the sweep decision for (wallet, token) pairs.
///
/// Balance reads run fully concurrently. The section from nonce allocation
/// to submission holds a per-address lock, so two tokens swept from one
/// wallet in the same pass pick up consecutive pending nonces.
pub struct Sweeper {
    balances: Arc<dyn BalanceSource>,
    binder: Arc<dyn SignerBinder>,
    omnibus: Address,
    threshold: U256,
    chain_id: u64,
    wallet_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl Sweeper {
    pub fn new(
        balances: Arc<dyn BalanceSource>,
        binder: Arc<dyn SignerBinder>,
        omnibus: Address,
        threshold: U256,
        chain_id: u64,
    ) -> Self {
        Self {
            balances,
            binder,
            omnibus,
            threshold,
            chain_id,
            wallet_locks: DashMap::new(),
        }
    }

    pub fn omnibus(&self) -> Address {
        self.omnibus
    }

    /// Run the decision for one pair. Never panics on chain or signer errors;
    /// every failure comes back as [`SweepOutcome::Failed`].
    pub async fn sweep_pair(&self, wallet: &DepositWallet, token: &TokenDescriptor) -> SweepOutcome {
        match self.try_sweep(wallet, token).await {
            Ok(outcome) => outcome,
            Err(err) => SweepOutcome::Failed(err),
        }
    }

    async fn try_sweep(
        &self,
        wallet: &DepositWallet,
        token: &TokenDescriptor,
    ) -> Result<SweepOutcome, SweepError> {
        let balance = self.balances.token_balance(token.contract, wallet.address).await?;
        if !exceeds_threshold(balance, self.threshold) {
            return Ok(SweepOutcome::BelowThreshold { balance });
        }

        let native = self.balances.native_balance(wallet.address).await?;
        if native.is_zero() {
            return Ok(SweepOutcome::NeedsGas { balance });
        }

        let transfer = UnsignedTransfer {
            recipient: self.omnibus,
            token: token.contract,
            amount: balance,
            chain_id: self.chain_id,
        };
        let signer = self.binder.bind(&wallet.org_id, wallet.address);

        let lock = self.wallet_lock(wallet.address);
        let _guard = lock.lock().await;
        debug!(
            user = %wallet.user_id,
            address = %wallet.address,
            token = %token.symbol,
            amount = %balance,
            "Sweeping full balance"
        );
        let tx_hash = signer.sign_and_submit(&transfer).await?;

        Ok(SweepOutcome::Swept {
            tx_hash,
            amount: balance,
        })
    }

    fn wallet_lock(&self, address: Address) -> Arc<Mutex<()>> {
        self.wallet_locks
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::RemoteSigner;
    use parking_lot::Mutex as SyncMutex;

    #[test]
    fn test_threshold_is_strict() {
        let threshold = U256::from(1_000_000u64);
        assert!(!exceeds_threshold(U256::from(999_999u64), threshold));
        assert!(!exceeds_threshold(threshold, threshold));
        assert!(exceeds_threshold(U256::from(1_000_001u64), threshold));
        assert!(!exceeds_threshold(U256::ZERO, U256::ZERO));
        assert!(exceeds_threshold(U256::from(1u64), U256::ZERO));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(SweepOutcome::BelowThreshold { balance: U256::ZERO }.label(), "below_threshold");
        assert_eq!(SweepOutcome::NeedsGas { balance: U256::ZERO }.label(), "needs_gas");
        assert_eq!(
            SweepOutcome::Failed(SweepError::NonceConflict("nonce too low".into())).label(),
            "nonce_conflict"
        );
    }

    struct FixedBalances {
        token: U256,
        native: U256,
    }

    #[async_trait]
    impl BalanceSource for FixedBalances {
        async fn token_balance(&self, _: Address, _: Address) -> Result<U256, SweepError> {
            Ok(self.token)
        }
        async fn native_balance(&self, _: Address) -> Result<U256, SweepError> {
            Ok(self.native)
        }
    }

    #[derive(Default)]
    struct RecordingBinder {
        bound: SyncMutex<Vec<(String, Address)>>,
        transfers: Arc<SyncMutex<Vec<UnsignedTransfer>>>,
    }

    struct RecordingSigner {
        transfers: Arc<SyncMutex<Vec<UnsignedTransfer>>>,
    }

    #[async_trait]
    impl RemoteSigner for RecordingSigner {
        async fn sign_and_submit(&self, transfer: &UnsignedTransfer) -> Result<B256, SweepError> {
            self.transfers.lock().push(transfer.clone());
            Ok(B256::repeat_byte(0xab))
        }
    }

    impl SignerBinder for RecordingBinder {
        fn bind(&self, org_id: &str, address: Address) -> Arc<dyn RemoteSigner> {
            self.bound.lock().push((org_id.to_string(), address));
            Arc::new(RecordingSigner {
                transfers: self.transfers.clone(),
            })
        }
    }

    fn wallet() -> DepositWallet {
        DepositWallet {
            user_id: "u1".into(),
            org_id: "org-O".into(),
            wallet_id: "w1".into(),
            address: Address::repeat_byte(0xaa),
            created_at: chrono::Utc::now(),
        }
    }

    fn token() -> TokenDescriptor {
        TokenDescriptor {
            symbol: "USDC".into(),
            contract: Address::repeat_byte(0x01),
            decimals: 6,
        }
    }

    #[tokio::test]
    async fn test_sweeps_entire_balance_with_bound_signer() {
        let binder = Arc::new(RecordingBinder::default());
        let omnibus = Address::repeat_byte(0xee);
        let sweeper = Sweeper::new(
            Arc::new(FixedBalances {
                token: U256::from(5_000_000u64),
                native: U256::from(10u64).pow(U256::from(16u64)),
            }),
            binder.clone(),
            omnibus,
            U256::from(1_000_000u64),
            11_155_111,
        );

        let outcome = sweeper.sweep_pair(&wallet(), &token()).await;
        assert_eq!(
            outcome,
            SweepOutcome::Swept {
                tx_hash: B256::repeat_byte(0xab),
                amount: U256::from(5_000_000u64)
            }
        );
        assert_eq!(*binder.bound.lock(), vec![("org-O".to_string(), Address::repeat_byte(0xaa))]);
        assert_eq!(
            *binder.transfers.lock(),
            vec![UnsignedTransfer {
                recipient: omnibus,
                token: Address::repeat_byte(0x01),
                amount: U256::from(5_000_000u64),
                chain_id: 11_155_111,
            }]
        );
    }

    #[tokio::test]
    async fn test_zero_native_balance_needs_gas() {
        let binder = Arc::new(RecordingBinder::default());
        let sweeper = Sweeper::new(
            Arc::new(FixedBalances {
                token: U256::from(5_000_000u64),
                native: U256::ZERO,
            }),
            binder.clone(),
            Address::repeat_byte(0xee),
            U256::from(1_000_000u64),
            1,
        );

        let outcome = sweeper.sweep_pair(&wallet(), &token()).await;
        assert_eq!(outcome, SweepOutcome::NeedsGas { balance: U256::from(5_000_000u64) });
        assert!(binder.bound.lock().is_empty());
        assert!(binder.transfers.lock().is_empty());
    }
}
