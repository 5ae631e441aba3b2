//! Remote signer binding.
//!
//! A [`SignerBinder`] turns an (organization, address) pair into a
//! [`RemoteSigner`] able to sign and broadcast a token transfer from that
//! address. The production binding prepares the transaction on chain, has
//! the custody API sign it and submits the raw bytes.

use crate::error::SweepError;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::sync::Arc;
use sweeper_api::CustodyClient;
use sweeper_chain::ChainClient;
use tracing::debug;

/// Transfer of `amount` of `token` to `recipient`. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransfer {
    pub recipient: Address,
    pub token: Address,
    pub amount: U256,
    pub chain_id: u64,
}

/// Signing capability bound to one deposit address.
#[async_trait]
pub trait RemoteSigner: Send + Sync {
    /// Sign and broadcast `transfer`, returning the transaction hash.
    async fn sign_and_submit(&self, transfer: &UnsignedTransfer) -> Result<B256, SweepError>;
}

/// Produces signers for (organization, address) pairs.
pub trait SignerBinder: Send + Sync {
    fn bind(&self, org_id: &str, address: Address) -> Arc<dyn RemoteSigner>;
}

/// Fails with `InsufficientGas` when `native` cannot pay `max_cost`.
fn ensure_gas_covered(native: U256, max_cost: U256) -> Result<(), SweepError> {
    if native < max_cost {
        return Err(SweepError::InsufficientGas(format!(
            "native balance {native} below worst-case cost {max_cost}"
        )));
    }
    Ok(())
}

/// Binder backed by the custody API.
#[derive(Clone)]
pub struct CustodySignerBinder {
    chain: ChainClient,
    custody: Arc<CustodyClient>,
}

impl CustodySignerBinder {
    pub fn new(chain: ChainClient, custody: Arc<CustodyClient>) -> Self {
        Self { chain, custody }
    }
}

impl SignerBinder for CustodySignerBinder {
    fn bind(&self, org_id: &str, address: Address) -> Arc<dyn RemoteSigner> {
        Arc::new(CustodySigner {
            chain: self.chain.clone(),
            custody: self.custody.clone(),
            org_id: org_id.to_string(),
            address,
        })
    }
}

/// Signs with the custody-held key for `address` inside `org_id`.
pub struct CustodySigner {
    chain: ChainClient,
    custody: Arc<CustodyClient>,
    org_id: String,
    address: Address,
}

#[async_trait]
impl RemoteSigner for CustodySigner {
    async fn sign_and_submit(&self, transfer: &UnsignedTransfer) -> Result<B256, SweepError> {
        if transfer.chain_id != self.chain.chain_id() {
            return Err(SweepError::Unclassified(format!(
                "transfer for chain {} on client for chain {}",
                transfer.chain_id,
                self.chain.chain_id()
            )));
        }

        let tx = self
            .chain
            .prepare_token_transfer(self.address, transfer.token, transfer.recipient, transfer.amount)
            .await?;

        // Catch a gas shortfall before spending a custody signature on it.
        let native = self.chain.native_balance(self.address).await?;
        ensure_gas_covered(native, tx.max_cost())?;

        let signed = self
            .custody
            .sign_transaction(&self.org_id, self.address, &tx.payload_hex())
            .await?;
        debug!(
            address = %self.address,
            org_id = %self.org_id,
            nonce = tx.nonce,
            "Submitting custody-signed transfer"
        );

        Ok(self.chain.submit_raw(&signed).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sweeper_api::{CustodyConfig, StampScheme};
    use sweeper_chain::{GasPricing, GasSettings, NetworkDescriptor};

    // RFC 6979 A.2.5 P-256 key pair. DO NOT USE IN PRODUCTION.
    const API_PRIVATE: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
    const API_PUBLIC: &str = "0360fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6";

    // Nothing listens here; any network call fails fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    fn binder(chain_id: u64) -> CustodySignerBinder {
        let chain = ChainClient::new(
            UNREACHABLE,
            NetworkDescriptor::custom(chain_id, "devnet", "ETH", GasPricing::Eip1559),
            GasSettings::default(),
            Duration::from_millis(200),
        )
        .unwrap();
        let custody = CustodyClient::new(CustodyConfig {
            base_url: UNREACHABLE.into(),
            api_public_key: API_PUBLIC.into(),
            api_private_key: API_PRIVATE.into(),
            key_scheme: StampScheme::P256,
            parent_org_id: "org-parent".into(),
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        CustodySignerBinder::new(chain, Arc::new(custody))
    }

    #[test]
    fn test_gas_shortfall_rejected() {
        let cost = U256::from(21_000u64 * 2_000_000_000);
        assert!(ensure_gas_covered(cost, cost).is_ok());
        assert!(ensure_gas_covered(cost + U256::from(1u64), cost).is_ok());

        let err = ensure_gas_covered(cost - U256::from(1u64), cost).unwrap_err();
        assert_eq!(err.kind(), "insufficient_gas");
    }

    #[tokio::test]
    async fn test_chain_id_mismatch_rejected_before_network() {
        let signer = binder(31_337).bind("org-1", Address::repeat_byte(0xaa));
        let transfer = UnsignedTransfer {
            recipient: Address::repeat_byte(0xee),
            token: Address::repeat_byte(0x01),
            amount: U256::from(5_000_000u64),
            chain_id: 1,
        };

        let err = signer.sign_and_submit(&transfer).await.unwrap_err();
        assert!(matches!(err, SweepError::Unclassified(ref msg) if msg.contains("chain 1")));
    }
}
