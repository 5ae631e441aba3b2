//! Unsigned transfer transactions prepared for a remote signer.
//!
//! The deposit wallet's key never leaves the custody service, so the client
//! fills every field locally (nonce, gas limit, fees, chain id) and hands the
//! signing payload to the custody API. The signed bytes come back through
//! [`ChainClient::submit_raw`].

use crate::erc20::encode_transfer;
use crate::error::{ChainError, ChainResult};
use crate::provider::ChainClient;
use alloy::consensus::SignableTransaction;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use std::time::Instant;
use tracing::debug;

/// Fully-populated transaction awaiting a signature.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    /// Sender (deposit wallet)
    pub from: Address,
    /// Contract called (token)
    pub to: Address,
    /// Nonce taken from the pending block
    pub nonce: u64,
    /// Gas limit (estimate with buffer)
    pub gas_limit: u64,
    /// Upper bound on the per-gas price
    pub max_gas_price: u128,
    /// Unsigned serialized transaction (type byte + RLP)
    pub payload: Bytes,
}

impl UnsignedTransaction {
    /// Worst-case native cost of executing this transaction.
    pub fn max_cost(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.max_gas_price)
    }

    /// Payload hex (no `0x` prefix), the encoding custody APIs expect.
    pub fn payload_hex(&self) -> String {
        alloy::hex::encode(&self.payload)
    }
}

impl ChainClient {
    /// Build an ERC-20 `transfer(recipient, amount)` from `from`, ready for signing.
    ///
    /// Gas estimation runs the transfer against current state, so a token
    /// balance that dropped since it was read surfaces here as a revert.
    pub async fn prepare_token_transfer(
        &self,
        from: Address,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> ChainResult<UnsignedTransaction> {
        let started = Instant::now();

        let mut tx = TransactionRequest::default()
            .with_from(from)
            .with_to(token)
            .with_input(encode_transfer(recipient, amount))
            .with_value(U256::ZERO)
            .with_chain_id(self.chain_id());

        let estimate = self.estimate_gas(&tx).await?;
        let gas_limit = apply_limit_multiplier(estimate, self.gas_settings().limit_multiplier);
        let nonce = self.pending_nonce(from).await?;
        let gas_params = self.gas_params().await?;

        tx.set_gas_limit(gas_limit);
        tx.set_nonce(nonce);
        self.apply_gas(&mut tx, &gas_params);

        let typed = tx
            .build_typed_tx()
            .map_err(|_| ChainError::InvalidResponse("transaction request is incomplete".into()))?;
        let payload: Bytes = typed.encoded_for_signing().into();

        debug!(
            from = %from,
            token = %token,
            nonce = nonce,
            gas_estimate = estimate,
            gas_limit = gas_limit,
            prepare_ms = started.elapsed().as_millis(),
            "Transfer prepared for remote signing"
        );

        Ok(UnsignedTransaction {
            from,
            to: token,
            nonce,
            gas_limit,
            max_gas_price: gas_params.effective_gas_price(),
            payload,
        })
    }
}

fn apply_limit_multiplier(estimate: u64, multiplier: f64) -> u64 {
    let multiplier = multiplier.max(1.0);
    ((estimate as f64) * multiplier).ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_multiplier() {
        assert_eq!(apply_limit_multiplier(50_000, 1.2), 60_000);
        assert_eq!(apply_limit_multiplier(50_000, 1.0), 50_000);
        // multipliers below 1.0 never shrink the estimate
        assert_eq!(apply_limit_multiplier(50_000, 0.5), 50_000);
    }

    #[test]
    fn test_max_cost() {
        let tx = UnsignedTransaction {
            from: Address::ZERO,
            to: Address::ZERO,
            nonce: 0,
            gas_limit: 60_000,
            max_gas_price: 2_000_000_000,
            payload: Bytes::from_static(&[0x02, 0xc0]),
        };
        assert_eq!(tx.max_cost(), U256::from(120_000_000_000_000u64));
        assert_eq!(tx.payload_hex(), "02c0");
    }

    #[test]
    fn test_typed_build_from_filled_request() {
        let mut tx = TransactionRequest::default()
            .with_from(Address::repeat_byte(1))
            .with_to(Address::repeat_byte(2))
            .with_input(encode_transfer(Address::repeat_byte(3), U256::from(1u64)))
            .with_value(U256::ZERO)
            .with_chain_id(11_155_111);
        tx.set_gas_limit(60_000);
        tx.set_nonce(7);
        tx.set_max_fee_per_gas(2_000_000_000);
        tx.set_max_priority_fee_per_gas(1_000_000_000);

        let typed = tx.build_typed_tx().expect("complete request");
        let payload = typed.encoded_for_signing();
        // EIP-1559 envelope type
        assert_eq!(payload[0], 0x02);
    }
}
