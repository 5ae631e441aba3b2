//! EIP-1559 gas pricing (base fee + priority fee).

use super::{GasParams, GasStrategy};
use crate::error::{ChainError, ChainResult};
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use reqwest::Url;

/// EIP-1559 gas pricing strategy.
///
/// `max_fee_per_gas = base_fee * multiplier + priority_fee`, capped.
#[derive(Debug)]
pub struct Eip1559GasStrategy {
    /// Priority fee (tip) in wei when the node does not suggest one.
    default_priority_fee: u128,
    /// Multiplier for max_fee relative to base_fee.
    max_fee_multiplier: f64,
    /// Maximum allowed max_fee_per_gas in wei.
    max_fee_cap: u128,
}

impl Eip1559GasStrategy {
    pub fn new(default_priority_fee: u128, max_fee_multiplier: f64) -> Self {
        Self {
            default_priority_fee,
            max_fee_multiplier,
            max_fee_cap: 500_000_000_000, // 500 gwei
        }
    }

    /// Create with a custom max fee cap.
    pub fn with_max_fee_cap(mut self, cap: u128) -> Self {
        self.max_fee_cap = cap;
        self
    }

    fn calculate_max_fee(&self, base_fee: u128, priority_fee: u128) -> u128 {
        let max_fee = ((base_fee as f64) * self.max_fee_multiplier) as u128 + priority_fee;
        max_fee.min(self.max_fee_cap)
    }
}

#[async_trait]
impl GasStrategy for Eip1559GasStrategy {
    async fn fetch_params(&self, rpc_url: &Url) -> ChainResult<GasParams> {
        let provider = ProviderBuilder::new().on_http(rpc_url.clone());

        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| ChainError::InvalidResponse("latest block not found".into()))?;

        let base_fee = block
            .header
            .base_fee_per_gas
            .map(|b| b as u128)
            .ok_or_else(|| ChainError::InvalidResponse("latest block has no base fee".into()))?;

        let priority_fee = provider
            .get_max_priority_fee_per_gas()
            .await
            .unwrap_or(self.default_priority_fee)
            .min(self.max_fee_cap);

        Ok(GasParams::Eip1559 {
            max_fee_per_gas: self.calculate_max_fee(base_fee, priority_fee),
            max_priority_fee_per_gas: priority_fee,
            base_fee,
        })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => {
                tx.set_max_fee_per_gas(*max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(*max_priority_fee_per_gas);
            }
            GasParams::Legacy { gas_price } => {
                tx.set_max_fee_per_gas(*gas_price);
                tx.set_max_priority_fee_per_gas(self.default_priority_fee.min(*gas_price));
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "EIP-1559"
    }
}
