//! Legacy gas pricing (single `gasPrice`).

use super::{GasParams, GasStrategy};
use crate::error::ChainResult;
use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

/// Legacy gas pricing strategy.
///
/// Uses the node's `eth_gasPrice`, capped at `max_gas_price`. Falls back to
/// the default price when the node does not answer.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// Default gas price in wei.
    default_gas_price: u128,
    /// Maximum gas price in wei.
    max_gas_price: u128,
}

impl LegacyGasStrategy {
    /// Create a new Legacy gas strategy (prices in wei).
    pub fn new(default_gas_price: u128, max_gas_price: u128) -> Self {
        Self {
            default_gas_price,
            max_gas_price,
        }
    }

    fn capped(&self, gas_price: u128) -> u128 {
        gas_price.min(self.max_gas_price)
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_params(&self, rpc_url: &Url) -> ChainResult<GasParams> {
        let provider = ProviderBuilder::new().on_http(rpc_url.clone());
        let gas_price = match provider.get_gas_price().await {
            Ok(price) => price,
            Err(e) => {
                debug!(error = %e, "eth_gasPrice failed, using default");
                self.default_gas_price
            }
        };

        Ok(GasParams::Legacy {
            gas_price: self.capped(gas_price),
        })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Legacy { gas_price } => tx.set_gas_price(*gas_price),
            GasParams::Eip1559 { max_fee_per_gas, .. } => tx.set_gas_price(*max_fee_per_gas),
        }
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[test]
    fn test_legacy_strategy_creation() {
        let strategy = LegacyGasStrategy::new(1_000_000_000, 10_000_000_000);
        assert_eq!(strategy.default_gas_price, 1_000_000_000);
        assert_eq!(strategy.max_gas_price, 10_000_000_000);
    }

    #[test]
    fn test_legacy_cap() {
        let strategy = LegacyGasStrategy::new(1_000_000_000, 10_000_000_000);
        assert_eq!(strategy.capped(5_000_000_000), 5_000_000_000);
        assert_eq!(strategy.capped(20_000_000_000), 10_000_000_000);
    }

    #[test]
    fn test_legacy_apply_gas() {
        let strategy = LegacyGasStrategy::new(1_000_000_000, 10_000_000_000);
        let mut tx = TransactionRequest::default().with_to(Address::ZERO);

        strategy.apply_gas(&mut tx, &GasParams::Legacy { gas_price: 5_000_000_000 });
        assert_eq!(tx.gas_price(), Some(5_000_000_000));
    }
}
