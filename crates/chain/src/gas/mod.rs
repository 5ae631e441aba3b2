//! Gas pricing strategies for sweep transactions.
//!
//! Deposit wallets hold only a small native balance, so fees are capped
//! rather than bid up.
//!
//! # Example
//!
//! ```rust,ignore
//! use sweeper_chain::gas::{GasStrategy, LegacyGasStrategy, Eip1559GasStrategy};
//!
//! // BNB Smart Chain, HyperEVM
//! let legacy = LegacyGasStrategy::new(1_000_000_000, 10_000_000_000);
//!
//! // Ethereum and L2s
//! let eip1559 = Eip1559GasStrategy::new(1_000_000_000, 2.0);
//! ```

mod eip1559;
mod legacy;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;

use crate::error::ChainResult;
use crate::network::GasPricing;
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const GWEI: f64 = 1e9;

/// Gas parameters fetched from the chain.
#[derive(Debug, Clone)]
pub enum GasParams {
    /// Legacy gas pricing (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 gas pricing.
    Eip1559 {
        /// Maximum fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
        /// Current base fee (for reference).
        base_fee: u128,
    },
}

impl GasParams {
    /// Upper bound on the per-gas price this transaction may pay.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Fetches gas prices and applies them to transaction requests.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Fetch current gas parameters from the given RPC endpoint.
    async fn fetch_params(&self, rpc_url: &Url) -> ChainResult<GasParams>;

    /// Apply gas parameters to a transaction request in place.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams);

    /// Strategy name for logging.
    fn strategy_name(&self) -> &'static str;
}

/// Gas tuning knobs, in gwei.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasSettings {
    /// Fallback gas price when the node does not answer (legacy)
    #[serde(default = "default_gas_price_gwei")]
    pub default_gas_price_gwei: f64,
    /// Hard cap on the per-gas price
    #[serde(default = "default_max_gas_price_gwei")]
    pub max_gas_price_gwei: f64,
    /// Priority fee when the node does not suggest one (EIP-1559)
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: f64,
    /// max_fee = base_fee * multiplier + priority_fee (EIP-1559)
    #[serde(default = "default_base_fee_multiplier")]
    pub base_fee_multiplier: f64,
    /// Buffer applied on top of `eth_estimateGas`
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: f64,
}

fn default_gas_price_gwei() -> f64 {
    1.0
}
fn default_max_gas_price_gwei() -> f64 {
    200.0
}
fn default_priority_fee_gwei() -> f64 {
    1.0
}
fn default_base_fee_multiplier() -> f64 {
    2.0
}
fn default_limit_multiplier() -> f64 {
    1.2
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            default_gas_price_gwei: default_gas_price_gwei(),
            max_gas_price_gwei: default_max_gas_price_gwei(),
            priority_fee_gwei: default_priority_fee_gwei(),
            base_fee_multiplier: default_base_fee_multiplier(),
            limit_multiplier: default_limit_multiplier(),
        }
    }
}

/// Create a gas strategy for the network's pricing model.
pub fn create_gas_strategy(pricing: GasPricing, settings: &GasSettings) -> Box<dyn GasStrategy> {
    let max_fee_cap = (settings.max_gas_price_gwei * GWEI) as u128;
    match pricing {
        GasPricing::Eip1559 => Box::new(
            Eip1559GasStrategy::new(
                (settings.priority_fee_gwei * GWEI) as u128,
                settings.base_fee_multiplier,
            )
            .with_max_fee_cap(max_fee_cap),
        ),
        GasPricing::Legacy => Box::new(LegacyGasStrategy::new(
            (settings.default_gas_price_gwei * GWEI) as u128,
            max_fee_cap,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_params_effective_price() {
        let legacy = GasParams::Legacy {
            gas_price: 1_000_000_000,
        };
        assert_eq!(legacy.effective_gas_price(), 1_000_000_000);

        let eip1559 = GasParams::Eip1559 {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 30_000_000_000,
        };
        assert_eq!(eip1559.effective_gas_price(), 50_000_000_000);
    }

    #[test]
    fn test_create_gas_strategy() {
        let settings = GasSettings::default();

        let legacy = create_gas_strategy(GasPricing::Legacy, &settings);
        assert_eq!(legacy.strategy_name(), "Legacy");

        let eip1559 = create_gas_strategy(GasPricing::Eip1559, &settings);
        assert_eq!(eip1559.strategy_name(), "EIP-1559");
    }
}
