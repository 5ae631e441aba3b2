//! Network selection by numeric chain id.
//!
//! Well-known chains carry a name, native symbol, gas pricing model and a
//! public fallback RPC. Anything else must be described by the operator.

use serde::{Deserialize, Serialize};

/// Gas pricing model used when building transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasPricing {
    /// Single `gasPrice` field.
    Legacy,
    /// Base fee + priority fee.
    Eip1559,
}

impl GasPricing {
    /// Parse a pricing model name. Unknown names fall back to EIP-1559.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "legacy" => Self::Legacy,
            _ => Self::Eip1559,
        }
    }
}

/// Description of the chain the sweeper runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// EIP-155 chain id
    pub chain_id: u64,
    /// Human-readable name
    pub name: String,
    /// Native token symbol (used in "needs gas" messages)
    pub native_symbol: String,
    /// Public RPC used when `RPC_URL` is not set
    #[serde(default)]
    pub default_rpc: Option<String>,
    /// Gas pricing model
    pub gas_pricing: GasPricing,
    /// Block explorer base URL
    #[serde(default)]
    pub explorer_url: Option<String>,
}

impl NetworkDescriptor {
    /// Build a custom network descriptor for an unrecognized chain id.
    pub fn custom(
        chain_id: u64,
        name: impl Into<String>,
        native_symbol: impl Into<String>,
        gas_pricing: GasPricing,
    ) -> Self {
        Self {
            chain_id,
            name: name.into(),
            native_symbol: native_symbol.into(),
            default_rpc: None,
            gas_pricing,
            explorer_url: None,
        }
    }

    /// Link to a transaction on the explorer, if one is known.
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
    }
}

struct KnownChain {
    chain_id: u64,
    name: &'static str,
    native_symbol: &'static str,
    rpc: &'static str,
    gas_pricing: GasPricing,
    explorer: &'static str,
}

const KNOWN_CHAINS: &[KnownChain] = &[
    KnownChain {
        chain_id: 1,
        name: "Ethereum",
        native_symbol: "ETH",
        rpc: "https://eth.llamarpc.com",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://etherscan.io",
    },
    KnownChain {
        chain_id: 11_155_111,
        name: "Sepolia",
        native_symbol: "ETH",
        rpc: "https://ethereum-sepolia-rpc.publicnode.com",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://sepolia.etherscan.io",
    },
    KnownChain {
        chain_id: 17_000,
        name: "Holesky",
        native_symbol: "ETH",
        rpc: "https://ethereum-holesky-rpc.publicnode.com",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://holesky.etherscan.io",
    },
    KnownChain {
        chain_id: 10,
        name: "OP Mainnet",
        native_symbol: "ETH",
        rpc: "https://mainnet.optimism.io",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://optimistic.etherscan.io",
    },
    KnownChain {
        chain_id: 8453,
        name: "Base",
        native_symbol: "ETH",
        rpc: "https://mainnet.base.org",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://basescan.org",
    },
    KnownChain {
        chain_id: 84_532,
        name: "Base Sepolia",
        native_symbol: "ETH",
        rpc: "https://sepolia.base.org",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://sepolia.basescan.org",
    },
    KnownChain {
        chain_id: 42_161,
        name: "Arbitrum One",
        native_symbol: "ETH",
        rpc: "https://arb1.arbitrum.io/rpc",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://arbiscan.io",
    },
    KnownChain {
        chain_id: 137,
        name: "Polygon",
        native_symbol: "POL",
        rpc: "https://polygon-rpc.com",
        gas_pricing: GasPricing::Eip1559,
        explorer: "https://polygonscan.com",
    },
    KnownChain {
        chain_id: 56,
        name: "BNB Smart Chain",
        native_symbol: "BNB",
        rpc: "https://bsc-dataseed.bnbchain.org",
        gas_pricing: GasPricing::Legacy,
        explorer: "https://bscscan.com",
    },
    KnownChain {
        chain_id: 999,
        name: "HyperEVM",
        native_symbol: "HYPE",
        rpc: "https://rpc.hyperliquid.xyz/evm",
        gas_pricing: GasPricing::Legacy,
        explorer: "https://hyperevmscan.io",
    },
];

/// Look up a well-known chain.
pub fn well_known(chain_id: u64) -> Option<NetworkDescriptor> {
    KNOWN_CHAINS
        .iter()
        .find(|c| c.chain_id == chain_id)
        .map(|c| NetworkDescriptor {
            chain_id: c.chain_id,
            name: c.name.to_string(),
            native_symbol: c.native_symbol.to_string(),
            default_rpc: Some(c.rpc.to_string()),
            gas_pricing: c.gas_pricing,
            explorer_url: Some(c.explorer.to_string()),
        })
}

/// Resolve a chain id, falling back to the supplied custom descriptor.
pub fn resolve(chain_id: u64, custom: impl FnOnce() -> NetworkDescriptor) -> NetworkDescriptor {
    well_known(chain_id).unwrap_or_else(custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_sepolia() {
        let net = well_known(11_155_111).unwrap();
        assert_eq!(net.name, "Sepolia");
        assert_eq!(net.gas_pricing, GasPricing::Eip1559);
        assert!(net.default_rpc.is_some());
    }

    #[test]
    fn test_resolve_custom_fallback() {
        let net = resolve(31_337, || {
            NetworkDescriptor::custom(31_337, "Anvil", "ETH", GasPricing::Legacy)
        });
        assert_eq!(net.chain_id, 31_337);
        assert_eq!(net.name, "Anvil");
        assert!(net.default_rpc.is_none());
    }

    #[test]
    fn test_resolve_prefers_known() {
        let net = resolve(8453, || panic!("custom descriptor should not be built"));
        assert_eq!(net.name, "Base");
    }

    #[test]
    fn test_tx_url() {
        let net = well_known(1).unwrap();
        assert_eq!(
            net.tx_url("0xabc").as_deref(),
            Some("https://etherscan.io/tx/0xabc")
        );
        let custom = NetworkDescriptor::custom(5, "x", "ETH", GasPricing::Legacy);
        assert!(custom.tx_url("0xabc").is_none());
    }

    #[test]
    fn test_gas_pricing_parse() {
        assert_eq!(GasPricing::parse("Legacy"), GasPricing::Legacy);
        assert_eq!(GasPricing::parse("eip1559"), GasPricing::Eip1559);
        assert_eq!(GasPricing::parse("whatever"), GasPricing::Eip1559);
    }
}
