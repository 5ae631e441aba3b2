//! Chain client for balance reads and raw transaction submission.
//! Uses Alloy providers for type-safe RPC interactions.

use crate::erc20::IERC20;
use crate::error::{ChainError, ChainResult};
use crate::gas::{create_gas_strategy, GasParams, GasSettings, GasStrategy};
use crate::network::NetworkDescriptor;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use parking_lot::RwLock;
use reqwest::Url;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Gas parameters are refreshed at most this often.
const GAS_PARAMS_TTL: Duration = Duration::from_secs(10);

/// Chain client shared by every sweep task.
///
/// Holds no connection state; a provider is built per call from the RPC URL,
/// which keeps the client `Clone + Send + Sync` without naming provider types.
#[derive(Clone)]
pub struct ChainClient {
    rpc_url: Url,
    network: NetworkDescriptor,
    gas_strategy: Arc<dyn GasStrategy>,
    gas_settings: GasSettings,
    request_timeout: Duration,
    cached_gas_params: Arc<RwLock<Option<(GasParams, Instant)>>>,
}

impl ChainClient {
    /// Create a client. Performs no network I/O.
    pub fn new(
        rpc_url: &str,
        network: NetworkDescriptor,
        gas_settings: GasSettings,
        request_timeout: Duration,
    ) -> ChainResult<Self> {
        let rpc_url: Url = rpc_url
            .parse()
            .map_err(|e| ChainError::InvalidResponse(format!("invalid RPC URL '{rpc_url}': {e}")))?;
        let gas_strategy: Arc<dyn GasStrategy> =
            Arc::from(create_gas_strategy(network.gas_pricing, &gas_settings));

        Ok(Self {
            rpc_url,
            network,
            gas_strategy,
            gas_settings,
            request_timeout,
            cached_gas_params: Arc::new(RwLock::new(None)),
        })
    }

    /// Network this client is bound to.
    pub fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    /// Chain id this client signs for.
    pub fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    /// RPC endpoint.
    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Gas settings used for limits and pricing.
    pub fn gas_settings(&self) -> &GasSettings {
        &self.gas_settings
    }

    /// Gas strategy name (for logging).
    pub fn gas_strategy_name(&self) -> &'static str {
        self.gas_strategy.strategy_name()
    }

    /// Check that the endpoint answers and serves the configured chain.
    pub async fn verify(&self) -> ChainResult<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let (chain_id, block) = self
            .timed(async {
                let chain_id = provider.get_chain_id().await?;
                let block = provider.get_block_number().await?;
                Ok::<_, ChainError>((chain_id, block))
            })
            .await?;

        if chain_id != self.network.chain_id {
            return Err(ChainError::InvalidResponse(format!(
                "RPC serves chain {chain_id}, configured chain is {}",
                self.network.chain_id
            )));
        }

        info!(
            chain_id = chain_id,
            network = %self.network.name,
            block = block,
            gas_strategy = self.gas_strategy.strategy_name(),
            "Provider connection verified"
        );
        Ok(block)
    }

    /// ERC-20 `balanceOf(owner)` at the latest block.
    pub async fn token_balance(&self, token: Address, owner: Address) -> ChainResult<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = IERC20::new(token, &provider);

        let balance = self
            .timed(async { Ok::<_, ChainError>(contract.balanceOf(owner).call().await?._0) })
            .await?;

        debug!(token = %token, owner = %owner, balance = %balance, "Token balance read");
        Ok(balance)
    }

    /// Native balance of `owner` at the latest block.
    pub async fn native_balance(&self, owner: Address) -> ChainResult<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        self.timed(async { Ok::<_, ChainError>(provider.get_balance(owner).await?) })
            .await
    }

    /// Pending-block nonce of `owner`.
    pub async fn pending_nonce(&self, owner: Address) -> ChainResult<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        self.timed(async {
            Ok::<_, ChainError>(provider.get_transaction_count(owner).pending().await?)
        })
        .await
    }

    /// Estimate gas for a request.
    pub async fn estimate_gas(
        &self,
        tx: &alloy::rpc::types::TransactionRequest,
    ) -> ChainResult<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        self.timed(async { Ok::<_, ChainError>(provider.estimate_gas(tx.clone()).await?) })
            .await
    }

    /// Current gas parameters, served from cache when fresh.
    pub async fn gas_params(&self) -> ChainResult<GasParams> {
        let cached = self.cached_gas_params.read().clone();
        if let Some((params, fetched_at)) = cached {
            if fetched_at.elapsed() < GAS_PARAMS_TTL {
                return Ok(params);
            }
        }

        let params = self
            .timed(self.gas_strategy.fetch_params(&self.rpc_url))
            .await?;
        debug!(
            gas_price_gwei = params.effective_gas_price() / 1_000_000_000,
            strategy = self.gas_strategy.strategy_name(),
            "Gas params updated"
        );
        *self.cached_gas_params.write() = Some((params.clone(), Instant::now()));
        Ok(params)
    }

    /// Apply gas pricing to a request.
    pub fn apply_gas(&self, tx: &mut alloy::rpc::types::TransactionRequest, params: &GasParams) {
        self.gas_strategy.apply_gas(tx, params);
    }

    /// Broadcast a signed, RLP/EIP-2718 encoded transaction.
    pub async fn submit_raw(&self, signed: &[u8]) -> ChainResult<B256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let started = Instant::now();

        let tx_hash = self
            .timed(async {
                let pending = provider.send_raw_transaction(signed).await?;
                Ok::<_, ChainError>(*pending.tx_hash())
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "Raw transaction rejected");
                e
            })?;

        debug!(
            tx_hash = %tx_hash,
            submit_ms = started.elapsed().as_millis(),
            "Transaction submitted"
        );
        Ok(tx_hash)
    }

    async fn timed<T, F>(&self, fut: F) -> ChainResult<T>
    where
        F: Future<Output = ChainResult<T>>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| ChainError::Timeout(self.request_timeout))?
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("chain_id", &self.network.chain_id)
            .field("gas_strategy", &self.gas_strategy.strategy_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{well_known, GasPricing};

    fn client(url: &str) -> ChainResult<ChainClient> {
        ChainClient::new(
            url,
            NetworkDescriptor::custom(31_337, "Anvil", "ETH", GasPricing::Legacy),
            GasSettings::default(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_client_creation_is_offline() {
        let client = client("http://127.0.0.1:8545").unwrap();
        assert_eq!(client.chain_id(), 31_337);
        assert_eq!(client.gas_strategy_name(), "Legacy");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            client("not a url"),
            Err(ChainError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_verify_sepolia() {
        let network = well_known(11_155_111).unwrap();
        let url = network.default_rpc.clone().unwrap();
        let client =
            ChainClient::new(&url, network, GasSettings::default(), Duration::from_secs(10))
                .unwrap();
        assert!(client.verify().await.unwrap() > 0);
    }
}
