//! Environment resolution.
//!
//! All readers take a lookup function instead of touching `std::env`
//! directly, so tests can resolve configuration from a map.

use super::{CustodySettings, PolicySettings, SweeperConfig, TokenDescriptor, TokenList, Tuning};
use crate::error::ConfigError;
use alloy::primitives::{Address, U256};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use sweeper_api::{StampScheme, DEFAULT_BASE_URL, DEFAULT_POLICY_CREATE_PATH};
use sweeper_chain::network::resolve;
use sweeper_chain::{GasPricing, NetworkDescriptor};
use tracing::warn;

/// Variable lookup: `Some(value)` when set and non-empty.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Token symbols tracked when `TOKENS` is unset.
pub const DEFAULT_TOKENS: &str = "USDC,USDT";

const DEFAULT_CHAIN_ID: u64 = 11_155_111;
const DEFAULT_POLL_INTERVAL_MS: u64 = 15_000;
const DEFAULT_TOKEN_DECIMALS: u8 = 6;
const DEFAULT_REGISTRY_PATH: &str = "users.json";
const DEFAULT_POLICY_DIR: &str = "policies";

pub(super) fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(env: EnvLookup<'_>, name: &str) -> Result<String, ConfigError> {
    env(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn parse_or<T>(env: EnvLookup<'_>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env(name) {
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::invalid(name, e)),
        None => Ok(default),
    }
}

fn parse_address(name: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::invalid(name, e))
}

fn token_symbols(env: EnvLookup<'_>) -> (Vec<String>, bool) {
    let (raw, explicit) = match env("TOKENS") {
        Some(list) => (list, true),
        None => (DEFAULT_TOKENS.to_string(), false),
    };
    let symbols = raw
        .split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    (symbols, explicit)
}

impl SweeperConfig {
    /// Resolve from an arbitrary lookup.
    pub fn from_lookup(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let network = network_from_env(env)?;
        let rpc_url = env("RPC_URL")
            .or_else(|| network.default_rpc.clone())
            .ok_or_else(|| ConfigError::Missing("RPC_URL".into()))?;

        let tokens = tokens_from_env(env)?;
        let omnibus = parse_address("OMNIBUS_ADDRESS", &required(env, "OMNIBUS_ADDRESS")?)?;

        let poll_interval =
            Duration::from_millis(parse_or(env, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?);
        let threshold = match env("SWEEP_THRESHOLD_WEI") {
            Some(raw) => U256::from_str_radix(raw.trim(), 10)
                .map_err(|e| ConfigError::invalid("SWEEP_THRESHOLD_WEI", e))?,
            None => U256::ZERO,
        };

        Ok(Self {
            network,
            rpc_url,
            tokens,
            omnibus,
            poll_interval,
            threshold,
            custody: CustodySettings::from_lookup(env)?,
            tuning: tuning_from_env(env)?,
        })
    }
}

impl CustodySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env("TURNKEY_BASE_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_public_key: required(env, "TURNKEY_API_PUBLIC_KEY")?,
            api_private_key: required(env, "TURNKEY_API_PRIVATE_KEY")?,
            key_scheme: parse_or(env, "TURNKEY_API_KEY_SCHEME", StampScheme::default())?,
            parent_org_id: required(env, "TURNKEY_PARENT_ORG_ID")?,
        })
    }
}

impl PolicySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    /// Placeholders default to obvious dummies so a template can be expanded
    /// and reviewed before every address is known.
    pub fn from_lookup(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let org_id = env("ORG_ID")
            .or_else(|| env("OMNIBUS_ORG_ID"))
            .ok_or_else(|| ConfigError::Missing("ORG_ID or OMNIBUS_ORG_ID".into()))?;

        let mut variables = vec![(
            "CHAIN_ID".to_string(),
            env("CHAIN_ID").unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string()),
        )];
        let (symbols, _) = token_symbols(env);
        for symbol in symbols {
            let name = format!("{symbol}_ADDRESS");
            let value = env(&name).unwrap_or_else(|| format!("0x{symbol}"));
            variables.push((name, value));
        }
        variables.push((
            "OMNIBUS_ADDRESS".to_string(),
            env("OMNIBUS_ADDRESS").unwrap_or_else(|| "0xOMNI".to_string()),
        ));

        Ok(Self {
            org_id,
            create_path: env("TURNKEY_POLICY_CREATE_PATH")
                .unwrap_or_else(|| DEFAULT_POLICY_CREATE_PATH.to_string()),
            policy_dir: PathBuf::from(
                env("POLICY_DIR").unwrap_or_else(|| DEFAULT_POLICY_DIR.to_string()),
            ),
            variables,
        })
    }
}

/// Registry location. Resolved on its own so `watch` can stop on an empty
/// registry before the rest of the config is validated.
pub fn registry_path_from_env() -> PathBuf {
    registry_path(&process_env)
}

fn registry_path(env: EnvLookup<'_>) -> PathBuf {
    PathBuf::from(env("REGISTRY_PATH").unwrap_or_else(|| DEFAULT_REGISTRY_PATH.to_string()))
}

fn network_from_env(env: EnvLookup<'_>) -> Result<NetworkDescriptor, ConfigError> {
    let chain_id: u64 = parse_or(env, "CHAIN_ID", DEFAULT_CHAIN_ID)?;
    Ok(resolve(chain_id, || {
        NetworkDescriptor::custom(
            chain_id,
            env("CHAIN_NAME").unwrap_or_else(|| format!("chain-{chain_id}")),
            env("NATIVE_SYMBOL").unwrap_or_else(|| "ETH".to_string()),
            env("GAS_PRICING")
                .map(|p| GasPricing::parse(&p))
                .unwrap_or(GasPricing::Eip1559),
        )
    }))
}

fn tokens_from_env(env: EnvLookup<'_>) -> Result<TokenList, ConfigError> {
    let (symbols, explicit) = token_symbols(env);
    let mut tokens = TokenList::new();

    for symbol in &symbols {
        let address_var = format!("{symbol}_ADDRESS");
        let Some(raw) = env(&address_var) else {
            if explicit {
                return Err(ConfigError::Missing(address_var));
            }
            warn!(symbol = %symbol, "Token address not set, not tracking");
            continue;
        };
        let contract = parse_address(&address_var, &raw)?;
        let decimals = parse_or(env, &format!("{symbol}_DECIMALS"), DEFAULT_TOKEN_DECIMALS)?;

        if tokens.iter().any(|t: &TokenDescriptor| t.contract == contract) {
            return Err(ConfigError::invalid(address_var, "token contract listed twice"));
        }
        tokens.push(TokenDescriptor {
            symbol: symbol.clone(),
            contract,
            decimals,
        });
    }

    if tokens.is_empty() {
        return Err(ConfigError::NoTokens(symbols.join(",")));
    }
    Ok(tokens)
}

fn tuning_from_env(env: EnvLookup<'_>) -> Result<Tuning, ConfigError> {
    let mut tuning = match env("SWEEPER_CONFIG") {
        Some(path) => Tuning::from_file(path)?,
        None => Tuning::default(),
    };

    tuning.max_in_flight = parse_or(env, "MAX_IN_FLIGHT", tuning.max_in_flight)?;
    tuning.pair_timeout_ms = parse_or(env, "PAIR_TIMEOUT_MS", tuning.pair_timeout_ms)?;
    tuning.rpc_timeout_ms = parse_or(env, "RPC_TIMEOUT_MS", tuning.rpc_timeout_ms)?;
    tuning.custody_timeout_ms = parse_or(env, "CUSTODY_TIMEOUT_MS", tuning.custody_timeout_ms)?;

    if tuning.max_in_flight == 0 {
        return Err(ConfigError::invalid("MAX_IN_FLIGHT", "must be at least 1"));
    }
    Ok(tuning)
}
