//! Custody API client.
//!
//! Mutating calls are submitted as activities. An activity either completes
//! inline or comes back pending and is polled via `get_activity` until it
//! reaches a terminal status or the polling budget runs out.

use crate::error::{CustodyError, CustodyResult};
use crate::stamp::{ApiKeyStamper, StampScheme, STAMP_HEADER};
use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.turnkey.com";
pub const DEFAULT_POLICY_CREATE_PATH: &str = "public/v1/submit/create_policy";

const CREATE_WALLET_PATH: &str = "public/v1/submit/create_wallet";
const SIGN_TRANSACTION_PATH: &str = "public/v1/submit/sign_transaction";
const GET_ACTIVITY_PATH: &str = "public/v1/query/get_activity";

const ACTIVITY_CREATE_WALLET: &str = "ACTIVITY_TYPE_CREATE_WALLET";
const ACTIVITY_SIGN_TRANSACTION: &str = "ACTIVITY_TYPE_SIGN_TRANSACTION_V2";
const ACTIVITY_CREATE_POLICY: &str = "ACTIVITY_TYPE_CREATE_POLICY_V3";

/// Derivation path of the single account created per deposit wallet.
pub const DEPOSIT_ACCOUNT_PATH: &str = "m/44'/60'/0'/0/0";

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection settings for [`CustodyClient`].
#[derive(Debug, Clone)]
pub struct CustodyConfig {
    pub base_url: String,
    pub api_public_key: String,
    pub api_private_key: String,
    /// Curve the API key was registered with
    pub key_scheme: StampScheme,
    pub parent_org_id: String,
    /// Per-request HTTP timeout, also the budget for activity polling.
    pub timeout: Duration,
}

/// Terminal and non-terminal activity states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Completed,
    Pending,
    ConsensusNeeded,
    Failed,
    Rejected,
}

impl ActivityStatus {
    /// Parse the API's `ACTIVITY_STATUS_*` string.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim_start_matches("ACTIVITY_STATUS_") {
            "COMPLETED" => Some(Self::Completed),
            "CREATED" | "PENDING" => Some(Self::Pending),
            "CONSENSUS_NEEDED" => Some(Self::ConsensusNeeded),
            "FAILED" => Some(Self::Failed),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Wallet created by [`CustodyClient::create_wallet`].
#[derive(Debug, Clone)]
pub struct CreatedWallet {
    pub wallet_id: String,
    pub address: Address,
}

#[derive(Debug, Deserialize)]
struct ActivityEnvelope {
    activity: Activity,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    id: String,
    status: String,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivityRequest<'a> {
    #[serde(rename = "type")]
    activity_type: &'a str,
    timestamp_ms: String,
    organization_id: &'a str,
    parameters: Value,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for the custody service.
#[derive(Clone)]
pub struct CustodyClient {
    client: reqwest::Client,
    base_url: String,
    stamper: ApiKeyStamper,
    parent_org_id: String,
    activity_budget: Duration,
}

impl std::fmt::Debug for CustodyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyClient")
            .field("base_url", &self.base_url)
            .field("parent_org_id", &self.parent_org_id)
            .field("stamper", &self.stamper)
            .finish()
    }
}

impl CustodyClient {
    /// Build a client. Fails on missing or mismatched API keys.
    pub fn new(config: CustodyConfig) -> CustodyResult<Self> {
        if config.api_public_key.trim().is_empty() || config.api_private_key.trim().is_empty() {
            return Err(CustodyError::Stamp(
                "TURNKEY_API_PUBLIC_KEY and TURNKEY_API_PRIVATE_KEY are required".into(),
            ));
        }
        let stamper = ApiKeyStamper::from_hex(config.key_scheme, &config.api_public_key, &config.api_private_key)?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CustodyError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.base_url),
            stamper,
            parent_org_id: config.parent_org_id,
            activity_budget: config.timeout,
        })
    }

    /// Organization that owns provisioned deposit wallets.
    pub fn parent_org_id(&self) -> &str {
        &self.parent_org_id
    }

    /// Create an HD wallet with one Ethereum account at [`DEPOSIT_ACCOUNT_PATH`].
    #[instrument(skip(self))]
    pub async fn create_wallet(&self, org_id: &str, wallet_name: &str) -> CustodyResult<CreatedWallet> {
        let parameters = json!({
            "walletName": wallet_name,
            "accounts": [{
                "curve": "CURVE_SECP256K1",
                "pathFormat": "PATH_FORMAT_BIP32",
                "path": DEPOSIT_ACCOUNT_PATH,
                "addressFormat": "ADDRESS_FORMAT_ETHEREUM",
            }],
        });

        let result = self
            .submit_activity(CREATE_WALLET_PATH, ACTIVITY_CREATE_WALLET, org_id, parameters)
            .await?;
        let wallet = parse_create_wallet_result(&result)?;

        info!(
            org_id = org_id,
            wallet_id = %wallet.wallet_id,
            address = %wallet.address,
            "Custody wallet created"
        );
        Ok(wallet)
    }

    /// Sign a serialized unsigned Ethereum transaction with the key behind `sign_with`.
    ///
    /// Returns the signed transaction bytes ready for `eth_sendRawTransaction`.
    #[instrument(skip(self, sign_with, unsigned_tx_hex), fields(sign_with = %sign_with))]
    pub async fn sign_transaction(
        &self,
        org_id: &str,
        sign_with: Address,
        unsigned_tx_hex: &str,
    ) -> CustodyResult<Bytes> {
        let started = Instant::now();
        let parameters = json!({
            "signWith": sign_with.to_checksum(None),
            "unsignedTransaction": unsigned_tx_hex.trim_start_matches("0x"),
            "type": "TRANSACTION_TYPE_ETHEREUM",
        });

        let result = self
            .submit_activity(SIGN_TRANSACTION_PATH, ACTIVITY_SIGN_TRANSACTION, org_id, parameters)
            .await?;
        let signed = parse_signed_transaction(&result)?;

        debug!(
            sign_with = %sign_with,
            signed_len = signed.len(),
            sign_ms = started.elapsed().as_millis(),
            "Transaction signed by custody"
        );
        Ok(signed)
    }

    /// Create a policy in `org_id` from an already-expanded policy body.
    ///
    /// `path` is relative to the base URL so deployments can point at a
    /// different policy endpoint version.
    #[instrument(skip(self, policy))]
    pub async fn create_policy(&self, org_id: &str, path: &str, policy: Value) -> CustodyResult<String> {
        let result = self
            .submit_activity(path, ACTIVITY_CREATE_POLICY, org_id, policy)
            .await?;

        let policy_id = result
            .pointer("/createPolicyResult/policyId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CustodyError::InvalidResponse("missing createPolicyResult.policyId".into()))?;

        info!(org_id = org_id, policy_id = %policy_id, "Policy created");
        Ok(policy_id)
    }

    /// Submit an activity and wait for its result object.
    async fn submit_activity(
        &self,
        path: &str,
        activity_type: &str,
        org_id: &str,
        parameters: Value,
    ) -> CustodyResult<Value> {
        let request = ActivityRequest {
            activity_type,
            timestamp_ms: now_ms().to_string(),
            organization_id: org_id,
            parameters,
        };
        let envelope: ActivityEnvelope = self.post(path, &request).await?;
        self.await_activity(org_id, envelope.activity).await
    }

    async fn await_activity(&self, org_id: &str, mut activity: Activity) -> CustodyResult<Value> {
        let started = Instant::now();

        loop {
            match ActivityStatus::parse(&activity.status) {
                Some(ActivityStatus::Completed) => {
                    return activity.result.ok_or_else(|| {
                        CustodyError::InvalidResponse(format!(
                            "activity {} completed without a result",
                            activity.id
                        ))
                    });
                }
                Some(ActivityStatus::Pending) => {}
                Some(_) | None => {
                    warn!(activity_id = %activity.id, status = %activity.status, "Custody activity did not complete");
                    return Err(CustodyError::ActivityFailed {
                        activity_id: activity.id,
                        status: activity.status,
                    });
                }
            }

            if started.elapsed() >= self.activity_budget {
                return Err(CustodyError::ActivityTimeout {
                    activity_id: activity.id,
                    waited: started.elapsed(),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
            debug!(activity_id = %activity.id, "Polling pending custody activity");

            let body = json!({ "organizationId": org_id, "activityId": activity.id });
            let envelope: ActivityEnvelope = self.post(GET_ACTIVITY_PATH, &body).await?;
            activity = envelope.activity;
        }
    }

    /// Stamped JSON POST. The stamp covers the exact bytes sent.
    async fn post<B, R>(&self, path: &str, body: &B) -> CustodyResult<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let bytes = serde_json::to_vec(body)?;
        let stamp = self.stamper.stamp(&bytes)?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(STAMP_HEADER, stamp)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            return Err(CustodyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

fn parse_create_wallet_result(result: &Value) -> CustodyResult<CreatedWallet> {
    let created = result
        .get("createWalletResult")
        .ok_or_else(|| CustodyError::InvalidResponse("missing createWalletResult".into()))?;

    let wallet_id = created
        .get("walletId")
        .and_then(Value::as_str)
        .ok_or_else(|| CustodyError::InvalidResponse("missing walletId".into()))?
        .to_string();

    let address = created
        .pointer("/addresses/0")
        .and_then(Value::as_str)
        .ok_or_else(|| CustodyError::InvalidResponse("wallet has no addresses".into()))?
        .parse::<Address>()
        .map_err(|e| CustodyError::InvalidResponse(format!("bad wallet address: {e}")))?;

    Ok(CreatedWallet { wallet_id, address })
}

fn parse_signed_transaction(result: &Value) -> CustodyResult<Bytes> {
    let signed = result
        .pointer("/signTransactionResult/signedTransaction")
        .and_then(Value::as_str)
        .ok_or_else(|| CustodyError::InvalidResponse("missing signedTransaction".into()))?;

    let bytes = hex::decode(signed.trim_start_matches("0x"))
        .map_err(|e| CustodyError::InvalidResponse(format!("signed transaction is not hex: {e}")))?;
    if bytes.is_empty() {
        return Err(CustodyError::InvalidResponse("signed transaction is empty".into()));
    }
    Ok(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(normalize_base_url("https://api.turnkey.com/"), "https://api.turnkey.com");
        assert_eq!(normalize_base_url("https://custody.internal///"), "https://custody.internal");
        assert_eq!(normalize_base_url(""), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_activity_status_parse() {
        assert_eq!(
            ActivityStatus::parse("ACTIVITY_STATUS_COMPLETED"),
            Some(ActivityStatus::Completed)
        );
        assert_eq!(
            ActivityStatus::parse("ACTIVITY_STATUS_CREATED"),
            Some(ActivityStatus::Pending)
        );
        assert_eq!(
            ActivityStatus::parse("ACTIVITY_STATUS_CONSENSUS_NEEDED"),
            Some(ActivityStatus::ConsensusNeeded)
        );
        assert_eq!(ActivityStatus::parse("ACTIVITY_STATUS_REJECTED"), Some(ActivityStatus::Rejected));
        assert_eq!(ActivityStatus::parse("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_parse_create_wallet_result() {
        let result = json!({
            "createWalletResult": {
                "walletId": "w-123",
                "addresses": ["0x000000000000000000000000000000000000dEaD"]
            }
        });
        let wallet = parse_create_wallet_result(&result).unwrap();
        assert_eq!(wallet.wallet_id, "w-123");
        assert_eq!(
            wallet.address,
            "0x000000000000000000000000000000000000dEaD".parse::<Address>().unwrap()
        );

        let empty = json!({ "createWalletResult": { "walletId": "w", "addresses": [] } });
        assert!(matches!(
            parse_create_wallet_result(&empty),
            Err(CustodyError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_signed_transaction() {
        let result = json!({ "signTransactionResult": { "signedTransaction": "02f86b" } });
        assert_eq!(parse_signed_transaction(&result).unwrap().as_ref(), &[0x02, 0xf8, 0x6b]);

        let bad = json!({ "signTransactionResult": { "signedTransaction": "zz" } });
        assert!(parse_signed_transaction(&bad).is_err());
        assert!(parse_signed_transaction(&json!({})).is_err());
    }

    #[test]
    fn test_activity_request_shape() {
        let request = ActivityRequest {
            activity_type: ACTIVITY_SIGN_TRANSACTION,
            timestamp_ms: "1700000000000".into(),
            organization_id: "org-1",
            parameters: json!({ "signWith": "0xabc" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], ACTIVITY_SIGN_TRANSACTION);
        assert_eq!(value["organizationId"], "org-1");
        assert_eq!(value["timestampMs"], "1700000000000");
        assert_eq!(value["parameters"]["signWith"], "0xabc");
    }

    #[test]
    fn test_missing_keys_rejected() {
        let err = CustodyClient::new(CustodyConfig {
            base_url: DEFAULT_BASE_URL.into(),
            api_public_key: String::new(),
            api_private_key: String::new(),
            key_scheme: StampScheme::P256,
            parent_org_id: "org".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap_err();
        assert!(matches!(err, CustodyError::Stamp(_)));
    }
}
