//! Deposit wallet provisioning.

use crate::registry::{DepositWallet, WalletRegistry};
use crate::error::RegistryError;
use chrono::Utc;
use sweeper_api::{CustodyClient, CustodyError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Custody(#[from] CustodyError),
}

/// Name given to the custody wallet of `user_id`.
pub fn wallet_name(user_id: &str) -> String {
    format!("deposit-{user_id}")
}

/// Create a custody wallet for `user_id` and record it.
///
/// The duplicate check runs before the custody call so an existing user
/// never gets a second wallet.
pub async fn provision_user(
    custody: &CustodyClient,
    registry: &WalletRegistry,
    user_id: &str,
) -> Result<DepositWallet, ProvisionError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ProvisionError::EmptyUserId);
    }
    if registry.contains(user_id)? {
        return Err(RegistryError::DuplicateUser(user_id.to_string()).into());
    }

    let org_id = custody.parent_org_id().to_string();
    let created = custody.create_wallet(&org_id, &wallet_name(user_id)).await?;

    let wallet = DepositWallet {
        user_id: user_id.to_string(),
        org_id,
        wallet_id: created.wallet_id,
        address: created.address,
        created_at: Utc::now(),
    };
    registry.append(wallet.clone())?;

    info!(
        user = %wallet.user_id,
        address = %wallet.address,
        wallet_id = %wallet.wallet_id,
        registry = %registry.path().display(),
        "Deposit wallet provisioned"
    );
    Ok(wallet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use std::time::Duration;
    use sweeper_api::{CustodyConfig, StampScheme};

    // RFC 6979 A.2.5 P-256 key pair. DO NOT USE IN PRODUCTION.
    const API_PRIVATE: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
    const API_PUBLIC: &str = "0360fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6";

    /// Client whose every request fails: nothing listens on the discard port.
    fn offline_custody() -> CustodyClient {
        CustodyClient::new(CustodyConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_public_key: API_PUBLIC.into(),
            api_private_key: API_PRIVATE.into(),
            key_scheme: StampScheme::P256,
            parent_org_id: "org-parent".into(),
            timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    fn existing(user_id: &str) -> DepositWallet {
        DepositWallet {
            user_id: user_id.into(),
            org_id: "org-parent".into(),
            wallet_id: "w-1".into(),
            address: Address::repeat_byte(0xaa),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_wallet_name() {
        assert_eq!(wallet_name("alice"), "deposit-alice");
    }

    #[tokio::test]
    async fn test_duplicate_user_stops_before_custody() {
        let dir = tempfile::tempdir().unwrap();
        let registry = WalletRegistry::new(dir.path().join("users.json"));
        registry.append(existing("alice")).unwrap();

        // reaching the offline client would surface as a Custody error
        let err = provision_user(&offline_custody(), &registry, " alice ").await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::Registry(RegistryError::DuplicateUser(ref user)) if user == "alice"
        ));
        assert_eq!(registry.load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_user_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = WalletRegistry::new(dir.path().join("users.json"));

        let err = provision_user(&offline_custody(), &registry, "   ").await.unwrap_err();
        assert!(matches!(err, ProvisionError::EmptyUserId));
    }

    #[tokio::test]
    async fn test_custody_failure_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = WalletRegistry::new(dir.path().join("users.json"));
        registry.append(existing("alice")).unwrap();

        let err = provision_user(&offline_custody(), &registry, "bob").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Custody(_)));

        let wallets = registry.load().unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].user_id, "alice");
    }
}
