//! Deposit wallet registry.
//!
//! A single JSON array of records, one per user. The watch loop reads it
//! once at startup; provisioning appends. Records are never edited or
//! removed by this crate.

use crate::error::RegistryError;
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Custodial deposit wallet assigned to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositWallet {
    pub user_id: String,
    /// Custody organization that holds the key
    pub org_id: String,
    pub wallet_id: String,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// File-backed registry.
#[derive(Debug, Clone)]
pub struct WalletRegistry {
    path: PathBuf,
}

impl WalletRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record.
    ///
    /// A missing file and an empty array both yield [`RegistryError::Empty`].
    pub fn load(&self) -> Result<Vec<DepositWallet>, RegistryError> {
        let wallets = self.read_all()?;
        if wallets.is_empty() {
            return Err(RegistryError::Empty(self.path.clone()));
        }
        info!(path = %self.path.display(), wallets = wallets.len(), "Wallet registry loaded");
        Ok(wallets)
    }

    /// Append a record, rejecting a second wallet for the same user.
    ///
    /// The whole array is rewritten through a temp file in the same
    /// directory and renamed into place.
    pub fn append(&self, wallet: DepositWallet) -> Result<(), RegistryError> {
        let mut wallets = self.read_all()?;
        if wallets.iter().any(|w| w.user_id == wallet.user_id) {
            return Err(RegistryError::DuplicateUser(wallet.user_id));
        }
        debug!(user = %wallet.user_id, address = %wallet.address, "Appending registry record");
        wallets.push(wallet);

        let json = serde_json::to_string_pretty(&wallets).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| self.io_error(source))?;
        std::fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    /// Whether `user_id` already has a record. Missing file means no.
    pub fn contains(&self, user_id: &str) -> Result<bool, RegistryError> {
        Ok(self.read_all()?.iter().any(|w| w.user_id == user_id))
    }

    fn read_all(&self) -> Result<Vec<DepositWallet>, RegistryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
