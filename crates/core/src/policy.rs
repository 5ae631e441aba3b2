//! Policy templates.
//!
//! Templates are JSON files with `${NAME}` placeholders, expanded from
//! [`PolicySettings::variables`] and submitted to the custody API for one
//! organization.

use crate::config::PolicySettings;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use sweeper_api::{CustodyClient, CustodyError};
use thiserror::Error;
use tracing::{info, warn};

/// Which template to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Restricts deposit wallets to token transfers to the omnibus address
    Deposit,
    /// Applied to the omnibus organization
    Omnibus,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Omnibus => "omnibus",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}-policy.json", self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "omnibus" => Ok(Self::Omnibus),
            other => Err(format!("unknown policy '{other}', expected deposit or omnibus")),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expanded policy {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Submission failed. Carries the expanded policy for manual entry.
    #[error("policy submission failed: {source}")]
    Submit {
        #[source]
        source: CustodyError,
        expanded: Value,
    },
}

static PLACEHOLDER: OnceLock<regex_lite::Regex> = OnceLock::new();

fn placeholder() -> &'static regex_lite::Regex {
    PLACEHOLDER.get_or_init(|| {
        regex_lite::Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("Invalid placeholder regex")
    })
}

/// Replace every `${NAME}` with its value. Unknown names are left as-is.
pub fn expand_template(template: &str, variables: &[(String, String)]) -> String {
    let mut result = template.to_string();

    for cap in placeholder().captures_iter(template) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            match variables.iter().find(|(name, _)| name == var_match.as_str()) {
                Some((_, value)) => result = result.replace(full_match.as_str(), value),
                None => warn!(placeholder = full_match.as_str(), "Unresolved policy placeholder"),
            }
        }
    }

    result
}

/// Read and expand the template for `kind`.
pub fn load_policy(kind: PolicyKind, settings: &PolicySettings) -> Result<Value, PolicyError> {
    let path = settings.policy_dir.join(kind.file_name());
    let raw = std::fs::read_to_string(&path).map_err(|source| PolicyError::Read {
        path: path.clone(),
        source,
    })?;
    let expanded = expand_template(&raw, &settings.variables);
    serde_json::from_str(&expanded).map_err(|source| PolicyError::Parse { path, source })
}

/// Expand the template for `kind` and create it in `settings.org_id`.
pub async fn apply_policy(
    custody: &CustodyClient,
    kind: PolicyKind,
    settings: &PolicySettings,
) -> Result<String, PolicyError> {
    let policy = load_policy(kind, settings)?;
    info!(kind = kind.as_str(), org_id = %settings.org_id, "Applying policy");

    custody
        .create_policy(&settings.org_id, &settings.create_path, policy.clone())
        .await
        .map_err(|source| PolicyError::Submit {
            source,
            expanded: policy,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_regex_built_once() {
        assert!(std::ptr::eq(placeholder(), placeholder()));
        let names: Vec<_> = placeholder()
            .captures_iter("${A_1} $B ${c}")
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        assert_eq!(names, vec!["A_1", "c"]);
    }

    fn vars() -> Vec<(String, String)> {
        vec![
            ("CHAIN_ID".into(), "11155111".into()),
            ("USDC_ADDRESS".into(), "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".into()),
            ("OMNIBUS_ADDRESS".into(), "0xOMNI".into()),
        ]
    }

    #[test]
    fn test_expand_template() {
        let out = expand_template(
            "eth.tx.chain_id == ${CHAIN_ID} && eth.tx.to == '${USDC_ADDRESS}' && '${OMNIBUS_ADDRESS}' != '${OMNIBUS_ADDRESS}x'",
            &vars(),
        );
        assert_eq!(
            out,
            "eth.tx.chain_id == 11155111 && eth.tx.to == '0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238' && '0xOMNI' != '0xOMNIx'"
        );
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        assert_eq!(expand_template("a ${NOPE} b", &vars()), "a ${NOPE} b");
        assert_eq!(expand_template("no placeholders", &vars()), "no placeholders");
    }

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("deposit".parse::<PolicyKind>(), Ok(PolicyKind::Deposit));
        assert_eq!("OMNIBUS".parse::<PolicyKind>(), Ok(PolicyKind::Omnibus));
        assert!("treasury".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::Deposit.file_name(), "deposit-policy.json");
    }

    #[test]
    fn test_load_policy_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("deposit-policy.json"),
            r#"{"policyName": "deposit", "condition": "eth.tx.chain_id == ${CHAIN_ID}"}"#,
        )
        .unwrap();
        let settings = PolicySettings {
            org_id: "org".into(),
            create_path: "public/v1/submit/create_policy".into(),
            policy_dir: dir.path().to_path_buf(),
            variables: vars(),
        };

        let policy = load_policy(PolicyKind::Deposit, &settings).unwrap();
        assert_eq!(policy["condition"], "eth.tx.chain_id == 11155111");

        assert!(matches!(
            load_policy(PolicyKind::Omnibus, &settings),
            Err(PolicyError::Read { .. })
        ));
    }

    #[test]
    fn test_shipped_templates_expand_to_json() {
        let settings = PolicySettings {
            org_id: "org".into(),
            create_path: String::new(),
            policy_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../policies")),
            variables: vec![
                ("CHAIN_ID".into(), "11155111".into()),
                ("USDC_ADDRESS".into(), "0xUSDC".into()),
                ("USDT_ADDRESS".into(), "0xUSDT".into()),
                ("OMNIBUS_ADDRESS".into(), "0xOMNI".into()),
            ],
        };
        for kind in [PolicyKind::Deposit, PolicyKind::Omnibus] {
            let policy = load_policy(kind, &settings).unwrap();
            assert!(policy.get("policyName").is_some());
            assert!(!policy.to_string().contains("${"));
        }
    }
}
