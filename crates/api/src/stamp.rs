//! API request stamping.
//!
//! Every custody request carries an `X-Stamp` header: the base64url encoding
//! of `{publicKey, signature, scheme}` where `signature` is a DER ECDSA
//! signature over the exact request body bytes.
//!
//! API keys are P-256 by default. secp256k1 keys are supported when the key
//! was registered with that scheme.

use crate::error::{CustodyError, CustodyResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Header name carrying the stamp.
pub const STAMP_HEADER: &str = "X-Stamp";

/// Curve of the API key pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StampScheme {
    #[default]
    P256,
    Secp256k1,
}

impl StampScheme {
    /// Scheme identifier sent in the stamp.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::P256 => "SIGNATURE_SCHEME_TK_API_P256",
            Self::Secp256k1 => "SIGNATURE_SCHEME_TK_API_SECP256K1",
        }
    }
}

impl FromStr for StampScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        match normalized.trim_start_matches("SIGNATURE_SCHEME_TK_API_") {
            "P256" | "P-256" | "SECP256R1" => Ok(Self::P256),
            "SECP256K1" => Ok(Self::Secp256k1),
            _ => Err(format!("unknown API key scheme '{s}' (expected p256 or secp256k1)")),
        }
    }
}

impl fmt::Display for StampScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stamp<'a> {
    public_key: &'a str,
    signature: String,
    scheme: &'static str,
}

#[derive(Clone)]
enum ApiKey {
    P256(p256::ecdsa::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl ApiKey {
    fn from_bytes(scheme: StampScheme, bytes: &[u8]) -> CustodyResult<Self> {
        fn rejected(e: impl fmt::Display) -> CustodyError {
            CustodyError::Stamp(format!("private key rejected: {e}"))
        }
        Ok(match scheme {
            StampScheme::P256 => Self::P256(p256::ecdsa::SigningKey::from_slice(bytes).map_err(rejected)?),
            StampScheme::Secp256k1 => {
                Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(bytes).map_err(rejected)?)
            }
        })
    }

    /// Compressed SEC1 public key, hex.
    fn public_key_hex(&self) -> String {
        match self {
            Self::P256(key) => hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
            Self::Secp256k1(key) => hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
        }
    }

    /// SHA-256 ECDSA signature over `body`, DER encoded.
    fn sign_der(&self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::P256(key) => {
                use p256::ecdsa::signature::Signer;
                let signature: p256::ecdsa::Signature = key.sign(body);
                signature.to_der().as_bytes().to_vec()
            }
            Self::Secp256k1(key) => {
                use k256::ecdsa::signature::Signer;
                let signature: k256::ecdsa::Signature = key.sign(body);
                signature.to_der().as_bytes().to_vec()
            }
        }
    }
}

/// Signs request bodies with an API key.
#[derive(Clone)]
pub struct ApiKeyStamper {
    key: ApiKey,
    scheme: StampScheme,
    public_key_hex: String,
}

impl ApiKeyStamper {
    /// Load the key pair from hex strings (optional `0x` prefix).
    ///
    /// The public key must be the compressed form registered with the
    /// custody service, and must match the private key on `scheme`'s curve.
    pub fn from_hex(scheme: StampScheme, public_key: &str, private_key: &str) -> CustodyResult<Self> {
        let private_bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| CustodyError::Stamp(format!("private key is not hex: {e}")))?;
        let key = ApiKey::from_bytes(scheme, &private_bytes)?;

        let derived = key.public_key_hex();
        let configured = public_key.trim().trim_start_matches("0x").to_ascii_lowercase();
        if derived != configured {
            return Err(CustodyError::Stamp(format!(
                "public key does not match private key for {scheme}"
            )));
        }

        Ok(Self {
            key,
            scheme,
            public_key_hex: derived,
        })
    }

    /// Compressed public key, hex.
    pub fn public_key(&self) -> &str {
        &self.public_key_hex
    }

    pub fn scheme(&self) -> StampScheme {
        self.scheme
    }

    /// Produce the `X-Stamp` header value for `body`.
    pub fn stamp(&self, body: &[u8]) -> CustodyResult<String> {
        let stamp = Stamp {
            public_key: &self.public_key_hex,
            signature: hex::encode(self.key.sign_der(body)),
            scheme: self.scheme.as_str(),
        };
        let json = serde_json::to_vec(&stamp)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }
}

impl fmt::Debug for ApiKeyStamper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyStamper")
            .field("scheme", &self.scheme)
            .field("public_key", &self.public_key_hex)
            .finish_non_exhaustive()
    }
}
