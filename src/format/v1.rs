//! Envelope format v1.
//!
//! V1 record (before base64):
//! ```text
//! {"v":1,"algo":"AES-256-GCM","salt":[..16],"iv":[..12],"data":[..]}
//! {"v":1,"algo":"HYBRID-RSA-AES","iv":[..12],"data":[..],"encryptedKey":[..]}
//! ```
//! Byte fields are JSON arrays of numbers. `data` is ciphertext with the
//! GCM tag appended.

use serde::{Deserialize, Serialize};

use super::{Algorithm, HybridPayload, PasswordPayload, Payload};
use crate::crypto::{NONCE_LEN, SALT_LEN};
use crate::error::{CryptoError, Result};

/// Current envelope version.
pub const VERSION_V1: u32 = 1;

#[derive(Serialize, Deserialize)]
struct WirePayload {
    v: u32,
    algo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<Vec<u8>>,
    iv: Vec<u8>,
    data: Vec<u8>,
    #[serde(
        rename = "encryptedKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    encrypted_key: Option<Vec<u8>>,
}

impl From<&Payload> for WirePayload {
    fn from(payload: &Payload) -> Self {
        let algo = payload.algorithm().as_str().to_string();
        match payload {
            Payload::Password(p) => WirePayload {
                v: VERSION_V1,
                algo,
                salt: Some(p.salt.to_vec()),
                iv: p.nonce.to_vec(),
                data: p.ciphertext.clone(),
                encrypted_key: None,
            },
            Payload::Hybrid(p) => WirePayload {
                v: VERSION_V1,
                algo,
                salt: None,
                iv: p.nonce.to_vec(),
                data: p.ciphertext.clone(),
                encrypted_key: Some(p.wrapped_key.clone()),
            },
        }
    }
}

impl TryFrom<WirePayload> for Payload {
    type Error = CryptoError;

    fn try_from(wire: WirePayload) -> Result<Self> {
        if wire.v != VERSION_V1 {
            return Err(corrupt("wrong version for v1 parser"));
        }

        let algorithm: Algorithm = wire.algo.parse()?;
        let nonce: [u8; NONCE_LEN] = wire
            .iv
            .as_slice()
            .try_into()
            .map_err(|_| corrupt(&format!("iv must be {NONCE_LEN} bytes")))?;

        match algorithm {
            Algorithm::Aes256Gcm => {
                if wire.encrypted_key.is_some() {
                    return Err(corrupt("AES-256-GCM payload must not carry encryptedKey"));
                }
                let salt = wire.salt.ok_or_else(|| corrupt("AES-256-GCM payload is missing salt"))?;
                let salt: [u8; SALT_LEN] = salt
                    .as_slice()
                    .try_into()
                    .map_err(|_| corrupt(&format!("salt must be {SALT_LEN} bytes")))?;

                Ok(Payload::Password(PasswordPayload {
                    salt,
                    nonce,
                    ciphertext: wire.data,
                }))
            }
            Algorithm::HybridRsaAes => {
                if wire.salt.is_some() {
                    return Err(corrupt("HYBRID-RSA-AES payload must not carry salt"));
                }
                let wrapped_key = wire
                    .encrypted_key
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| corrupt("HYBRID-RSA-AES payload is missing encryptedKey"))?;

                Ok(Payload::Hybrid(HybridPayload {
                    nonce,
                    ciphertext: wire.data,
                    wrapped_key,
                }))
            }
        }
    }
}

fn corrupt(reason: &str) -> CryptoError {
    CryptoError::CorruptPayload(reason.to_string())
}

/// Parses a v1 JSON record.
///
/// # Errors
///
/// Returns `CorruptPayload` if a required field is missing, a field of the
/// other algorithm is present, or salt/iv have the wrong length.
pub fn parse(json: &[u8]) -> Result<Payload> {
    let wire: WirePayload = serde_json::from_slice(json)
        .map_err(|e| CryptoError::CorruptPayload(format!("malformed v1 record: {e}")))?;
    Payload::try_from(wire)
}

/// Serializes a payload to a v1 JSON record.
///
/// # Errors
///
/// Returns `CorruptPayload` for a hybrid payload without a wrapped key, which
/// [`parse`] would refuse.
pub fn serialize(payload: &Payload) -> Result<Vec<u8>> {
    if let Payload::Hybrid(p) = payload {
        if p.wrapped_key.is_empty() {
            return Err(corrupt("HYBRID-RSA-AES payload is missing encryptedKey"));
        }
    }
    serde_json::to_vec(&WirePayload::from(payload))
        .map_err(|e| CryptoError::CorruptPayload(format!("cannot encode payload: {e}")))
}
