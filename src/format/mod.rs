//! Envelope format for encrypted payloads.
//!
//! An envelope is base64 over a JSON record that names its version and
//! algorithm. Decoding dispatches on the version before anything else is
//! interpreted.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::codec::{bytes_to_text, text_to_bytes};
use crate::crypto::{NONCE_LEN, SALT_LEN};
use crate::error::{CryptoError, Result};

pub mod v1;

/// Latest envelope version
pub const CURRENT_VERSION: u32 = v1::VERSION_V1;

/// Algorithm identifier carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// PBKDF2-derived key, AES-256-GCM.
    Aes256Gcm,
    /// Ephemeral AES-256-GCM key wrapped with RSA-OAEP.
    HybridRsaAes,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "AES-256-GCM",
            Algorithm::HybridRsaAes => "HYBRID-RSA-AES",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AES-256-GCM" => Ok(Algorithm::Aes256Gcm),
            "HYBRID-RSA-AES" => Ok(Algorithm::HybridRsaAes),
            other => Err(CryptoError::CorruptPayload(format!(
                "unknown algorithm '{other}'"
            ))),
        }
    }
}

/// Password-mode envelope contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPayload {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Hybrid-mode envelope contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridPayload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
}

/// A decoded envelope. Each variant holds exactly the fields its algorithm
/// needs, so a salted hybrid envelope cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Password(PasswordPayload),
    Hybrid(HybridPayload),
}

impl Payload {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Payload::Password(_) => Algorithm::Aes256Gcm,
            Payload::Hybrid(_) => Algorithm::HybridRsaAes,
        }
    }

    pub fn version(&self) -> u32 {
        CURRENT_VERSION
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    v: u32,
}

/// Encodes a payload as envelope text.
///
/// # Errors
///
/// Returns `CorruptPayload` if the payload cannot be represented in the
/// current version, or if JSON encoding fails.
pub fn serialize(payload: &Payload) -> Result<String> {
    Ok(bytes_to_text(&v1::serialize(payload)?))
}

/// Decodes envelope text into a payload.
///
/// # Errors
///
/// Returns `CorruptPayload` if:
/// - The text is not base64
/// - The decoded bytes are not a JSON record with a numeric `v`
/// - The version is unsupported
/// - The record's fields do not match its algorithm
pub fn deserialize(envelope: &str) -> Result<Payload> {
    let json = text_to_bytes(envelope)
        .map_err(|e| CryptoError::CorruptPayload(format!("envelope is not base64: {e}")))?;

    let probe: VersionProbe = serde_json::from_slice(&json)
        .map_err(|e| CryptoError::CorruptPayload(format!("envelope is not a payload record: {e}")))?;

    match probe.v {
        1 => v1::parse(&json),
        v => Err(CryptoError::CorruptPayload(format!(
            "unsupported payload version: {v}"
        ))),
    }
}
