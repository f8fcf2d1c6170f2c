//! Error taxonomy for every encrypt, decrypt and key operation.
//!
//! Messages are meant to be shown to the user as-is. `AuthenticationFailure`
//! deliberately carries no detail: a wrong passphrase, a wrong private key,
//! a flipped ciphertext bit and a swapped nonce all look the same.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// No plaintext or envelope was supplied.
    #[error("input data cannot be empty")]
    InputEmpty,

    /// The selected mode needs a passphrase or key that was not supplied.
    #[error("{0} is required for this operation")]
    MissingCredential(&'static str),

    /// Key text is not a PEM block of the expected kind.
    #[error("malformed key text: {0}")]
    MalformedKeyText(String),

    /// Key text decoded, but is not a usable RSA key of the requested kind.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Envelope is not decodable or its fields do not match its algorithm.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("authentication failed: wrong key or corrupted data")]
    AuthenticationFailure,

    #[error("key pair generation failed: {0}")]
    KeyGenerationFailure(String),

    #[error("OS random generator unavailable")]
    RandomUnavailable,

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// A background crypto task panicked or was cancelled by the runtime.
    #[error("crypto task did not complete: {0}")]
    TaskFailed(String),
}
