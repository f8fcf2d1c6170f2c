//! Cryptographic primitives for both envelope modes.
//!
//! Provides AES-256-GCM encryption, PBKDF2 key derivation, and RSA-OAEP key
//! wrapping. Nothing here keeps state between calls.

pub mod aead;
pub mod asymmetric;
pub mod kdf;

pub use aead::{
    SymmetricKey, auth_decrypt, auth_encrypt, generate_nonce, generate_salt,
    generate_symmetric_key,
};
pub use asymmetric::{
    ExportedKeyPair, KeyPair, UnwrappingKey, WrappingKey, generate_key_pair, import_private_key,
    import_public_key,
};
pub use kdf::{PBKDF2_ITERATIONS, derive_key, derive_key_with_iterations};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (12 bytes for AES-GCM).
pub const NONCE_LEN: usize = 12;
/// Length of the symmetric key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the AES-GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;
