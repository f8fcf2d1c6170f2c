use super::{KEY_LEN, NONCE_LEN, SALT_LEN};
use crate::error::{CryptoError, Result};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use getrandom::fill;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// 256-bit AES key. Wiped on drop and never handed out as raw bytes.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Fill buffer with cryptographically secure random bytes
fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| CryptoError::RandomUnavailable)
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate a fresh nonce. Every encryption draws its own.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

/// Generate a one-time key for hybrid mode
pub fn generate_symmetric_key() -> Result<SymmetricKey> {
    let mut key = SymmetricKey([0u8; KEY_LEN]);
    secure_random(key.as_mut_bytes())?;
    Ok(key)
}

/// Encrypt plaintext; the 16-byte tag is appended to the returned ciphertext.
pub fn auth_encrypt(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".to_string()))
}

/// Decrypt and verify ciphertext
pub fn auth_decrypt(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailure)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TAG_LEN;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_symmetric_key().unwrap();
        let nonce = generate_nonce().unwrap();

        let ciphertext = auth_encrypt(&key, &nonce, b"secret data").unwrap();
        assert_eq!(ciphertext.len(), b"secret data".len() + TAG_LEN);

        let plaintext = auth_decrypt(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(*plaintext, b"secret data");
    }

    #[test]
    fn empty_plaintext_still_carries_tag() {
        let key = generate_symmetric_key().unwrap();
        let nonce = generate_nonce().unwrap();

        let ciphertext = auth_encrypt(&key, &nonce, b"").unwrap();
        assert_eq!(ciphertext.len(), TAG_LEN);
        assert!(auth_decrypt(&key, &nonce, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_symmetric_key().unwrap();
        let nonce = generate_nonce().unwrap();

        let mut ciphertext = auth_encrypt(&key, &nonce, b"secret data").unwrap();
        ciphertext[0] ^= 0x01;

        assert_eq!(
            auth_decrypt(&key, &nonce, &ciphertext).unwrap_err(),
            CryptoError::AuthenticationFailure
        );
    }

    #[test]
    fn wrong_key_and_wrong_nonce_fail_identically() {
        let key = generate_symmetric_key().unwrap();
        let other_key = generate_symmetric_key().unwrap();
        let nonce = generate_nonce().unwrap();
        let mut other_nonce = nonce;
        other_nonce[11] ^= 0xff;

        let ciphertext = auth_encrypt(&key, &nonce, b"secret data").unwrap();

        let wrong_key = auth_decrypt(&other_key, &nonce, &ciphertext).unwrap_err();
        let wrong_nonce = auth_decrypt(&key, &other_nonce, &ciphertext).unwrap_err();
        assert_eq!(wrong_key, wrong_nonce);
        assert_eq!(wrong_key, CryptoError::AuthenticationFailure);
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let key = generate_symmetric_key().unwrap();
        let nonce = generate_nonce().unwrap();

        assert!(auth_decrypt(&key, &nonce, &[0u8; 4]).is_err());
    }

    #[test]
    fn salts_and_nonces_are_fresh() {
        assert_ne!(generate_salt().unwrap(), generate_salt().unwrap());
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }
}
