//! RSA-OAEP key pairs for hybrid mode.
//!
//! Public keys travel as SPKI, private keys as PKCS#8, both PEM-framed by
//! [`crate::codec`]. An imported public key can only wrap and an imported
//! private key can only unwrap.

use rand::rngs::OsRng;
use rsa::{
    BigUint, Oaep, RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    traits::PublicKeyParts,
};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{KEY_LEN, aead::SymmetricKey};
use crate::codec::{KeyKind, decode_key_text, encode_key_text};
use crate::error::{CryptoError, Result};

/// Modulus size of generated keys, and the minimum accepted on import.
pub const MODULUS_BITS: usize = 2048;
pub const PUBLIC_EXPONENT: u32 = 65_537;

/// A freshly generated RSA key pair, held in memory only.
pub struct KeyPair {
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

/// PEM text of both halves of a key pair.
pub struct ExportedKeyPair {
    pub public_key: String,
    pub private_key: Zeroizing<String>,
}

impl KeyPair {
    pub fn export_public_key(&self) -> Result<String> {
        let der = self
            .public
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGenerationFailure(format!("SPKI export failed: {e}")))?;
        Ok(encode_key_text(der.as_bytes(), KeyKind::Public))
    }

    pub fn export_private_key(&self) -> Result<Zeroizing<String>> {
        let der = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::KeyGenerationFailure(format!("PKCS#8 export failed: {e}")))?;
        Ok(Zeroizing::new(encode_key_text(
            der.as_bytes(),
            KeyKind::Private,
        )))
    }

    pub fn export(&self) -> Result<ExportedKeyPair> {
        Ok(ExportedKeyPair {
            public_key: self.export_public_key()?,
            private_key: self.export_private_key()?,
        })
    }

    pub fn wrapping_key(&self) -> WrappingKey {
        WrappingKey(self.public.clone())
    }

    pub fn unwrapping_key(&self) -> UnwrappingKey {
        UnwrappingKey(self.private.clone())
    }
}

/// Generate a new 2048-bit key pair with e = 65537.
pub fn generate_key_pair() -> Result<KeyPair> {
    let exponent = BigUint::from(PUBLIC_EXPONENT);
    let private = RsaPrivateKey::new_with_exp(&mut OsRng, MODULUS_BITS, &exponent)
        .map_err(|e| CryptoError::KeyGenerationFailure(e.to_string()))?;
    let public = RsaPublicKey::from(&private);

    Ok(KeyPair { public, private })
}

/// Public half: encrypt-only.
#[derive(Clone)]
pub struct WrappingKey(RsaPublicKey);

/// Private half: decrypt-only.
#[derive(Clone)]
pub struct UnwrappingKey(RsaPrivateKey);

impl WrappingKey {
    /// Encrypt the raw bytes of a symmetric key with RSA-OAEP-SHA256.
    pub fn wrap_key(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
            .map_err(|e| CryptoError::Encryption(format!("key wrapping failed: {e}")))
    }
}

impl UnwrappingKey {
    /// Recover a symmetric key. Any failure is an authentication failure so
    /// padding errors cannot be told apart from a wrong key.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<SymmetricKey> {
        let raw = Zeroizing::new(
            self.0
                .decrypt(Oaep::new::<Sha256>(), wrapped)
                .map_err(|_| CryptoError::AuthenticationFailure)?,
        );

        let bytes: [u8; KEY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::AuthenticationFailure)?;
        Ok(SymmetricKey::from_bytes(bytes))
    }
}

pub fn import_public_key(text: &str) -> Result<WrappingKey> {
    let der = decode_key_text(text, KeyKind::Public)?;
    let key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("not an RSA public key: {e}")))?;
    check_modulus(key.size())?;
    Ok(WrappingKey(key))
}

pub fn import_private_key(text: &str) -> Result<UnwrappingKey> {
    let der = Zeroizing::new(decode_key_text(text, KeyKind::Private)?);
    let key = RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("not an RSA private key: {e}")))?;
    key.validate()
        .map_err(|e| CryptoError::InvalidKeyMaterial(format!("inconsistent RSA key: {e}")))?;
    check_modulus(key.size())?;
    Ok(UnwrappingKey(key))
}

fn check_modulus(size_bytes: usize) -> Result<()> {
    if size_bytes * 8 < MODULUS_BITS {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "RSA modulus of {} bits is below the {MODULUS_BITS}-bit minimum",
            size_bytes * 8
        )));
    }
    Ok(())
}
