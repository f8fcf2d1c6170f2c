use std::num::NonZeroU32;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use super::{KEY_LEN, SALT_LEN, aead::SymmetricKey};

/// PBKDF2-HMAC-SHA256 iteration count. Payload v1 does not record it, so
/// every v1 envelope is derived with exactly this value.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

const V1_ITERATIONS: NonZeroU32 = match NonZeroU32::new(PBKDF2_ITERATIONS) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// Derive the payload key from a passphrase and the per-envelope salt.
pub fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> SymmetricKey {
    derive_key_with_iterations(passphrase, salt, V1_ITERATIONS)
}

pub fn derive_key_with_iterations(
    passphrase: &str,
    salt: &[u8],
    iterations: NonZeroU32,
) -> SymmetricKey {
    let mut key = SymmetricKey::from_bytes([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt,
        iterations.get(),
        key.as_mut_bytes(),
    );
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rounds(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; 16];

        let k1 = derive_key("password", &salt);
        let k2 = derive_key("password", &salt);

        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn kdf_salt_affects_output() {
        let k1 = derive_key_with_iterations("pw", &[1u8; 16], rounds(1000));
        let k2 = derive_key_with_iterations("pw", &[2u8; 16], rounds(1000));

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn kdf_iterations_affect_output() {
        let salt = [7u8; 16];

        let k1 = derive_key_with_iterations("pw", &salt, rounds(1000));
        let k2 = derive_key_with_iterations("pw", &salt, rounds(2000));

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn kdf_matches_rfc7914_vector() {
        // RFC 7914 section 11, PBKDF2-HMAC-SHA256 with c = 1, first 32 bytes
        let key = derive_key_with_iterations("passwd", b"salt", rounds(1));
        let expected: [u8; 32] = [
            0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f, 0xec, 0x16, 0x91, 0xc2, 0x25, 0x44,
            0xb6, 0x05, 0xf9, 0x41, 0x85, 0x21, 0x6d, 0xde, 0x04, 0x65, 0xe6, 0x8b, 0x9d, 0x57,
            0xc2, 0x0d, 0xac, 0xbc,
        ];
        assert_eq!(key.as_bytes(), &expected);
    }
}
