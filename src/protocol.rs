//! End-to-end encrypt and decrypt flows for both modes.
//!
//! Each flow is a fixed sequence of steps. Every step reports to the
//! injected [`Narrator`], CPU-bound primitives run on tokio's blocking pool,
//! and the first error ends the flow with nothing but that error.

use tokio::task;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{
    self, KeyPair, auth_decrypt, auth_encrypt, derive_key, generate_nonce, generate_salt,
    generate_symmetric_key, import_private_key, import_public_key,
};
use crate::error::{CryptoError, Result};
use crate::format::{self, HybridPayload, PasswordPayload, Payload};
use crate::narration::Narrator;

/// Where a flow currently is. A flow only moves forward, ending in
/// `Serialized`, `Plaintext`, `Generated` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Validating,
    Generating,
    Deriving,
    Unwrapping,
    Transforming,
    Wrapping,
    Serialized,
    Plaintext,
    Generated,
    Failed,
}

struct Flow<'a> {
    name: &'static str,
    stage: Stage,
    narrator: &'a dyn Narrator,
}

impl<'a> Flow<'a> {
    fn start(name: &'static str, narrator: &'a dyn Narrator) -> Self {
        debug!(flow = name, "flow started");
        Self {
            name,
            stage: Stage::Idle,
            narrator,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(flow = self.name, from = ?self.stage, to = ?stage, "stage change");
        self.stage = stage;
    }

    fn narrate(&self, title: &str, description: &str) {
        self.narrator.step(title, description);
    }

    fn finish<T>(mut self, result: Result<T>, done: Stage) -> Result<T> {
        match result {
            Ok(value) => {
                self.enter(done);
                Ok(value)
            }
            Err(e) => {
                warn!(flow = self.name, stage = ?self.stage, error = %e, "flow failed");
                self.enter(Stage::Failed);
                Err(e)
            }
        }
    }
}

/// Runs a CPU-bound primitive off the async executor.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| CryptoError::TaskFailed(e.to_string()))?
}

fn require_input(input: &str) -> Result<()> {
    if input.trim().is_empty() {
        return Err(CryptoError::InputEmpty);
    }
    Ok(())
}

fn require_credential(credential: &str, name: &'static str) -> Result<()> {
    if credential.is_empty() {
        return Err(CryptoError::MissingCredential(name));
    }
    Ok(())
}

fn into_text(plaintext: Zeroizing<Vec<u8>>) -> Result<Zeroizing<String>> {
    match std::str::from_utf8(&plaintext) {
        Ok(text) => Ok(Zeroizing::new(text.to_string())),
        Err(_) => Err(CryptoError::CorruptPayload(
            "decrypted data is not UTF-8 text".to_string(),
        )),
    }
}

/// Generate a 2048-bit RSA key pair for hybrid mode.
pub async fn generate_key_pair(narrator: &dyn Narrator) -> Result<KeyPair> {
    let mut flow = Flow::start("key-generation", narrator);
    flow.enter(Stage::Generating);
    flow.narrate(
        "Key Pair Generation",
        "Generating a 2048-bit RSA-OAEP key pair (e = 65537, SHA-256). The public key encrypts, the private key decrypts.",
    );
    let result = blocking(crypto::generate_key_pair).await;
    flow.finish(result, Stage::Generated)
}

/// Encrypt text under a passphrase and return the envelope.
pub async fn password_encrypt(
    plaintext: &str,
    passphrase: &str,
    narrator: &dyn Narrator,
) -> Result<String> {
    let mut flow = Flow::start("password-encrypt", narrator);
    let result = password_encrypt_steps(&mut flow, plaintext, passphrase).await;
    flow.finish(result, Stage::Serialized)
}

async fn password_encrypt_steps(
    flow: &mut Flow<'_>,
    plaintext: &str,
    passphrase: &str,
) -> Result<String> {
    flow.enter(Stage::Validating);
    require_input(plaintext)?;
    require_credential(passphrase, "password")?;

    flow.enter(Stage::Deriving);
    flow.narrate(
        "1. Randomness Generation",
        "Drawing a 16-byte salt and a 12-byte IV from the operating system's secure random generator.",
    );
    let salt = generate_salt()?;
    let nonce = generate_nonce()?;

    flow.narrate(
        "2. Key Derivation (PBKDF2)",
        "Deriving a 256-bit AES key from the password with PBKDF2-SHA256 (100,000 iterations) and the fresh salt.",
    );
    let passphrase = Zeroizing::new(passphrase.to_string());
    let key = blocking(move || Ok(derive_key(&passphrase, &salt))).await?;

    flow.enter(Stage::Transforming);
    flow.narrate(
        "3. AES-GCM Encryption",
        "Encrypting the plaintext with the derived key. GCM appends a 16-byte authentication tag.",
    );
    let plaintext = Zeroizing::new(plaintext.as_bytes().to_vec());
    let ciphertext = blocking(move || auth_encrypt(&key, &nonce, &plaintext)).await?;

    flow.narrate(
        "4. Packaging",
        "Storing version, algorithm, salt, IV and ciphertext in a base64 envelope.",
    );
    format::serialize(&Payload::Password(PasswordPayload {
        salt,
        nonce,
        ciphertext,
    }))
}

/// Decrypt a password-mode envelope.
pub async fn password_decrypt(
    envelope: &str,
    passphrase: &str,
    narrator: &dyn Narrator,
) -> Result<Zeroizing<String>> {
    let mut flow = Flow::start("password-decrypt", narrator);
    let result = password_decrypt_steps(&mut flow, envelope, passphrase).await;
    flow.finish(result, Stage::Plaintext)
}

async fn password_decrypt_steps(
    flow: &mut Flow<'_>,
    envelope: &str,
    passphrase: &str,
) -> Result<Zeroizing<String>> {
    flow.enter(Stage::Validating);
    require_input(envelope)?;
    require_credential(passphrase, "password")?;

    flow.narrate("1. Parsing Payload", "Reading salt, IV and ciphertext from the envelope.");
    let payload = match format::deserialize(envelope)? {
        Payload::Password(p) => p,
        other => {
            return Err(CryptoError::CorruptPayload(format!(
                "expected an AES-256-GCM payload, found {}",
                other.algorithm()
            )));
        }
    };

    flow.enter(Stage::Deriving);
    flow.narrate(
        "2. Key Derivation",
        "Re-deriving the AES key from the password and the salt stored in the envelope.",
    );
    let passphrase = Zeroizing::new(passphrase.to_string());
    let salt = payload.salt;
    let key = blocking(move || Ok(derive_key(&passphrase, &salt))).await?;

    flow.enter(Stage::Transforming);
    flow.narrate(
        "3. Decryption",
        "Verifying the authentication tag and decrypting with AES-GCM.",
    );
    let PasswordPayload {
        nonce, ciphertext, ..
    } = payload;
    let plaintext = blocking(move || auth_decrypt(&key, &nonce, &ciphertext)).await?;

    into_text(plaintext)
}

/// Encrypt text for the holder of the private key matching `public_key_pem`.
pub async fn hybrid_encrypt(
    plaintext: &str,
    public_key_pem: &str,
    narrator: &dyn Narrator,
) -> Result<String> {
    let mut flow = Flow::start("hybrid-encrypt", narrator);
    let result = hybrid_encrypt_steps(&mut flow, plaintext, public_key_pem).await;
    flow.finish(result, Stage::Serialized)
}

async fn hybrid_encrypt_steps(
    flow: &mut Flow<'_>,
    plaintext: &str,
    public_key_pem: &str,
) -> Result<String> {
    flow.enter(Stage::Validating);
    require_input(plaintext)?;
    require_credential(public_key_pem, "recipient public key")?;

    flow.enter(Stage::Deriving);
    flow.narrate(
        "1. Ephemeral Key Gen",
        "Generating a random one-time 256-bit AES-GCM key and a 12-byte IV. This key encrypts the data itself.",
    );
    let key = generate_symmetric_key()?;
    let nonce = generate_nonce()?;

    flow.enter(Stage::Transforming);
    flow.narrate(
        "2. Data Encryption (AES)",
        "Encrypting the plaintext with the ephemeral AES key.",
    );
    let plaintext = Zeroizing::new(plaintext.as_bytes().to_vec());
    let (key, ciphertext) = blocking(move || {
        let ciphertext = auth_encrypt(&key, &nonce, &plaintext)?;
        Ok((key, ciphertext))
    })
    .await?;

    flow.enter(Stage::Wrapping);
    flow.narrate("3. Import Public Key", "Parsing the recipient's RSA public key.");
    let pem = public_key_pem.to_string();
    let recipient = blocking(move || import_public_key(&pem)).await?;

    flow.narrate(
        "4. Key Wrapping (RSA)",
        "Encrypting the raw AES key bytes with RSA-OAEP. Only the matching private key can recover them.",
    );
    let wrapped_key = blocking(move || recipient.wrap_key(&key)).await?;

    flow.narrate(
        "5. Packaging",
        "Storing version, algorithm, IV, ciphertext and wrapped key in a base64 envelope.",
    );
    format::serialize(&Payload::Hybrid(HybridPayload {
        nonce,
        ciphertext,
        wrapped_key,
    }))
}

/// Decrypt a hybrid envelope with the recipient's private key.
pub async fn hybrid_decrypt(
    envelope: &str,
    private_key_pem: &str,
    narrator: &dyn Narrator,
) -> Result<Zeroizing<String>> {
    let mut flow = Flow::start("hybrid-decrypt", narrator);
    let result = hybrid_decrypt_steps(&mut flow, envelope, private_key_pem).await;
    flow.finish(result, Stage::Plaintext)
}

async fn hybrid_decrypt_steps(
    flow: &mut Flow<'_>,
    envelope: &str,
    private_key_pem: &str,
) -> Result<Zeroizing<String>> {
    flow.enter(Stage::Validating);
    require_input(envelope)?;
    require_credential(private_key_pem, "private key")?;

    flow.narrate(
        "1. Parsing Payload",
        "Extracting the wrapped key, IV and ciphertext from the envelope.",
    );
    let payload = match format::deserialize(envelope)? {
        Payload::Hybrid(p) => p,
        other => {
            return Err(CryptoError::CorruptPayload(format!(
                "expected a HYBRID-RSA-AES payload, found {}",
                other.algorithm()
            )));
        }
    };

    flow.enter(Stage::Unwrapping);
    flow.narrate(
        "2. Import Private Key",
        "Parsing your RSA private key to prepare for key unwrapping.",
    );
    let pem = Zeroizing::new(private_key_pem.to_string());
    let private_key = blocking(move || import_private_key(&pem)).await?;

    flow.narrate(
        "3. Key Unwrapping",
        "Decrypting the AES key bytes with your RSA private key.",
    );
    let HybridPayload {
        nonce,
        ciphertext,
        wrapped_key,
    } = payload;
    let key = blocking(move || private_key.unwrap_key(&wrapped_key)).await?;

    flow.enter(Stage::Transforming);
    flow.narrate(
        "4. Data Decryption",
        "Decrypting the ciphertext with the recovered AES key.",
    );
    let plaintext = blocking(move || auth_decrypt(&key, &nonce, &ciphertext)).await?;

    into_text(plaintext)
}
