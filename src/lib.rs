//! Local text encryption with two modes: a shared passphrase
//! (PBKDF2-SHA256 + AES-256-GCM) or a recipient's RSA public key
//! (AES-256-GCM with the key wrapped by RSA-OAEP).
//!
//! [`CipherLab`] is the session entry point. The flows in [`protocol`] can
//! also be used directly.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod format;
pub mod narration;
pub mod protocol;
mod storage;
pub mod tutor;

use std::fmt;

use zeroize::Zeroizing;

pub use crate::config::Config;
pub use crate::crypto::{ExportedKeyPair, KeyPair};
pub use crate::error::CryptoError;
pub use crate::narration::{NarrationStep, Narrator, NoopNarrator, StepLog, TracingNarrator};
pub use crate::storage::OutputFile;
pub use crate::tutor::{GeminiTutor, Tutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Password,
    Hybrid,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Password => "password",
            Mode::Hybrid => "hybrid",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Encrypt,
    Decrypt,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Encrypt => "encrypt",
            Action::Decrypt => "decrypt",
        })
    }
}

/// Secret or key text handed to [`CipherLab::process`].
#[derive(Clone)]
pub enum Credential {
    Passphrase(Zeroizing<String>),
    /// PEM text of the recipient's public key.
    PublicKey(String),
    /// PEM text of the caller's private key.
    PrivateKey(Zeroizing<String>),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Passphrase(_) => f.write_str("Passphrase(<redacted>)"),
            Credential::PublicKey(pem) => f.debug_tuple("PublicKey").field(pem).finish(),
            Credential::PrivateKey(_) => f.write_str("PrivateKey(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub mode: Mode,
    pub action: Action,
    /// Plaintext to encrypt or envelope to decrypt.
    pub input: String,
    /// `None` in hybrid mode falls back to the session's generated key pair.
    pub credential: Option<Credential>,
}

impl Request {
    pub fn new(mode: Mode, action: Action, input: impl Into<String>) -> Self {
        Self {
            mode,
            action,
            input: input.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// Result of one [`CipherLab::process`] call.
#[derive(Debug)]
pub struct Outcome {
    result: Result<Zeroizing<String>, CryptoError>,
    steps: Vec<NarrationStep>,
}

impl Outcome {
    fn failed(error: CryptoError) -> Self {
        Self {
            result: Err(error),
            steps: Vec::new(),
        }
    }

    /// Envelope after encryption, plaintext after decryption.
    pub fn output(&self) -> Option<&str> {
        self.result.as_ref().ok().map(|s| s.as_str())
    }

    pub fn error(&self) -> Option<&CryptoError> {
        self.result.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Narration steps; always empty unless explain mode is on.
    pub fn steps(&self) -> &[NarrationStep] {
        &self.steps
    }

    pub fn into_result(self) -> Result<Zeroizing<String>, CryptoError> {
        self.result
    }
}

/// One interactive session: explain mode, the generated key pair and a
/// summary of the last operation for the tutor.
#[derive(Default)]
pub struct CipherLab {
    explain: bool,
    key_pair: Option<ExportedKeyPair>,
    last_context: String,
}

impl CipherLab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_explain(explain: bool) -> Self {
        Self {
            explain,
            ..Self::default()
        }
    }

    pub fn explain(&self) -> bool {
        self.explain
    }

    pub fn set_explain(&mut self, explain: bool) {
        self.explain = explain;
    }

    /// Generates a fresh RSA key pair and keeps it for later hybrid requests
    /// that carry no credential of their own.
    pub async fn generate_keys(&mut self) -> error::Result<&ExportedKeyPair> {
        let pair = protocol::generate_key_pair(&TracingNarrator).await?;
        let exported = pair.export()?;
        self.last_context = "User generated a new 2048-bit RSA key pair.".to_string();
        Ok(self.key_pair.insert(exported))
    }

    pub fn key_pair(&self) -> Option<&ExportedKeyPair> {
        self.key_pair.as_ref()
    }

    /// One-sentence summary of the last operation, empty before the first.
    pub fn last_context(&self) -> &str {
        &self.last_context
    }

    /// Validates and runs one encrypt or decrypt request.
    ///
    /// Validation failures (`InputEmpty`, `MissingCredential`) are reported
    /// without touching the session. Any other failure is recorded in the
    /// context summary.
    pub async fn process(&mut self, request: Request) -> Outcome {
        if request.input.trim().is_empty() {
            return Outcome::failed(CryptoError::InputEmpty);
        }
        let credential = match self.resolve_credential(&request) {
            Ok(c) => c,
            Err(e) => return Outcome::failed(e),
        };

        let log = StepLog::new();
        let narrator: &dyn Narrator = if self.explain {
            &log
        } else {
            &TracingNarrator
        };

        let input = request.input.as_str();
        let result = match (request.mode, request.action) {
            (Mode::Password, Action::Encrypt) => {
                protocol::password_encrypt(input, &credential, narrator)
                    .await
                    .map(Zeroizing::new)
            }
            (Mode::Password, Action::Decrypt) => {
                protocol::password_decrypt(input, &credential, narrator).await
            }
            (Mode::Hybrid, Action::Encrypt) => {
                protocol::hybrid_encrypt(input, &credential, narrator)
                    .await
                    .map(Zeroizing::new)
            }
            (Mode::Hybrid, Action::Decrypt) => {
                protocol::hybrid_decrypt(input, &credential, narrator).await
            }
        };

        self.last_context = match &result {
            Ok(_) => success_context(request.mode, request.action).to_string(),
            Err(e) => format!(
                "User attempted {} ({}) but failed: {e}",
                request.action, request.mode
            ),
        };

        Outcome {
            result,
            steps: if self.explain { log.drain() } else { Vec::new() },
        }
    }

    /// Asks `tutor` a question, passing along the last context summary.
    pub async fn ask(&self, tutor: &dyn Tutor, question: &str) -> String {
        tutor.ask(question, &self.last_context).await
    }

    fn resolve_credential(&self, request: &Request) -> error::Result<Zeroizing<String>> {
        let held = self.key_pair.as_ref();
        match (request.mode, request.action, &request.credential) {
            (Mode::Password, _, Some(Credential::Passphrase(p))) if !p.is_empty() => {
                Ok(p.clone())
            }
            (Mode::Password, _, _) => Err(CryptoError::MissingCredential("password")),

            (Mode::Hybrid, Action::Encrypt, Some(Credential::PublicKey(pem)))
                if !pem.trim().is_empty() =>
            {
                Ok(Zeroizing::new(pem.clone()))
            }
            (Mode::Hybrid, Action::Encrypt, None) => held
                .map(|k| Zeroizing::new(k.public_key.clone()))
                .ok_or(CryptoError::MissingCredential("recipient public key")),
            (Mode::Hybrid, Action::Encrypt, _) => {
                Err(CryptoError::MissingCredential("recipient public key"))
            }

            (Mode::Hybrid, Action::Decrypt, Some(Credential::PrivateKey(pem)))
                if !pem.trim().is_empty() =>
            {
                Ok(pem.clone())
            }
            (Mode::Hybrid, Action::Decrypt, None) => held
                .map(|k| k.private_key.clone())
                .ok_or(CryptoError::MissingCredential("private key")),
            (Mode::Hybrid, Action::Decrypt, _) => {
                Err(CryptoError::MissingCredential("private key"))
            }
        }
    }
}

fn success_context(mode: Mode, action: Action) -> &'static str {
    match (mode, action) {
        (Mode::Password, Action::Encrypt) => "User encrypted a message with AES-256-GCM.",
        (Mode::Password, Action::Decrypt) => "User decrypted an AES-256-GCM payload.",
        (Mode::Hybrid, Action::Encrypt) => {
            "User performed hybrid encryption: data encrypted with AES, AES key encrypted with the RSA public key."
        }
        (Mode::Hybrid, Action::Decrypt) => {
            "User performed hybrid decryption using their RSA private key."
        }
    }
}
