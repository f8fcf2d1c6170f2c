//! Question/answer tutor backed by the Gemini `generateContent` API.
//!
//! The tutor only ever sees the question and a one-sentence summary of the
//! last operation. It never fails: every problem becomes a neutral answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::TutorSection;

pub const MISSING_KEY_ANSWER: &str =
    "The AI tutor is not configured. Provide an API key to enable it.";
pub const UNAVAILABLE_ANSWER: &str = "Sorry, the tutor can't be reached right now.";
pub const EMPTY_ANSWER: &str = "I couldn't come up with an answer this time.";
pub const EMPTY_QUESTION_ANSWER: &str = "Ask a question about the encryption you just ran.";

const SYSTEM_INSTRUCTION: &str = "You are a cryptography tutor inside cipherlab, a local tool \
that encrypts text either with a password (PBKDF2-SHA256 + AES-256-GCM) or in hybrid mode \
(an AES-256-GCM key wrapped with RSA-OAEP). Answer in at most three short sentences, in plain \
language for a curious teenager. When the question is about the user's last operation, use the \
CONTEXT. Encourage strong passphrases and careful private-key handling. Never ask the user for \
a passphrase or a private key.";

#[async_trait]
pub trait Tutor: Send + Sync {
    async fn ask(&self, question: &str, context: &str) -> String;
}

pub struct GeminiTutor {
    client: Client,
    settings: TutorSection,
    api_key: Option<Zeroizing<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn answer(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl GeminiTutor {
    pub fn new(settings: TutorSection, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            settings,
            api_key: api_key.filter(|k| !k.is_empty()).map(Zeroizing::new),
        }
    }

    /// Reads the API key from the environment variable named in `settings`.
    pub fn from_env(settings: TutorSection) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok();
        Self::new(settings, api_key)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> reqwest::Result<GenerateResponse> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
        };

        self.client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl Tutor for GeminiTutor {
    async fn ask(&self, question: &str, context: &str) -> String {
        if question.trim().is_empty() {
            return EMPTY_QUESTION_ANSWER.to_string();
        }
        let Some(api_key) = self.api_key.as_ref() else {
            return MISSING_KEY_ANSWER.to_string();
        };

        let prompt = format!("CONTEXT: {context}\n\nUSER QUESTION: {question}");
        debug!(model = %self.settings.model, "asking tutor");

        match self.generate(api_key, &prompt).await {
            Ok(response) => response.answer().unwrap_or_else(|| EMPTY_ANSWER.to_string()),
            Err(e) => {
                warn!(error = %e, "tutor request failed");
                UNAVAILABLE_ANSWER.to_string()
            }
        }
    }
}
