//! Speech synthesis client
//!
//! Thin wrapper over a GPT-SoVITS-style endpoint: `POST {text,
//! text_language}` answers with raw WAV bytes.

use serde::Serialize;
use thiserror::Error;

use crate::config::TtsConfig;
use crate::Result;

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    text_language: &'a str,
}

/// Everything that can go wrong during synthesis
#[derive(Debug, Error)]
pub enum TtsError {
    /// Request exceeded its timeout
    #[error("tts request timed out")]
    Timeout,

    /// Transport-level failure
    #[error("tts network failure: {0}")]
    Network(String),

    /// Service answered with a non-200 status
    #[error("tts service returned status {code}: {body}")]
    Status { code: u16, body: String },
}

/// Synthesizes speech from text
pub struct SpeechSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl SpeechSynthesizer {
    /// Create a synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: TtsConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }

    /// Synthesize text into WAV bytes
    ///
    /// # Errors
    ///
    /// Returns a tagged error; the orchestrator logs it and skips
    /// playback for the turn
    pub async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, TtsError> {
        let request = SynthesisRequest {
            text,
            text_language: &self.config.language,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else {
                    TtsError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| TtsError::Network(e.to_string()))?;
        tracing::debug!(bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
