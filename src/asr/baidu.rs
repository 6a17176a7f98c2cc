//! Baidu short-speech recognition backend
//!
//! Synchronous protocol: one token fetch (cached with a one-day safety
//! margin) and one recognition POST per utterance.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::{gate, AsrError, TranscriptionBackend};
use crate::audio::AudioClip;
use crate::config::BaiduConfig;
use crate::Result;

/// Timeout for the token endpoint
const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the recognition endpoint
const RECOGNIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Server token TTL assumed when the response omits `expires_in`
const DEFAULT_TOKEN_TTL_SECS: u64 = 2_592_000;

/// Safety margin subtracted from the server TTL (one day)
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 86_400;

/// Rates the service accepts as-is; anything else is normalized
const RATE_NORMALIZE_THRESHOLD: u32 = 12_000;

/// Cached bearer credential
#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Baidu speech-recognition backend
pub struct BaiduAsr {
    client: reqwest::Client,
    config: BaiduConfig,
    token: Option<AccessToken>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    format: &'a str,
    rate: u32,
    channel: u32,
    speech: String,
    len: usize,
    cuid: &'a str,
    token: &'a str,
    dev_pid: u32,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    err_no: i64,
    err_msg: Option<String>,
    result: Option<Vec<String>>,
}

impl BaiduAsr {
    /// Create a backend instance
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: BaiduConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            config,
            token: None,
        })
    }

    /// Return the cached token, fetching a new one only when missing or
    /// expired
    async fn access_token(&mut self) -> std::result::Result<String, AsrError> {
        if let Some(token) = &self.token
            && token.is_valid()
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.api_key.as_str()),
                ("client_secret", self.config.secret_key.as_str()),
            ])
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "token request failed");
                AsrError::Credential
            })?;

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "token response unparseable");
            AsrError::Credential
        })?;

        let Some(value) = parsed.access_token else {
            tracing::warn!("token response missing access_token");
            return Err(AsrError::Credential);
        };

        let ttl = parsed
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        let token = AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        };

        tracing::debug!(ttl_secs = ttl, "access token refreshed");
        self.token = Some(token);
        Ok(value)
    }
}

#[async_trait]
impl TranscriptionBackend for BaiduAsr {
    fn name(&self) -> &'static str {
        "baidu"
    }

    async fn transcribe(&mut self, clip: &AudioClip) -> std::result::Result<String, AsrError> {
        gate::validate(clip, &gate::BAIDU_RULES).map_err(AsrError::Rejected)?;

        let token = self.access_token().await?;

        let rate = normalize_rate(clip.frame_rate());
        let request = RecognizeRequest {
            format: clip.format().as_str(),
            rate,
            channel: 1,
            speech: BASE64.encode(clip.bytes()),
            len: clip.byte_len(),
            cuid: &self.config.cuid,
            token: &token,
            dev_pid: self.config.dev_pid,
        };

        tracing::debug!(
            bytes = clip.byte_len(),
            rate,
            format = request.format,
            "sending recognition request"
        );

        let response = self
            .client
            .post(&self.config.asr_url)
            .json(&request)
            .timeout(RECOGNIZE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AsrError::from_transport(&e))?;

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| AsrError::Protocol(e.to_string()))?;

        match parsed.err_no {
            0 => {
                let text = parsed.result.unwrap_or_default().concat();
                if text.is_empty() {
                    return Err(AsrError::EmptyResult);
                }
                tracing::info!(transcript = %text, "transcription complete");
                Ok(text)
            }
            3311 => Err(AsrError::BadSampleRate),
            3300 => Err(AsrError::BadParameters),
            3301 => Err(AsrError::BadAudioQuality),
            code => Err(AsrError::Upstream {
                code,
                message: parsed.err_msg.unwrap_or_else(|| "unknown error".to_string()),
            }),
        }
    }
}

/// Snap a nonstandard rate to the nearest supported one
const fn normalize_rate(rate: u32) -> u32 {
    match rate {
        8000 | 16000 => rate,
        r if r > RATE_NORMALIZE_THRESHOLD => 16000,
        _ => 8000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_rates_pass_through() {
        assert_eq!(normalize_rate(8000), 8000);
        assert_eq!(normalize_rate(16000), 16000);
    }

    #[test]
    fn nonstandard_rates_snap_across_the_threshold() {
        assert_eq!(normalize_rate(22050), 16000);
        assert_eq!(normalize_rate(44100), 16000);
        assert_eq!(normalize_rate(11025), 8000);
        // the threshold itself is not "greater than"
        assert_eq!(normalize_rate(12000), 8000);
        assert_eq!(normalize_rate(12001), 16000);
    }

    #[test]
    fn token_validity_respects_expiry() {
        let live = AccessToken {
            value: "tok".to_string(),
            expires_at: Instant::now() + Duration::from_secs(60),
        };
        assert!(live.is_valid());

        let expired = AccessToken {
            value: "tok".to_string(),
            expires_at: Instant::now() - Duration::from_secs(1),
        };
        assert!(!expired.is_valid());
    }
}
