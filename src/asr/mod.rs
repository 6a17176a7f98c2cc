//! Speech-recognition backends
//!
//! Two providers with structurally different protocols sit behind one
//! trait: Baidu (single synchronous round trip) and iFlytek (upload,
//! create task, poll). Failures stay tagged as [`AsrError`] up to the
//! orchestration boundary, where they flatten into fixed spoken
//! fallback messages.

pub mod baidu;
pub mod gate;
pub mod ifly;
pub mod sign;

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioClip;
use crate::config::{AsrConfig, AsrProvider};
use crate::Result;

pub use baidu::BaiduAsr;
pub use gate::{validate, GateRejection, GateRules, RatePolicy, RuleViolation, BAIDU_RULES, IFLY_RULES};
pub use ifly::{AudioUploader, IflyAsr, MultipartUploader};

/// A transcription provider
///
/// Implementations gate the clip themselves and never let a transport or
/// protocol fault escape as anything but an [`AsrError`].
#[async_trait]
pub trait TranscriptionBackend {
    /// Short provider name for logging
    fn name(&self) -> &'static str;

    /// Turn a captured clip into text
    ///
    /// # Errors
    ///
    /// Returns a tagged error; callers flatten it with
    /// [`AsrError::user_message`]
    async fn transcribe(&mut self, clip: &AudioClip) -> std::result::Result<String, AsrError>;
}

/// Everything that can go wrong between a captured clip and its transcript
#[derive(Debug, Error)]
pub enum AsrError {
    /// Clip failed the backend's acceptance rules
    #[error("audio rejected: {0}")]
    Rejected(GateRejection),

    /// Access token could not be obtained
    #[error("could not obtain access token")]
    Credential,

    /// Transport-level failure
    #[error("network failure: {0}")]
    Network(String),

    /// Request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Response was not parseable as the documented shape
    #[error("malformed service response: {0}")]
    Protocol(String),

    /// Service recognized nothing in the clip
    #[error("no speech recognized")]
    EmptyResult,

    /// Service rejected the sample rate (Baidu err 3311)
    #[error("service rejected the sample rate")]
    BadSampleRate,

    /// Service rejected the request parameters (Baidu err 3300)
    #[error("service rejected the request parameters")]
    BadParameters,

    /// Service flagged the audio quality (Baidu err 3301)
    #[error("service flagged the audio quality")]
    BadAudioQuality,

    /// Other business-logic rejection from the service
    #[error("service error {code}: {message}")]
    Upstream { code: i64, message: String },

    /// Clip upload to the file-hosting collaborator failed
    #[error("clip upload failed: {0}")]
    Upload(String),

    /// Task creation returned no task id
    #[error("task creation returned no task id")]
    TaskCreate,

    /// Server reported the task failed
    #[error("transcription task failed: {0}")]
    TaskFailed(String),

    /// Terminal response arrived without a result payload
    #[error("transcription result was incomplete")]
    IncompleteResult,

    /// Poll budget exhausted without a terminal status
    #[error("transcription task timed out")]
    PollTimeout,
}

impl AsrError {
    /// The fixed, human-readable message spoken in place of a transcript
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(_) => {
                "That recording doesn't meet the audio format requirements.".to_string()
            }
            Self::Credential => {
                "I couldn't get an access token. Please check the API credentials.".to_string()
            }
            Self::Network(_) => "The network request to the recognizer failed.".to_string(),
            Self::Timeout => "The recognizer took too long to respond.".to_string(),
            Self::Protocol(_) => {
                "The recognizer sent back something I couldn't read.".to_string()
            }
            Self::EmptyResult => "I couldn't make out anything in that recording.".to_string(),
            Self::BadSampleRate => {
                "The sample rate was rejected. Audio must be 8000 Hz or 16000 Hz.".to_string()
            }
            Self::BadParameters => {
                "The recognizer rejected the request parameters. Please check the audio format."
                    .to_string()
            }
            Self::BadAudioQuality => {
                "There was an audio quality problem. The clip may be damaged.".to_string()
            }
            Self::Upstream { message, .. } => {
                format!("Recognition failed. The service said: {message}")
            }
            Self::Upload(_) => {
                "Uploading the clip failed. Please check the network and credentials.".to_string()
            }
            Self::TaskCreate => {
                "I couldn't create the transcription task. Please check the API credentials."
                    .to_string()
            }
            Self::TaskFailed(_) => "The transcription task failed on the server.".to_string(),
            Self::IncompleteResult => "The recognition result came back incomplete.".to_string(),
            Self::PollTimeout => "Recognition timed out.".to_string(),
        }
    }

    /// Map a transport error onto the taxonomy
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Construct the backend selected by configuration
///
/// # Errors
///
/// Returns error if the underlying HTTP client cannot be built
pub fn create_backend(config: &AsrConfig) -> Result<Box<dyn TranscriptionBackend>> {
    match config.provider {
        AsrProvider::Baidu => Ok(Box::new(BaiduAsr::new(config.baidu.clone())?)),
        AsrProvider::Ifly => {
            let uploader = MultipartUploader::new(config.ifly.upload_url.clone())?;
            Ok(Box::new(IflyAsr::new(config.ifly.clone(), Box::new(uploader))?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_are_distinct_per_variant() {
        let messages = [
            AsrError::Credential.user_message(),
            AsrError::Network("x".into()).user_message(),
            AsrError::Timeout.user_message(),
            AsrError::EmptyResult.user_message(),
            AsrError::BadSampleRate.user_message(),
            AsrError::BadParameters.user_message(),
            AsrError::BadAudioQuality.user_message(),
            AsrError::Upload("x".into()).user_message(),
            AsrError::TaskCreate.user_message(),
            AsrError::TaskFailed("x".into()).user_message(),
            AsrError::IncompleteResult.user_message(),
            AsrError::PollTimeout.user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn upstream_message_carries_server_text() {
        let err = AsrError::Upstream {
            code: 3302,
            message: "authentication failed".to_string(),
        };
        assert!(err.user_message().contains("authentication failed"));
    }
}
