//! iFlytek offline-transcription backend
//!
//! Asynchronous protocol: upload the clip to a file-hosting collaborator,
//! create a transcription task from the resulting URL, then poll the query
//! endpoint until the task reaches a terminal status or the attempt budget
//! runs out. Every request is signed (see [`super::sign`]).

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::sign::{self, SignedHeaders};
use super::{gate, AsrError, TranscriptionBackend};
use crate::audio::AudioClip;
use crate::config::IflyConfig;
use crate::Result;

/// URI path signed for task creation
const CREATE_PATH: &str = "/v2/ost/pro_create";

/// URI path signed for task queries
const QUERY_PATH: &str = "/v2/ost/query";

/// Terminal status: task completed
const STATUS_DONE: &str = "4";

/// Terminal status: task failed
const STATUS_FAILED: &str = "5";

/// Result fields tried in priority order on a completed task
const RESULT_FIELDS: [&str; 5] = ["ed", "onebest", "text", "result", "content"];

/// File-hosting collaborator: turns a clip into a publicly fetchable URL
///
/// Opaque to the backend; any failure short-circuits the transcription
/// with an upload error.
#[async_trait]
pub trait AudioUploader: Send + Sync {
    /// Upload the clip and return its URL
    async fn upload(&self, clip: &AudioClip) -> std::result::Result<String, AsrError>;
}

/// Default uploader: multipart POST of the clip bytes, expecting
/// `{"data": {"url": …}}` back
pub struct MultipartUploader {
    client: reqwest::Client,
    url: String,
}

impl MultipartUploader {
    /// Create an uploader targeting the given endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AudioUploader for MultipartUploader {
    async fn upload(&self, clip: &AudioClip) -> std::result::Result<String, AsrError> {
        let part = reqwest::multipart::Part::bytes(clip.bytes().to_vec())
            .file_name("clip.wav")
            .mime_str("audio/wav")
            .map_err(|e| AsrError::Upload(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AsrError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AsrError::Upload(format!("upload error {status}: {body}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AsrError::Upload(e.to_string()))?;

        payload
            .pointer("/data/url")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| AsrError::Upload("upload response missing data.url".to_string()))
    }
}

#[derive(Serialize)]
struct Common<'a> {
    app_id: &'a str,
}

#[derive(Serialize)]
struct CreateBusiness<'a> {
    language: &'a str,
    accent: &'a str,
    domain: &'a str,
}

#[derive(Serialize)]
struct CreateData<'a> {
    audio_src: &'a str,
    audio_url: &'a str,
    encoding: &'a str,
}

#[derive(Serialize)]
struct CreateTaskRequest<'a> {
    common: Common<'a>,
    business: CreateBusiness<'a>,
    data: CreateData<'a>,
}

#[derive(Serialize)]
struct QueryBusiness<'a> {
    task_id: &'a str,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    common: Common<'a>,
    business: QueryBusiness<'a>,
}

/// iFlytek speech-recognition backend
pub struct IflyAsr {
    client: reqwest::Client,
    config: IflyConfig,
    uploader: Box<dyn AudioUploader>,
}

impl IflyAsr {
    /// Create a backend instance with the given upload collaborator
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: IflyConfig, uploader: Box<dyn AudioUploader>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            config,
            uploader,
        })
    }

    /// POST a signed request body to an endpoint
    async fn post_signed(
        &self,
        url: &str,
        body: String,
        headers: &SignedHeaders,
    ) -> std::result::Result<Value, AsrError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("Host", self.config.host.as_str())
            .header("Date", headers.date.as_str())
            .header("Digest", headers.digest.as_str())
            .header("Authorization", headers.authorization.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| AsrError::from_transport(&e))?;

        response
            .json()
            .await
            .map_err(|e| AsrError::Protocol(e.to_string()))
    }

    fn sign(&self, body: &str, uri: &str) -> SignedHeaders {
        sign::auth_headers(
            body,
            uri,
            &self.config.host,
            &self.config.api_key,
            &self.config.api_secret,
            &sign::http_date(Utc::now()),
        )
    }

    /// Create a transcription task for an uploaded clip
    async fn create_task(&self, audio_url: &str) -> std::result::Result<String, AsrError> {
        let request = CreateTaskRequest {
            common: Common {
                app_id: &self.config.app_id,
            },
            business: CreateBusiness {
                language: "zh_cn",
                accent: "mandarin",
                domain: "pro_ost_ed",
            },
            data: CreateData {
                audio_src: "http",
                audio_url,
                encoding: "raw",
            },
        };
        // Serialize once so the signed digest covers the exact bytes sent
        let body = serde_json::to_string(&request)
            .map_err(|e| AsrError::Protocol(e.to_string()))?;
        let headers = self.sign(&body, CREATE_PATH);

        let payload = self
            .post_signed(&self.config.create_url, body, &headers)
            .await?;

        payload
            .pointer("/data/task_id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or(AsrError::TaskCreate)
    }

    /// Poll the query endpoint until the task is terminal or the attempt
    /// budget is exhausted
    async fn poll_result(&self, task_id: &str) -> std::result::Result<String, AsrError> {
        let request = QueryRequest {
            common: Common {
                app_id: &self.config.app_id,
            },
            business: QueryBusiness { task_id },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| AsrError::Protocol(e.to_string()))?;
        // Body and headers are reused across every attempt
        let headers = self.sign(&body, QUERY_PATH);

        for attempt in 1..=self.config.poll_attempts {
            let payload = self
                .post_signed(&self.config.query_url, body.clone(), &headers)
                .await?;

            let status = payload
                .pointer("/data/task_status")
                .and_then(Value::as_str)
                .unwrap_or_default();

            match status {
                STATUS_DONE => {
                    let Some(result) = payload.pointer("/data/result") else {
                        tracing::warn!("completed task carried no result field");
                        return Err(AsrError::IncompleteResult);
                    };
                    let text = extract_text(result);
                    tracing::info!(transcript = %text, attempt, "transcription complete");
                    return Ok(text);
                }
                STATUS_FAILED => {
                    let reason = payload
                        .pointer("/data/result")
                        .map_or_else(|| "unknown error".to_string(), render_value);
                    tracing::warn!(%reason, "transcription task failed");
                    return Err(AsrError::TaskFailed(reason));
                }
                other => {
                    tracing::debug!(status = other, attempt, "task still running");
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        tracing::warn!(attempts = self.config.poll_attempts, "poll budget exhausted");
        Err(AsrError::PollTimeout)
    }
}

#[async_trait]
impl TranscriptionBackend for IflyAsr {
    fn name(&self) -> &'static str {
        "ifly"
    }

    async fn transcribe(&mut self, clip: &AudioClip) -> std::result::Result<String, AsrError> {
        gate::validate(clip, &gate::IFLY_RULES).map_err(AsrError::Rejected)?;

        let audio_url = self.uploader.upload(clip).await?;
        tracing::debug!(url = %audio_url, "clip uploaded");

        let task_id = self.create_task(&audio_url).await?;
        tracing::debug!(%task_id, "transcription task created");

        self.poll_result(&task_id).await
    }
}

/// Pull the transcript out of a completed task's result payload
///
/// Structured payloads are scanned in [`RESULT_FIELDS`] priority order;
/// string payloads are parsed as embedded JSON and given the same
/// treatment, falling back to the raw string. Anything else is rendered
/// verbatim.
fn extract_text(result: &Value) -> String {
    match result {
        Value::Object(map) => {
            for field in RESULT_FIELDS {
                match map.get(field) {
                    Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                    Some(Value::Null) | Some(Value::String(_)) | None => {}
                    Some(other) => return render_value(other),
                }
            }
            result.to_string()
        }
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Object(_)) => extract_text(&inner),
            _ => s.clone(),
        },
        other => render_value(other),
    }
}

/// Render a JSON value as plain text (strings unquoted)
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
