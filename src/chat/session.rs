//! Rolling conversation session

use serde::{Deserialize, Serialize};

use super::{ChatError, ChatMessage};
use crate::config::ChatConfig;
use crate::Result;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Bounded-memory dialogue state plus the chat-completion client
///
/// The system prompt lives outside the rolling window, so trimming can
/// never evict it; only user/assistant entries count against the limit.
pub struct ConversationSession {
    client: reqwest::Client,
    config: ChatConfig,
    history: Vec<ChatMessage>,
}

impl ConversationSession {
    /// Create a session
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: ChatConfig) -> Result<Self> {
        // The service is reached directly, never through a proxy
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            config,
            history: Vec::new(),
        })
    }

    /// Send one user turn and return the assistant's reply
    ///
    /// The user entry is recorded before the request and retained even if
    /// the exchange fails; the assistant entry is recorded only on
    /// success, after which the window is trimmed.
    ///
    /// # Errors
    ///
    /// Returns a tagged error; callers flatten it with
    /// [`ChatError::user_message`]
    pub async fn exchange(&mut self, user_text: &str) -> std::result::Result<String, ChatError> {
        self.history.push(ChatMessage::user(user_text));

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(self.config.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Timeout
                } else {
                    ChatError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            tracing::warn!(status = %status, detail = %detail, "chat service error");
            return Err(ChatError::Status {
                code: status.as_u16(),
                detail,
            });
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|_| ChatError::Malformed)?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ChatError::Malformed)?;

        self.history.push(ChatMessage::assistant(reply.clone()));
        trim_history(&mut self.history, self.config.history_limit);

        Ok(reply)
    }

    /// The retained user/assistant window (system prompt excluded)
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

/// Keep only the most recent `limit` entries
fn trim_history(history: &mut Vec<ChatMessage>, limit: usize) {
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}

/// Pull a useful error description out of a non-200 body: the service's
/// own `error.message` when parseable, else the first 200 characters
fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.error.and_then(|e| e.message)
    {
        return message;
    }
    body.chars().take(200).collect()
}
