//! Configuration for the talkback loop
//!
//! A TOML file is a partial overlay on top of built-in defaults; secrets
//! can additionally be supplied through `TALKBACK_*` environment
//! variables, which take precedence over the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Default iFlytek transcription host
pub const DEFAULT_IFLY_HOST: &str = "ost-api.xfyun.cn";

/// Which speech-recognition backend drives the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsrProvider {
    /// Synchronous single-round-trip backend
    #[default]
    Baidu,
    /// Create-then-poll backend with signed requests
    Ifly,
}

impl FromStr for AsrProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "baidu" => Ok(Self::Baidu),
            "ifly" | "iflytek" | "xfyun" => Ok(Self::Ifly),
            other => Err(Error::Config(format!(
                "unknown ASR provider {other:?} (expected \"baidu\" or \"ifly\")"
            ))),
        }
    }
}

impl std::fmt::Display for AsrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baidu => write!(f, "baidu"),
            Self::Ifly => write!(f, "ifly"),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Loop/recording settings
    pub voice: VoiceConfig,

    /// Speech-recognition settings
    pub asr: AsrConfig,

    /// Chat-completion settings
    pub chat: ChatConfig,

    /// Speech-synthesis settings
    pub tts: TtsConfig,
}

/// Loop and recording configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Seconds of microphone audio captured per turn
    pub record_seconds: u64,

    /// Optional append-only JSONL interaction log
    pub journal_path: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            record_seconds: 5,
            journal_path: None,
        }
    }
}

/// Speech-recognition configuration
#[derive(Debug, Clone, Default)]
pub struct AsrConfig {
    /// Active backend
    pub provider: AsrProvider,

    /// Baidu backend settings
    pub baidu: BaiduConfig,

    /// iFlytek backend settings
    pub ifly: IflyConfig,
}

/// Baidu short-speech recognition settings
#[derive(Debug, Clone)]
pub struct BaiduConfig {
    /// OAuth client id
    pub api_key: String,

    /// OAuth client secret
    pub secret_key: String,

    /// Client-credentials token endpoint
    pub token_url: String,

    /// Recognition endpoint
    pub asr_url: String,

    /// Client identifier sent with every request
    pub cuid: String,

    /// Language-model selector (80001 = Mandarin)
    pub dev_pid: u32,
}

impl Default for BaiduConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            token_url: "https://aip.baidubce.com/oauth/2.0/token".to_string(),
            asr_url: "https://vop.baidu.com/server_api".to_string(),
            cuid: "talkback-client".to_string(),
            dev_pid: 80001,
        }
    }
}

/// iFlytek offline-transcription settings
#[derive(Debug, Clone)]
pub struct IflyConfig {
    /// Application id
    pub app_id: String,

    /// API key (goes into the Authorization header)
    pub api_key: String,

    /// API secret (HMAC signing key)
    pub api_secret: String,

    /// Host used in the signed canonical string
    pub host: String,

    /// Task-creation endpoint
    pub create_url: String,

    /// Task-query endpoint
    pub query_url: String,

    /// File-hosting collaborator endpoint (clip upload)
    pub upload_url: String,

    /// Maximum poll attempts before giving up
    pub poll_attempts: u32,

    /// Delay between poll attempts
    pub poll_interval: Duration,
}

impl Default for IflyConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            host: DEFAULT_IFLY_HOST.to_string(),
            create_url: format!("https://{DEFAULT_IFLY_HOST}/v2/ost/pro_create"),
            query_url: format!("https://{DEFAULT_IFLY_HOST}/v2/ost/query"),
            upload_url: "https://upload-ost-api.xfyun.cn/file/mpupload".to_string(),
            poll_attempts: 30,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Chat-completion configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Bearer token
    pub api_key: String,

    /// Chat-completion endpoint
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// System prompt prepended to every request
    pub system_prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Per-reply output token cap
    pub max_tokens: u32,

    /// Retained user+assistant entries after trimming
    pub history_limit: usize,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.deepseek.com/v1/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            system_prompt: "You are a friendly voice companion. Keep replies short \
                            and conversational."
                .to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            history_limit: 10,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Speech-synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Synthesis endpoint (GPT-SoVITS-style: `POST {text, text_language}`)
    pub endpoint: String,

    /// Language tag sent as `text_language`
    pub language: String,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9880".to_string(),
            language: "zh".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML file (if any), then
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing or
    /// unparseable.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("cannot read config file {}: {e}", p.display()))
                })?;
                toml::from_str::<ConfigFile>(&text)?
            }
            None => load_default_file(),
        };

        config.apply_file(file);
        config.apply_env();
        Ok(config)
    }

    /// Check that the active provider and the chat service have credentials
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing credential.
    pub fn validate(&self) -> Result<()> {
        match self.asr.provider {
            AsrProvider::Baidu => {
                if self.asr.baidu.api_key.is_empty() || self.asr.baidu.secret_key.is_empty() {
                    return Err(Error::Config(
                        "baidu ASR selected but api_key/secret_key are not set".to_string(),
                    ));
                }
            }
            AsrProvider::Ifly => {
                if self.asr.ifly.app_id.is_empty()
                    || self.asr.ifly.api_key.is_empty()
                    || self.asr.ifly.api_secret.is_empty()
                {
                    return Err(Error::Config(
                        "ifly ASR selected but app_id/api_key/api_secret are not set".to_string(),
                    ));
                }
            }
        }

        if self.chat.api_key.is_empty() {
            return Err(Error::Config("chat api_key is not set".to_string()));
        }

        Ok(())
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.voice.record_seconds {
            self.voice.record_seconds = v;
        }
        if let Some(v) = file.voice.journal_path {
            self.voice.journal_path = Some(PathBuf::from(v));
        }

        if let Some(v) = file.asr.provider
            && let Ok(p) = v.parse()
        {
            self.asr.provider = p;
        }

        let baidu = file.asr.baidu;
        apply_opt(&mut self.asr.baidu.api_key, baidu.api_key);
        apply_opt(&mut self.asr.baidu.secret_key, baidu.secret_key);
        apply_opt(&mut self.asr.baidu.token_url, baidu.token_url);
        apply_opt(&mut self.asr.baidu.asr_url, baidu.asr_url);
        apply_opt(&mut self.asr.baidu.cuid, baidu.cuid);
        if let Some(v) = baidu.dev_pid {
            self.asr.baidu.dev_pid = v;
        }

        let ifly = file.asr.ifly;
        apply_opt(&mut self.asr.ifly.app_id, ifly.app_id);
        apply_opt(&mut self.asr.ifly.api_key, ifly.api_key);
        apply_opt(&mut self.asr.ifly.api_secret, ifly.api_secret);
        apply_opt(&mut self.asr.ifly.upload_url, ifly.upload_url);
        if let Some(host) = ifly.host {
            self.asr.ifly.create_url = format!("https://{host}/v2/ost/pro_create");
            self.asr.ifly.query_url = format!("https://{host}/v2/ost/query");
            self.asr.ifly.host = host;
        }

        let chat = file.chat;
        apply_opt(&mut self.chat.api_key, chat.api_key);
        apply_opt(&mut self.chat.endpoint, chat.endpoint);
        apply_opt(&mut self.chat.model, chat.model);
        apply_opt(&mut self.chat.system_prompt, chat.system_prompt);
        if let Some(v) = chat.temperature {
            self.chat.temperature = v;
        }
        if let Some(v) = chat.max_tokens {
            self.chat.max_tokens = v;
        }
        if let Some(v) = chat.history_limit {
            self.chat.history_limit = v;
        }

        let tts = file.tts;
        apply_opt(&mut self.tts.endpoint, tts.endpoint);
        apply_opt(&mut self.tts.language, tts.language);
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("TALKBACK_ASR_PROVIDER")
            && let Ok(p) = v.parse()
        {
            self.asr.provider = p;
        }
        env_opt("TALKBACK_BAIDU_API_KEY", &mut self.asr.baidu.api_key);
        env_opt("TALKBACK_BAIDU_SECRET_KEY", &mut self.asr.baidu.secret_key);
        env_opt("TALKBACK_IFLY_APP_ID", &mut self.asr.ifly.app_id);
        env_opt("TALKBACK_IFLY_API_KEY", &mut self.asr.ifly.api_key);
        env_opt("TALKBACK_IFLY_API_SECRET", &mut self.asr.ifly.api_secret);
        env_opt("TALKBACK_CHAT_API_KEY", &mut self.chat.api_key);
    }
}

fn apply_opt(target: &mut String, value: Option<String>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn env_opt(name: &str, target: &mut String) {
    if let Ok(v) = std::env::var(name)
        && !v.is_empty()
    {
        *target = v;
    }
}

/// Load `./talkback.toml` if present; defaults otherwise
fn load_default_file() -> ConfigFile {
    let path = Path::new("talkback.toml");
    if !path.exists() {
        return ConfigFile::default();
    }
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unparseable talkback.toml");
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable talkback.toml");
            ConfigFile::default()
        }
    }
}

/// Top-level TOML schema; every field optional
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    voice: VoiceFileConfig,

    #[serde(default)]
    asr: AsrFileConfig,

    #[serde(default)]
    chat: ChatFileConfig,

    #[serde(default)]
    tts: TtsFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct VoiceFileConfig {
    record_seconds: Option<u64>,
    journal_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AsrFileConfig {
    provider: Option<String>,

    #[serde(default)]
    baidu: BaiduFileConfig,

    #[serde(default)]
    ifly: IflyFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct BaiduFileConfig {
    api_key: Option<String>,
    secret_key: Option<String>,
    token_url: Option<String>,
    asr_url: Option<String>,
    cuid: Option<String>,
    dev_pid: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct IflyFileConfig {
    app_id: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    host: Option<String>,
    upload_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatFileConfig {
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    system_prompt: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    history_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TtsFileConfig {
    endpoint: Option<String>,
    language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_aliases() {
        assert_eq!("baidu".parse::<AsrProvider>().unwrap(), AsrProvider::Baidu);
        assert_eq!("IFLY".parse::<AsrProvider>().unwrap(), AsrProvider::Ifly);
        assert_eq!("xfyun".parse::<AsrProvider>().unwrap(), AsrProvider::Ifly);
        assert!("whisper".parse::<AsrProvider>().is_err());
    }

    #[test]
    fn file_overlay_keeps_defaults_for_missing_fields() {
        let file: ConfigFile = toml::from_str(
            r#"
            [asr]
            provider = "ifly"

            [asr.ifly]
            app_id = "app"
            host = "example.test"

            [chat]
            model = "deepseek-reasoner"
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_file(file);

        assert_eq!(config.asr.provider, AsrProvider::Ifly);
        assert_eq!(config.asr.ifly.app_id, "app");
        assert_eq!(config.asr.ifly.host, "example.test");
        assert_eq!(config.asr.ifly.create_url, "https://example.test/v2/ost/pro_create");
        assert_eq!(config.chat.model, "deepseek-reasoner");
        // untouched defaults
        assert_eq!(config.voice.record_seconds, 5);
        assert_eq!(config.chat.history_limit, 10);
        assert_eq!(config.asr.ifly.poll_attempts, 30);
    }

    #[test]
    fn validate_requires_active_provider_credentials() {
        let mut config = Config::default();
        config.chat.api_key = "key".to_string();
        assert!(config.validate().is_err());

        config.asr.baidu.api_key = "id".to_string();
        config.asr.baidu.secret_key = "secret".to_string();
        assert!(config.validate().is_ok());

        config.asr.provider = AsrProvider::Ifly;
        assert!(config.validate().is_err());
    }
}
