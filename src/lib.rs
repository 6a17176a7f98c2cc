//! Talkback - a turn-taking voice assistant loop
//!
//! Records microphone audio, transcribes it through a remote
//! speech-recognition backend, feeds the transcript to a chat-completion
//! service, synthesizes the reply and plays it back, forever.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 TurnOrchestrator                      │
//! │  capture → gate → transcribe → chat → tts → playback │
//! └───────┬──────────────┬────────────┬────────┬─────────┘
//!         │              │            │        │
//!      cpal mic    Baidu / iFly   DeepSeek   SoVITS
//!                  (ASR backends)   chat     endpoint
//! ```
//!
//! Transcription and conversation failures never abort the loop: each is
//! flattened to a fixed spoken fallback message at the orchestration
//! boundary. Only audio-device failures are fatal.

pub mod asr;
pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod journal;
pub mod pipeline;
pub mod tts;

pub use asr::{AsrError, TranscriptionBackend};
pub use audio::{AudioCapture, AudioClip, AudioPlayback, SAMPLE_RATE};
pub use chat::{ChatError, ChatMessage, ConversationSession, Role};
pub use config::Config;
pub use error::{Error, Result};
pub use journal::InteractionJournal;
pub use pipeline::TurnOrchestrator;
pub use tts::{SpeechSynthesizer, TtsError};
