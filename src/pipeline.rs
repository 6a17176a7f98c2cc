//! The turn-taking orchestration loop
//!
//! One turn is capture → gate/transcribe → converse → synthesize → play,
//! each stage feeding its output to the next. Transcription and
//! conversation failures are flattened to fixed spoken fallback messages
//! and the loop keeps going; a failed synthesis skips playback for the
//! turn. Only audio-device failures propagate and end the process.

use std::time::Duration;

use crate::asr::{self, TranscriptionBackend};
use crate::audio::{AudioCapture, AudioPlayback};
use crate::chat::ConversationSession;
use crate::config::Config;
use crate::journal::InteractionJournal;
use crate::tts::SpeechSynthesizer;
use crate::Result;

/// Drives the voice loop; owns every collaborator for the process lifetime
pub struct TurnOrchestrator {
    capture: AudioCapture,
    playback: AudioPlayback,
    backend: Box<dyn TranscriptionBackend>,
    session: ConversationSession,
    synthesizer: SpeechSynthesizer,
    journal: Option<InteractionJournal>,
    record_duration: Duration,
}

impl TurnOrchestrator {
    /// Build the orchestrator and all of its collaborators
    ///
    /// # Errors
    ///
    /// Returns error if an audio device is unavailable or an HTTP client
    /// cannot be built
    pub fn new(config: &Config) -> Result<Self> {
        let capture = AudioCapture::new()?;
        let playback = AudioPlayback::new()?;
        let backend = asr::create_backend(&config.asr)?;
        let session = ConversationSession::new(config.chat.clone())?;
        let synthesizer = SpeechSynthesizer::new(config.tts.clone())?;
        let journal = config
            .voice
            .journal_path
            .clone()
            .map(InteractionJournal::new);

        tracing::info!(
            backend = backend.name(),
            record_seconds = config.voice.record_seconds,
            "orchestrator ready"
        );

        Ok(Self {
            capture,
            playback,
            backend,
            session,
            synthesizer,
            journal,
            record_duration: Duration::from_secs(config.voice.record_seconds),
        })
    }

    /// Run turns until the process is terminated
    ///
    /// # Errors
    ///
    /// Returns error only on audio-device failure
    #[allow(clippy::future_not_send)] // cpal streams aren't Send
    pub async fn run(mut self) -> Result<()> {
        let mut turn: u64 = 0;
        loop {
            turn += 1;
            tracing::debug!(turn, "starting turn");
            self.run_turn(turn).await?;
        }
    }

    /// One full cycle; each stage's output is the next stage's sole input
    #[allow(clippy::future_not_send)]
    async fn run_turn(&mut self, turn: u64) -> Result<()> {
        let clip = self.capture.record(self.record_duration).await?;

        // Transcription failures degrade to a spoken message and still
        // flow through the chat stage as ordinary user text
        let user_text = match self.backend.transcribe(&clip).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(turn, backend = self.backend.name(), error = %e, "transcription failed");
                e.user_message()
            }
        };
        tracing::info!(turn, user = %user_text, "user turn");

        let reply = match self.session.exchange(&user_text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(turn, error = %e, "chat exchange failed");
                e.user_message()
            }
        };
        tracing::info!(turn, reply = %reply, "assistant turn");

        if let Some(journal) = &self.journal
            && let Err(e) = journal.append(&user_text, &reply)
        {
            tracing::warn!(turn, error = %e, "journal write failed");
        }

        match self.synthesizer.synthesize(&reply).await {
            Ok(audio) => self.playback.play_wav(&audio).await?,
            Err(e) => {
                tracing::error!(turn, error = %e, "synthesis failed, skipping playback");
            }
        }

        Ok(())
    }
}
