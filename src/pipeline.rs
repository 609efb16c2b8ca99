//! Pipeline orchestrator
//!
//! Owns the capture and playback sessions, the transport client, and the
//! conversation state, and sequences the two user-visible flows:
//!
//! - capture: stop → encode → transcribe → editable draft (never auto-sent)
//! - send: append user turn → converse → append assistant turn → playback
//!
//! A single `processing` flag serializes invocations; it is restored on
//! every exit path.

use crate::audio::{AudioSink, CaptureSession, PlaybackSession, PlaybackStatus, Recorder};
use crate::client::VoiceBackend;
use crate::config::{Config, SpeakerIdentity};
use crate::conversation::{Conversation, ConversationTurn, TranscriptDraft};
use crate::language::Language;
use crate::{Error, Result, encoding};

/// Holds the in-flight flag true, restoring it even when the owning future
/// is dropped mid-await
struct ProcessingGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> ProcessingGuard<'a> {
    fn engage(flag: &'a mut bool) -> Self {
        *flag = true;
        Self { flag }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

/// Orchestrates one voice conversation
pub struct Pipeline {
    capture: CaptureSession,
    playback: PlaybackSession,
    backend: Box<dyn VoiceBackend>,
    history: Conversation,
    draft: TranscriptDraft,
    language: Language,
    speaker: SpeakerIdentity,
    processing: bool,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators
    #[must_use]
    pub fn new(
        config: &Config,
        recorder: Box<dyn Recorder>,
        sink: Box<dyn AudioSink>,
        backend: Box<dyn VoiceBackend>,
    ) -> Self {
        Self {
            capture: CaptureSession::new(
                recorder,
                crate::audio::CaptureConstraints {
                    sample_rate: config.sample_rate,
                    ..crate::audio::CaptureConstraints::default()
                },
                config.chunk_interval,
                config.min_payload_bytes,
            ),
            playback: PlaybackSession::new(sink),
            backend,
            history: Conversation::new(),
            draft: TranscriptDraft::default(),
            language: config.language,
            speaker: config.speaker.clone(),
            processing: false,
        }
    }

    /// Begin recording from the microphone
    ///
    /// # Errors
    ///
    /// `Busy` while a transcribe or send cycle is in flight; otherwise the
    /// capture session's acquisition error.
    pub async fn start_capture(&mut self) -> Result<()> {
        if self.processing {
            tracing::warn!("capture start rejected, request in flight");
            return Err(Error::Busy);
        }
        self.capture.start().await
    }

    /// Stop recording, transcribe, and fill the draft
    ///
    /// Returns the transcript, or `None` when nothing was recording. The
    /// transcript only lands in the draft; the conversation is untouched.
    ///
    /// # Errors
    ///
    /// Capture validation errors (`EmptyCapture`, `TooShort`), transport
    /// errors, or `EmptyTranscript`. The draft is left unchanged on every
    /// failure.
    pub async fn stop_capture(&mut self) -> Result<Option<String>> {
        let Some(payload) = self.capture.stop().await? else {
            return Ok(None);
        };

        let guard = ProcessingGuard::engage(&mut self.processing);
        let encoded = encoding::encode(&payload);
        let result = self.backend.transcribe(&encoded, self.language).await;
        drop(guard);

        let text = result?;
        self.draft.fill(text.clone(), self.language);
        Ok(Some(text))
    }

    /// Send the draft to the chat service
    ///
    /// The user turn is appended before the network call and stays in the
    /// history even when the call fails. A blank draft is a no-op.
    ///
    /// # Errors
    ///
    /// `Busy` while another cycle is in flight, or the transport error from
    /// `converse`.
    pub async fn send(&mut self) -> Result<()> {
        if self.processing {
            tracing::warn!("send rejected, request in flight");
            return Err(Error::Busy);
        }
        if self.draft.is_blank() {
            tracing::debug!("send skipped, draft is blank");
            return Ok(());
        }

        let message = self.draft.take();
        self.history.push_user(message.clone());

        let guard = ProcessingGuard::engage(&mut self.processing);
        let result = self
            .backend
            .converse(&message, self.language, &self.speaker)
            .await;

        match result {
            Ok(reply) => {
                self.history.push_assistant(reply.text);
                // Playback failures never touch the history.
                if let Some(encoded) = reply.audio {
                    match encoding::decode(&encoded) {
                        Ok(bytes) => {
                            if let Err(e) = self.playback.play(&bytes) {
                                tracing::warn!(error = %e, "assistant audio playback failed");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "assistant audio was malformed");
                        }
                    }
                }
                drop(guard);
                Ok(())
            }
            // The user turn was genuinely sent; it stays.
            Err(e) => {
                drop(guard);
                Err(e)
            }
        }
    }

    /// Switch the transcription/synthesis language
    ///
    /// # Errors
    ///
    /// `Busy` while recording or processing (the selection is locked), or
    /// `UnknownLanguage` for codes outside the catalog.
    pub fn set_language(&mut self, code: &str) -> Result<Language> {
        if self.processing || self.capture.is_recording() {
            return Err(Error::Busy);
        }
        self.language = Language::from_code(code)?;
        tracing::debug!(language = %self.language, "language selected");
        Ok(self.language)
    }

    /// Replace the draft text through a user edit
    pub fn edit_draft(&mut self, text: impl Into<String>) {
        self.draft.edit(text);
    }

    /// Conversation so far, oldest turn first
    #[must_use]
    pub fn history(&self) -> &[ConversationTurn] {
        self.history.turns()
    }

    /// The editable draft
    #[must_use]
    pub const fn draft(&self) -> &TranscriptDraft {
        &self.draft
    }

    /// Active language selection
    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Whether a transcribe or send cycle is in flight
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    /// Whether the microphone is currently held
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    /// Current playback state
    #[must_use]
    pub const fn playback_status(&self) -> PlaybackStatus {
        self.playback.status()
    }

    /// Wait for assistant audio to finish
    ///
    /// # Errors
    ///
    /// `PlaybackFailure` when the sink failed mid-stream.
    pub async fn await_playback(&mut self) -> Result<()> {
        self.playback.await_end().await
    }

    /// Cut off assistant audio
    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }
}
