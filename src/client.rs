//! HTTP transport client for the voice backend
//!
//! Two calls matter to the pipeline: `transcribe` (speech service) and
//! `converse` (chat service, which may attach synthesized speech).
//! `synthesize` talks to the standalone TTS route and exists for the
//! hardware doctor commands. Every error is normalized into the pipeline
//! taxonomy; nothing here retries.

use async_trait::async_trait;

use crate::config::SpeakerIdentity;
use crate::language::Language;
use crate::{Error, Result};

/// A chat reply, with synthesized speech when the backend attached it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Assistant reply text
    pub text: String,
    /// Base64 MP3, present only when the backend synthesized audio
    pub audio: Option<String>,
}

/// Backend contract the orchestrator depends on
#[async_trait(?Send)]
pub trait VoiceBackend {
    /// Transcribe base64 audio to text
    ///
    /// # Errors
    ///
    /// `NetworkFailure`, `NonOkStatus`, or `EmptyTranscript` when the
    /// service succeeds with blank text.
    async fn transcribe(&self, audio_base64: &str, language: Language) -> Result<String>;

    /// Send one user message to the chat service
    ///
    /// # Errors
    ///
    /// `NetworkFailure` or `NonOkStatus`.
    async fn converse(
        &self,
        message: &str,
        language: Language,
        speaker: &SpeakerIdentity,
    ) -> Result<ChatReply>;

    /// Synthesize speech for arbitrary text
    ///
    /// # Errors
    ///
    /// `NetworkFailure` or `NonOkStatus`.
    async fn synthesize(&self, text: &str, language: Language) -> Result<String>;
}

#[derive(serde::Serialize)]
struct SttRequest<'a> {
    audio: &'a str,
    language: &'a str,
}

#[derive(serde::Deserialize)]
struct SttResponse {
    text: String,
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    language: &'a str,
    speaker_id: &'a str,
    speaker_name: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    response: String,
    audio: Option<String>,
}

#[derive(serde::Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(serde::Deserialize)]
struct TtsResponse {
    audio: String,
}

/// reqwest-backed implementation of [`VoiceBackend`]
pub struct HttpVoiceBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVoiceBackend {
    /// Create a client for the given backend base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        route: &str,
        body: &impl serde::Serialize,
    ) -> Result<T> {
        let url = format!("{}{route}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(route, error = %e, "request failed");
                Error::NetworkFailure(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(route, status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(route, status = %status, body = %body, "backend error");
            return Err(Error::NonOkStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::NetworkFailure(e.to_string()))
    }
}

#[async_trait(?Send)]
impl VoiceBackend for HttpVoiceBackend {
    async fn transcribe(&self, audio_base64: &str, language: Language) -> Result<String> {
        tracing::debug!(
            encoded_len = audio_base64.len(),
            %language,
            "starting transcription"
        );

        let result: SttResponse = self
            .post_json(
                "/voice/stt",
                &SttRequest {
                    audio: audio_base64,
                    language: language.code(),
                },
            )
            .await?;

        let text = result.text.trim();
        if text.is_empty() {
            tracing::info!("transcription returned no speech");
            return Err(Error::EmptyTranscript);
        }

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text.to_string())
    }

    async fn converse(
        &self,
        message: &str,
        language: Language,
        speaker: &SpeakerIdentity,
    ) -> Result<ChatReply> {
        tracing::debug!(%language, speaker = %speaker.id, "sending chat message");

        let result: ChatResponse = self
            .post_json(
                "/voice/chat",
                &ChatRequest {
                    message,
                    language: language.code(),
                    speaker_id: &speaker.id,
                    speaker_name: &speaker.name,
                },
            )
            .await?;

        tracing::info!(
            reply_len = result.response.len(),
            has_audio = result.audio.is_some(),
            "chat reply received"
        );

        Ok(ChatReply {
            text: result.response,
            audio: result.audio.filter(|a| !a.is_empty()),
        })
    }

    async fn synthesize(&self, text: &str, language: Language) -> Result<String> {
        tracing::debug!(%language, text_len = text.len(), "requesting synthesis");

        let result: TtsResponse = self
            .post_json(
                "/voice/tts",
                &TtsRequest {
                    text,
                    language: language.code(),
                },
            )
            .await?;

        Ok(result.audio)
    }
}
