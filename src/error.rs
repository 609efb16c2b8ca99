//! Error types for the chime voice pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone access was refused by the user or OS
    #[error("microphone permission denied")]
    PermissionDenied,

    /// No usable audio input device
    #[error("no microphone found")]
    DeviceNotFound,

    /// Input device failed while acquiring or recording
    #[error("audio device error: {0}")]
    DeviceError(String),

    /// Recorder stopped without producing any chunks
    #[error("no audio captured")]
    EmptyCapture,

    /// Assembled capture is below the minimum payload size
    #[error("capture too short: {size} bytes (minimum {min})")]
    TooShort {
        /// Assembled payload size
        size: usize,
        /// Configured minimum
        min: usize,
    },

    /// Transport text is not valid base64
    #[error("malformed audio encoding: {0}")]
    MalformedEncoding(String),

    /// Request failed before an HTTP status was received
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Backend answered with a non-success status
    #[error("backend error {status}: {body}")]
    NonOkStatus {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// Transcription succeeded but returned blank text
    #[error("no speech recognized")]
    EmptyTranscript,

    /// Playback could not start or aborted mid-stream
    #[error("playback failure: {0}")]
    PlaybackFailure(String),

    /// Another pipeline invocation is already in flight
    #[error("pipeline busy")]
    Busy,

    /// Language code not in the catalog
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    /// No candidate container/codec pair is supported by the recorder
    #[error("no supported audio container")]
    UnsupportedContainer,
}
