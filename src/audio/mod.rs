//! Audio capture and playback
//!
//! Device access goes through the [`Recorder`] and [`AudioSink`] traits so
//! the pipeline can run against mocks; the native implementations use cpal.

mod capture;
mod mime;
mod playback;

pub use capture::{
    AudioPayload, CaptureConstraints, CaptureSession, CaptureStatus, NativeRecorder, Recorder,
};
pub use mime::{DEFAULT_CANDIDATES, MimeType, negotiate};
pub use playback::{
    AudioSink, DecodedAudio, NativeSink, PlaybackSession, PlaybackStatus, decode_for_playback,
};
