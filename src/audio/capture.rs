//! Microphone capture session
//!
//! A [`CaptureSession`] owns one recorder for the life of a recording: it
//! negotiates the container, buffers the chunks the recorder emits, and on
//! stop releases the device before validating and assembling the payload.
//! The [`Recorder`] trait is the seam between the session and the hardware;
//! [`NativeRecorder`] is the cpal implementation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};
use tokio::sync::mpsc;

use super::mime::{DEFAULT_CANDIDATES, MimeType, negotiate};
use crate::{Error, Result};

/// Requested input constraints, fixed for the whole session
#[derive(Debug, Clone)]
pub struct CaptureConstraints {
    /// Input channel count (mono for speech)
    pub channels: u16,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Ask the device stack to cancel echo
    pub echo_cancellation: bool,
    /// Ask the device stack to suppress noise
    pub noise_suppression: bool,
    /// Ask the device stack to normalize gain
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 48_000,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// One assembled recording, ready for transport encoding
///
/// Built exactly once per capture by concatenating the recorder's chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// Encoded audio, a complete stream in `mime` form
    pub bytes: Vec<u8>,
    /// Container/codec pair negotiated at start
    pub mime: MimeType,
}

impl AudioPayload {
    /// Wrap assembled bytes
    #[must_use]
    pub const fn new(bytes: Vec<u8>, mime: MimeType) -> Self {
        Self { bytes, mime }
    }

    /// Payload size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Capture lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// No device held
    Idle,
    /// Waiting on device acquisition (permission prompt included)
    Requesting,
    /// Device held, chunks accumulating
    Recording,
    /// Finalizing and releasing the device
    Stopping,
}

/// Device-facing recorder abstraction
///
/// A recorder emits binary fragments whose concatenation is a valid stream
/// of the negotiated container. The channel closes after the terminal chunk.
/// Not `Send`: cpal streams are thread-bound, so the whole pipeline runs on
/// one task.
#[async_trait(?Send)]
pub trait Recorder {
    /// Capability probe used for container negotiation
    fn supports(&self, mime: MimeType) -> bool;

    /// Acquire the input device and begin emitting chunks every
    /// `chunk_interval`
    ///
    /// # Errors
    ///
    /// `PermissionDenied`, `DeviceNotFound`, or `DeviceError` when the
    /// device cannot be acquired.
    async fn start(
        &mut self,
        constraints: &CaptureConstraints,
        mime: MimeType,
        chunk_interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>>;

    /// Stop recording: flush the terminal chunk and close the channel
    ///
    /// # Errors
    ///
    /// `DeviceError` if the recorder cannot finalize cleanly.
    async fn finalize(&mut self) -> Result<()>;

    /// Release the input device. Idempotent, callable from any state.
    fn release(&mut self);
}

/// Owns the microphone for one recording at a time
pub struct CaptureSession {
    status: CaptureStatus,
    recorder: Box<dyn Recorder>,
    chunks: Vec<Vec<u8>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    mime: Option<MimeType>,
    constraints: CaptureConstraints,
    chunk_interval: Duration,
    min_payload_bytes: usize,
}

impl CaptureSession {
    /// Create a session around a recorder
    #[must_use]
    pub fn new(
        recorder: Box<dyn Recorder>,
        constraints: CaptureConstraints,
        chunk_interval: Duration,
        min_payload_bytes: usize,
    ) -> Self {
        Self {
            status: CaptureStatus::Idle,
            recorder,
            chunks: Vec::new(),
            rx: None,
            mime: None,
            constraints,
            chunk_interval,
            min_payload_bytes,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn status(&self) -> CaptureStatus {
        self.status
    }

    /// Whether a recording is in progress
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.status == CaptureStatus::Recording
    }

    /// Begin recording
    ///
    /// Negotiates the container, acquires the device, and transitions
    /// `Idle → Recording`. A failed acquisition resets to `Idle` with the
    /// device released.
    ///
    /// # Errors
    ///
    /// `UnsupportedContainer` when no candidate passes the recorder's probe;
    /// otherwise whatever the recorder's acquisition raised.
    pub async fn start(&mut self) -> Result<()> {
        if self.status != CaptureStatus::Idle {
            tracing::warn!(status = ?self.status, "capture start ignored, session not idle");
            return Ok(());
        }

        self.status = CaptureStatus::Requesting;

        let Some(mime) = negotiate(&DEFAULT_CANDIDATES, |m| self.recorder.supports(m)) else {
            self.status = CaptureStatus::Idle;
            return Err(Error::UnsupportedContainer);
        };

        match self
            .recorder
            .start(&self.constraints, mime, self.chunk_interval)
            .await
        {
            Ok(rx) => {
                self.chunks.clear();
                self.rx = Some(rx);
                self.mime = Some(mime);
                self.status = CaptureStatus::Recording;
                tracing::info!(%mime, "recording started");
                Ok(())
            }
            Err(e) => {
                self.recorder.release();
                self.status = CaptureStatus::Idle;
                Err(e)
            }
        }
    }

    /// Move chunks the recorder has emitted so far into the session buffer
    pub fn pump(&mut self) {
        if self.status != CaptureStatus::Recording {
            return;
        }
        if let Some(rx) = &mut self.rx {
            while let Ok(chunk) = rx.try_recv() {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
        }
    }

    /// Stop recording and assemble the payload
    ///
    /// Returns `Ok(None)` (with a logged warning) when no recording is in
    /// progress. The device is released before validation, so a too-short
    /// capture never leaves the microphone held.
    ///
    /// # Errors
    ///
    /// `EmptyCapture` when the recorder produced nothing, `TooShort` when
    /// the assembled payload is under the minimum size, or the recorder's
    /// own finalize error.
    pub async fn stop(&mut self) -> Result<Option<AudioPayload>> {
        if self.status != CaptureStatus::Recording {
            tracing::warn!(status = ?self.status, "capture stop ignored, not recording");
            return Ok(None);
        }

        self.pump();
        self.status = CaptureStatus::Stopping;

        let finalized = self.recorder.finalize().await;

        // Drain the terminal chunk and anything still queued.
        if let Some(mut rx) = self.rx.take() {
            while let Some(chunk) = rx.recv().await {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
        }

        // Device release is unconditional; a held stream keeps the mic
        // indicator lit and can block the next acquisition.
        self.recorder.release();
        self.status = CaptureStatus::Idle;

        let mime = self.mime.take();
        let chunks = std::mem::take(&mut self.chunks);

        finalized?;

        if chunks.is_empty() {
            return Err(Error::EmptyCapture);
        }

        let bytes = chunks.concat();
        let size = bytes.len();
        if size < self.min_payload_bytes {
            return Err(Error::TooShort {
                size,
                min: self.min_payload_bytes,
            });
        }

        let mime =
            mime.ok_or_else(|| Error::DeviceError("no container negotiated".to_string()))?;
        tracing::debug!(size, %mime, "capture assembled");
        Ok(Some(AudioPayload::new(bytes, mime)))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.recorder.release();
    }
}

/// cpal-backed recorder emitting WAV chunks
///
/// Emits a streaming RIFF header as its first chunk, then 16-bit PCM
/// fragments on the configured cadence. The header carries the
/// unknown-length sentinel in both size fields, as piped WAV does.
pub struct NativeRecorder {
    stream: Option<Stream>,
    shared: Option<Arc<Mutex<ChunkBuffer>>>,
}

struct ChunkBuffer {
    pending: Vec<f32>,
    chunk_samples: usize,
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl ChunkBuffer {
    fn push(&mut self, data: &[f32]) {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= self.chunk_samples {
            let rest = self.pending.split_off(self.chunk_samples);
            let chunk = pcm16_bytes(&self.pending);
            self.pending = rest;
            self.send(chunk);
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let chunk = pcm16_bytes(&std::mem::take(&mut self.pending));
            self.send(chunk);
        }
        self.tx = None;
    }

    fn send(&self, chunk: Vec<u8>) {
        if let Some(tx) = &self.tx {
            // Receiver gone means the session is tearing down; drop the chunk.
            let _ = tx.send(chunk);
        }
    }
}

impl NativeRecorder {
    /// Create an inactive recorder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stream: None,
            shared: None,
        }
    }
}

impl Default for NativeRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Recorder for NativeRecorder {
    fn supports(&self, mime: MimeType) -> bool {
        mime == MimeType::Wav
    }

    async fn start(
        &mut self,
        constraints: &CaptureConstraints,
        mime: MimeType,
        chunk_interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
        if self.stream.is_some() {
            return Err(Error::DeviceError("recorder already active".to_string()));
        }
        if !self.supports(mime) {
            return Err(Error::UnsupportedContainer);
        }

        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(Error::DeviceNotFound)?;

        let rate = constraints.sample_rate;
        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceError(e.to_string()))?
            .find(|c| {
                c.channels() == constraints.channels
                    && c.min_sample_rate() <= SampleRate(rate)
                    && c.max_sample_rate() >= SampleRate(rate)
            })
            .ok_or_else(|| {
                Error::DeviceError(format!(
                    "no input config for {} channel(s) at {rate} Hz",
                    constraints.channels
                ))
            })?;
        let config = supported.with_sample_rate(SampleRate(rate)).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = rate,
            channels = constraints.channels,
            echo_cancellation = constraints.echo_cancellation,
            noise_suppression = constraints.noise_suppression,
            auto_gain_control = constraints.auto_gain_control,
            "input device acquired"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(wav_stream_header(rate, constraints.channels).to_vec());

        #[allow(clippy::cast_possible_truncation)]
        let chunk_samples =
            ((u64::from(rate) * chunk_interval.as_millis() as u64 / 1000) as usize).max(1);

        let shared = Arc::new(Mutex::new(ChunkBuffer {
            pending: Vec::new(),
            chunk_samples,
            tx: Some(tx),
        }));

        let buffer = Arc::clone(&shared);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| acquisition_error(&e))?;

        stream
            .play()
            .map_err(|e| Error::DeviceError(e.to_string()))?;

        self.stream = Some(stream);
        self.shared = Some(shared);
        Ok(rx)
    }

    async fn finalize(&mut self) -> Result<()> {
        // Dropping the stream stops the callback thread before the flush.
        drop(self.stream.take());
        if let Some(shared) = &self.shared {
            if let Ok(mut buf) = shared.lock() {
                buf.flush();
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("input stream released");
        }
        if let Some(shared) = self.shared.take() {
            if let Ok(mut buf) = shared.lock() {
                buf.tx = None;
            }
        }
    }
}

/// Map a cpal acquisition failure onto the capture error taxonomy
fn acquisition_error(e: &cpal::BuildStreamError) -> Error {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => Error::DeviceNotFound,
        other => {
            let msg = other.to_string();
            if msg.to_ascii_lowercase().contains("permission") {
                Error::PermissionDenied
            } else {
                Error::DeviceError(msg)
            }
        }
    }
}

/// Convert f32 samples to 16-bit little-endian PCM bytes
fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// 44-byte RIFF/WAVE header for 16-bit PCM with unknown stream length
fn wav_stream_header(sample_rate: u32, channels: u16) -> [u8; 44] {
    let block_align = channels * 2;
    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&16u16.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
    header
}
