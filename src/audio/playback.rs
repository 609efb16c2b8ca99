//! Assistant speech playback
//!
//! A [`PlaybackSession`] owns the single output sink: starting a new blob
//! tears the previous one down first, and every exit path — natural end,
//! explicit stop, or failure — releases the underlying stream. Completion is
//! awaitable instead of callback-driven.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Decoded audio ready for a sink
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Playback lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Nothing queued
    Idle,
    /// Decoding the blob
    Loading,
    /// Sink is emitting audio
    Playing,
    /// Finished or stopped; resources released
    Ended,
    /// Decode or sink failure; resources released
    Failed,
}

/// Output-device abstraction
///
/// `begin` hands back a receiver that resolves exactly once, when the sink
/// drains or fails. Implementations release their stream in `stop`, which
/// must be idempotent.
pub trait AudioSink {
    /// Start emitting the decoded audio
    ///
    /// # Errors
    ///
    /// `PlaybackFailure` when the output device cannot be driven.
    fn begin(&mut self, audio: DecodedAudio) -> Result<oneshot::Receiver<Result<()>>>;

    /// Tear down the active output stream
    fn stop(&mut self);
}

/// Queue-of-one playback lifecycle around a sink
pub struct PlaybackSession {
    status: PlaybackStatus,
    sink: Box<dyn AudioSink>,
    done: Option<oneshot::Receiver<Result<()>>>,
}

impl PlaybackSession {
    /// Create an idle session around a sink
    #[must_use]
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            sink,
            done: None,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Whether a blob is loading or audible right now
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.status, PlaybackStatus::Loading | PlaybackStatus::Playing)
    }

    /// Decode a blob and start playing it
    ///
    /// Any active playback is torn down first, so at most one output stream
    /// exists afterward.
    ///
    /// # Errors
    ///
    /// `PlaybackFailure` when the blob cannot be decoded or the sink cannot
    /// start; the session lands in `Failed` with resources released.
    pub fn play(&mut self, bytes: &[u8]) -> Result<()> {
        if self.is_active() {
            tracing::debug!("replacing active playback");
            self.sink.stop();
            self.done = None;
        }

        self.status = PlaybackStatus::Loading;

        let audio = match decode_for_playback(bytes) {
            Ok(audio) => audio,
            Err(e) => {
                self.sink.stop();
                self.status = PlaybackStatus::Failed;
                return Err(e);
            }
        };

        match self.sink.begin(audio) {
            Ok(done) => {
                self.done = Some(done);
                self.status = PlaybackStatus::Playing;
                tracing::debug!("playback started");
                Ok(())
            }
            Err(e) => {
                self.sink.stop();
                self.status = PlaybackStatus::Failed;
                Err(e)
            }
        }
    }

    /// Wait for the active playback to finish
    ///
    /// Resolves immediately when nothing is active. The sink is released on
    /// every outcome.
    ///
    /// # Errors
    ///
    /// `PlaybackFailure` when the sink reported an error or vanished without
    /// completing.
    pub async fn await_end(&mut self) -> Result<()> {
        let Some(done) = self.done.take() else {
            return Ok(());
        };

        let outcome = match done.await {
            Ok(result) => result,
            Err(_) => Err(Error::PlaybackFailure(
                "sink dropped without completing".to_string(),
            )),
        };

        self.sink.stop();
        match outcome {
            Ok(()) => {
                self.status = PlaybackStatus::Ended;
                tracing::debug!("playback complete");
                Ok(())
            }
            Err(e) => {
                self.status = PlaybackStatus::Failed;
                Err(e)
            }
        }
    }

    /// Stop the active playback, releasing the sink
    pub fn stop(&mut self) {
        if self.is_active() {
            self.sink.stop();
            self.done = None;
            self.status = PlaybackStatus::Ended;
            tracing::debug!("playback stopped");
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

/// Decode an assistant audio blob into mono samples
///
/// The chat service attaches MP3; WAV is accepted for backends configured
/// with uncompressed voices. Stereo sources are downmixed by averaging.
///
/// # Errors
///
/// `PlaybackFailure` when the blob is neither readable WAV nor MP3.
pub fn decode_for_playback(bytes: &[u8]) -> Result<DecodedAudio> {
    let audio = if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)?
    } else {
        decode_mp3(bytes)?
    };

    if audio.samples.is_empty() {
        return Err(Error::PlaybackFailure("no audio frames decoded".to_string()));
    }
    Ok(audio)
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::PlaybackFailure(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::PlaybackFailure(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::PlaybackFailure(e.to_string()))?
        }
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    #[allow(clippy::cast_sign_loss)]
                    {
                        sample_rate = frame.sample_rate as u32;
                    }
                }
                let frame_samples: Vec<f32> = frame
                    .data
                    .iter()
                    .map(|&s| f32::from(s) / 32768.0)
                    .collect();
                samples.extend(downmix(&frame_samples, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::PlaybackFailure(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::PlaybackFailure("no audio frames decoded".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Average interleaved channels down to mono
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    #[allow(clippy::cast_precision_loss)]
    let divisor = channels as f32;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / divisor)
        .collect()
}

/// cpal-backed output sink
pub struct NativeSink {
    stream: Option<Stream>,
}

impl NativeSink {
    /// Create an inactive sink
    #[must_use]
    pub const fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for NativeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for NativeSink {
    fn begin(&mut self, audio: DecodedAudio) -> Result<oneshot::Receiver<Result<()>>> {
        self.stop();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::PlaybackFailure("no output device available".to_string()))?;

        let rate = audio.sample_rate;
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::PlaybackFailure(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(rate)
                    && c.max_sample_rate() >= SampleRate(rate)
            })
            .or_else(|| {
                // Fallback: stereo output, each frame duplicated
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(rate)
                        && c.max_sample_rate() >= SampleRate(rate)
                })
            })
            .ok_or_else(|| {
                Error::PlaybackFailure(format!("no output config for {rate} Hz"))
            })?;
        let config = supported.with_sample_rate(SampleRate(rate)).config();
        let channels = usize::from(config.channels);

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = rate,
            channels,
            samples = audio.samples.len(),
            "output device acquired"
        );

        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Mutex::new(Some(tx)));
        let on_error = Arc::clone(&completion);

        let samples = audio.samples;
        let mut position = 0usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = if position < samples.len() {
                            let v = samples[position];
                            position += 1;
                            v
                        } else {
                            if let Ok(mut slot) = completion.lock() {
                                if let Some(tx) = slot.take() {
                                    let _ = tx.send(Ok(()));
                                }
                            }
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    if let Ok(mut slot) = on_error.lock() {
                        if let Some(tx) = slot.take() {
                            let _ = tx.send(Err(Error::PlaybackFailure(err.to_string())));
                        }
                    }
                },
                None,
            )
            .map_err(|e| Error::PlaybackFailure(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::PlaybackFailure(e.to_string()))?;
        self.stream = Some(stream);
        Ok(rx)
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("output stream released");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct SinkState {
        begun: usize,
        stops: usize,
        tx: Option<oneshot::Sender<Result<()>>>,
        fail_begin: bool,
    }

    struct ScriptedSink {
        state: Rc<RefCell<SinkState>>,
    }

    impl AudioSink for ScriptedSink {
        fn begin(&mut self, _audio: DecodedAudio) -> Result<oneshot::Receiver<Result<()>>> {
            let mut state = self.state.borrow_mut();
            if state.fail_begin {
                return Err(Error::PlaybackFailure("sink refused".to_string()));
            }
            state.begun += 1;
            let (tx, rx) = oneshot::channel();
            state.tx = Some(tx);
            Ok(rx)
        }

        fn stop(&mut self) {
            self.state.borrow_mut().stops += 1;
        }
    }

    fn wav_fixture(samples: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer
                    .write_sample((s * 32767.0).clamp(-32768.0, 32767.0) as i16)
                    .unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn session_with(state: &Rc<RefCell<SinkState>>) -> PlaybackSession {
        PlaybackSession::new(Box::new(ScriptedSink {
            state: Rc::clone(state),
        }))
    }

    #[test]
    fn wav_decodes_to_expected_rate() {
        let bytes = wav_fixture(&[0.0, 0.25, -0.25, 0.5]);
        let audio = decode_for_playback(&bytes).unwrap();
        assert_eq!(audio.sample_rate, 24_000);
        assert_eq!(audio.samples.len(), 4);
        assert!((audio.samples[1] - 0.25).abs() < 0.001);
    }

    #[test]
    fn garbage_blob_is_a_playback_failure() {
        let err = decode_for_playback(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap_err();
        assert!(matches!(err, Error::PlaybackFailure(_)));
    }

    #[test]
    fn downmix_averages_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn play_replaces_active_session() {
        let state = Rc::new(RefCell::new(SinkState::default()));
        let mut session = session_with(&state);
        let bytes = wav_fixture(&[0.1; 64]);

        session.play(&bytes).unwrap();
        assert_eq!(session.status(), PlaybackStatus::Playing);

        session.play(&bytes).unwrap();
        assert_eq!(session.status(), PlaybackStatus::Playing);

        let state = state.borrow();
        assert_eq!(state.begun, 2);
        // The first stream was torn down before the second began.
        assert!(state.stops >= 1);
    }

    #[test]
    fn decode_failure_lands_in_failed_with_sink_released() {
        let state = Rc::new(RefCell::new(SinkState::default()));
        let mut session = session_with(&state);

        let err = session.play(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::PlaybackFailure(_)));
        assert_eq!(session.status(), PlaybackStatus::Failed);
        assert!(state.borrow().stops >= 1);
    }

    #[test]
    fn sink_refusal_lands_in_failed() {
        let state = Rc::new(RefCell::new(SinkState {
            fail_begin: true,
            ..SinkState::default()
        }));
        let mut session = session_with(&state);

        let err = session.play(&wav_fixture(&[0.1; 64])).unwrap_err();
        assert!(matches!(err, Error::PlaybackFailure(_)));
        assert_eq!(session.status(), PlaybackStatus::Failed);
    }

    #[tokio::test]
    async fn natural_end_transitions_to_ended() {
        let state = Rc::new(RefCell::new(SinkState::default()));
        let mut session = session_with(&state);
        session.play(&wav_fixture(&[0.1; 64])).unwrap();

        state.borrow_mut().tx.take().unwrap().send(Ok(())).unwrap();
        session.await_end().await.unwrap();
        assert_eq!(session.status(), PlaybackStatus::Ended);
        assert!(state.borrow().stops >= 1);
    }

    #[tokio::test]
    async fn sink_error_transitions_to_failed() {
        let state = Rc::new(RefCell::new(SinkState::default()));
        let mut session = session_with(&state);
        session.play(&wav_fixture(&[0.1; 64])).unwrap();

        state
            .borrow_mut()
            .tx
            .take()
            .unwrap()
            .send(Err(Error::PlaybackFailure("underrun".to_string())))
            .unwrap();
        let err = session.await_end().await.unwrap_err();
        assert!(matches!(err, Error::PlaybackFailure(_)));
        assert_eq!(session.status(), PlaybackStatus::Failed);
    }

    #[test]
    fn explicit_stop_releases_and_ends() {
        let state = Rc::new(RefCell::new(SinkState::default()));
        let mut session = session_with(&state);
        session.play(&wav_fixture(&[0.1; 64])).unwrap();

        session.stop();
        assert_eq!(session.status(), PlaybackStatus::Ended);
        assert!(state.borrow().stops >= 1);
    }
}
