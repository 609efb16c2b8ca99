//! Shared test doubles for pipeline tests
//!
//! Everything runs without audio hardware or a network: the recorder,
//! sink, and backend are scripted through shared state the tests inspect.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::{mpsc, oneshot};

use chime_voice::audio::{AudioSink, CaptureConstraints, DecodedAudio, MimeType, Recorder};
use chime_voice::client::{ChatReply, VoiceBackend};
use chime_voice::{Config, Error, Language, Pipeline, Result, SpeakerIdentity};

#[derive(Default)]
pub struct RecorderState {
    /// Chunks handed over right after start
    pub chunks: Vec<Vec<u8>>,
    /// Chunks flushed at finalize
    pub terminal: Vec<Vec<u8>>,
    pub start_error: Option<Error>,
    pub released: bool,
    pub starts: usize,
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

pub struct MockRecorder {
    state: Rc<RefCell<RecorderState>>,
}

#[async_trait(?Send)]
impl Recorder for MockRecorder {
    fn supports(&self, mime: MimeType) -> bool {
        mime == MimeType::Wav
    }

    async fn start(
        &mut self,
        _constraints: &CaptureConstraints,
        _mime: MimeType,
        _chunk_interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
        let mut state = self.state.borrow_mut();
        if let Some(err) = state.start_error.take() {
            return Err(err);
        }
        state.starts += 1;
        state.released = false;
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in state.chunks.drain(..) {
            tx.send(chunk).expect("receiver alive");
        }
        state.tx = Some(tx);
        Ok(rx)
    }

    async fn finalize(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let terminal = std::mem::take(&mut state.terminal);
        if let Some(tx) = state.tx.take() {
            for chunk in terminal {
                tx.send(chunk).expect("receiver alive");
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        self.state.borrow_mut().released = true;
    }
}

#[derive(Default)]
pub struct SinkState {
    pub begun: usize,
    pub stops: usize,
    pub last_sample_rate: Option<u32>,
    pub completion: Option<oneshot::Sender<Result<()>>>,
}

pub struct MockSink {
    state: Rc<RefCell<SinkState>>,
}

impl AudioSink for MockSink {
    fn begin(&mut self, audio: DecodedAudio) -> Result<oneshot::Receiver<Result<()>>> {
        let mut state = self.state.borrow_mut();
        state.begun += 1;
        state.last_sample_rate = Some(audio.sample_rate);
        let (tx, rx) = oneshot::channel();
        state.completion = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        self.state.borrow_mut().stops += 1;
    }
}

#[derive(Default)]
pub struct BackendState {
    /// Scripted transcribe outcomes, consumed front to back
    pub transcripts: Vec<Result<String>>,
    /// Scripted converse outcomes, consumed front to back
    pub replies: Vec<Result<ChatReply>>,
    /// Observed transcribe calls: (encoded audio, language code)
    pub transcribe_calls: Vec<(String, String)>,
    /// Observed converse calls: (message, language code, speaker id)
    pub converse_calls: Vec<(String, String, String)>,
}

pub struct MockBackend {
    state: Rc<RefCell<BackendState>>,
}

#[async_trait(?Send)]
impl VoiceBackend for MockBackend {
    async fn transcribe(&self, audio_base64: &str, language: Language) -> Result<String> {
        let mut state = self.state.borrow_mut();
        state
            .transcribe_calls
            .push((audio_base64.to_string(), language.code().to_string()));
        assert!(!state.transcripts.is_empty(), "unexpected transcribe call");
        state.transcripts.remove(0)
    }

    async fn converse(
        &self,
        message: &str,
        language: Language,
        speaker: &SpeakerIdentity,
    ) -> Result<ChatReply> {
        let mut state = self.state.borrow_mut();
        state.converse_calls.push((
            message.to_string(),
            language.code().to_string(),
            speaker.id.clone(),
        ));
        assert!(!state.replies.is_empty(), "unexpected converse call");
        state.replies.remove(0)
    }

    async fn synthesize(&self, _text: &str, _language: Language) -> Result<String> {
        Err(Error::NetworkFailure("synthesize not scripted".to_string()))
    }
}

/// A pipeline wired to scripted collaborators plus handles to inspect them
pub struct Harness {
    pub pipeline: Pipeline,
    pub recorder: Rc<RefCell<RecorderState>>,
    pub sink: Rc<RefCell<SinkState>>,
    pub backend: Rc<RefCell<BackendState>>,
}

pub fn harness(config: &Config) -> Harness {
    let recorder = Rc::new(RefCell::new(RecorderState::default()));
    let sink = Rc::new(RefCell::new(SinkState::default()));
    let backend = Rc::new(RefCell::new(BackendState::default()));

    let pipeline = Pipeline::new(
        config,
        Box::new(MockRecorder {
            state: Rc::clone(&recorder),
        }),
        Box::new(MockSink {
            state: Rc::clone(&sink),
        }),
        Box::new(MockBackend {
            state: Rc::clone(&backend),
        }),
    );

    Harness {
        pipeline,
        recorder,
        sink,
        backend,
    }
}

/// A valid mono 16-bit WAV blob with `samples` samples at 24 kHz
pub fn wav_blob(samples: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for i in 0..samples {
            #[allow(clippy::cast_possible_truncation)]
            let value = ((i % 128) as i16) * 64;
            writer.write_sample(value).expect("wav sample");
        }
        writer.finalize().expect("wav finalize");
    }
    cursor.into_inner()
}

/// Base64 of a valid WAV blob, as the chat service would attach it
pub fn wav_blob_base64(samples: usize) -> String {
    STANDARD.encode(wav_blob(samples))
}

pub fn reply_with_audio(text: &str) -> ChatReply {
    ChatReply {
        text: text.to_string(),
        audio: Some(wav_blob_base64(64)),
    }
}

pub fn reply_text_only(text: &str) -> ChatReply {
    ChatReply {
        text: text.to_string(),
        audio: None,
    }
}
