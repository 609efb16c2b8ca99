//! Runtime configuration
//!
//! Everything is in-memory: defaults matching the shipped product, with
//! `CHIME_*` environment overrides. There are no config files and no state
//! on disk.

use std::time::Duration;

use crate::language::Language;
use crate::{Error, Result};

/// Default backend base URL
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Smallest payload worth transcribing, in bytes
pub const DEFAULT_MIN_PAYLOAD_BYTES: usize = 5000;

/// Cadence of recorder chunk emission
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_millis(250);

/// Capture sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Identity attached to every chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerIdentity {
    /// Stable speaker identifier
    pub id: String,
    /// Display name forwarded to the chat service
    pub name: String,
}

impl Default for SpeakerIdentity {
    fn default() -> Self {
        Self {
            id: "speaker_local".to_string(),
            name: "Anonymous Speaker".to_string(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Voice backend base URL
    pub backend_url: String,

    /// Initial language selection
    pub language: Language,

    /// Speaker identity for chat requests
    pub speaker: SpeakerIdentity,

    /// Minimum assembled payload size accepted for transport
    pub min_payload_bytes: usize,

    /// Recorder chunk emission interval
    pub chunk_interval: Duration,

    /// Capture sample rate in Hz
    pub sample_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            language: Language::default(),
            speaker: SpeakerIdentity::default(),
            min_payload_bytes: DEFAULT_MIN_PAYLOAD_BYTES,
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl Config {
    /// Build a configuration from defaults plus `CHIME_*` overrides
    ///
    /// Recognized variables: `CHIME_BACKEND_URL`, `CHIME_LANGUAGE`,
    /// `CHIME_SPEAKER_ID`, `CHIME_SPEAKER_NAME`, `CHIME_MIN_PAYLOAD_BYTES`,
    /// `CHIME_CHUNK_INTERVAL_MS`, `CHIME_SAMPLE_RATE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a variable fails to parse, or
    /// [`Error::UnknownLanguage`] for a language outside the catalog.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CHIME_BACKEND_URL") {
            let trimmed = url.trim_end_matches('/').to_string();
            if trimmed.is_empty() {
                return Err(Error::Config("CHIME_BACKEND_URL is empty".to_string()));
            }
            config.backend_url = trimmed;
        }
        if let Ok(code) = std::env::var("CHIME_LANGUAGE") {
            config.language = Language::from_code(&code)?;
        }
        if let Ok(id) = std::env::var("CHIME_SPEAKER_ID") {
            config.speaker.id = id;
        }
        if let Ok(name) = std::env::var("CHIME_SPEAKER_NAME") {
            config.speaker.name = name;
        }
        if let Ok(raw) = std::env::var("CHIME_MIN_PAYLOAD_BYTES") {
            config.min_payload_bytes = parse_var("CHIME_MIN_PAYLOAD_BYTES", &raw)?;
        }
        if let Ok(raw) = std::env::var("CHIME_CHUNK_INTERVAL_MS") {
            let ms: u64 = parse_var("CHIME_CHUNK_INTERVAL_MS", &raw)?;
            if ms == 0 {
                return Err(Error::Config(
                    "CHIME_CHUNK_INTERVAL_MS must be positive".to_string(),
                ));
            }
            config.chunk_interval = Duration::from_millis(ms);
        }
        if let Ok(raw) = std::env::var("CHIME_SAMPLE_RATE") {
            config.sample_rate = parse_var("CHIME_SAMPLE_RATE", &raw)?;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid {name}: {raw}")))
}
