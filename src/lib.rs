//! Chime - voice chat client pipeline for AI assistants
//!
//! This library implements the voice interaction pipeline: microphone
//! capture with chunk accumulation, base64 transport encoding, the
//! two-stage round trip to the voice backend (transcribe, then converse),
//! and playback of synthesized replies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                   Shell (CLI/UI)                  │
//! └───────────────────────┬──────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────┐
//! │                    Pipeline                       │
//! │  Capture ─► Encode ─► Transcribe ─► Draft         │
//! │  Send ─► Converse ─► History ─► Playback          │
//! └───────────────────────┬──────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────┐
//! │          Voice backend (STT │ Chat │ TTS)         │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Transcripts land in an editable draft and are only sent on an explicit
//! user action; the conversation history is append-only and in-memory.

pub mod audio;
pub mod client;
pub mod config;
pub mod conversation;
pub mod encoding;
pub mod error;
pub mod language;
pub mod pipeline;

pub use config::{Config, SpeakerIdentity};
pub use conversation::{Conversation, ConversationTurn, Role, TranscriptDraft};
pub use error::{Error, Result};
pub use language::{CATALOG, Language};
pub use pipeline::Pipeline;
