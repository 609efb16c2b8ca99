//! Conversation history and the editable transcript draft

use crate::language::Language;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The person speaking into the microphone
    User,
    /// The assistant's reply
    Assistant,
}

/// One message in the conversation, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Turn author
    pub role: Role,
    /// Message text
    pub content: String,
}

/// Append-only conversation history for the current session
///
/// Insertion order is the display order. Nothing here persists across
/// sessions.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    /// Create an empty history
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: content.into(),
        });
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether any turn has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// User-editable text buffer populated by transcription
///
/// The pipeline overwrites it with successful transcripts and drains it on
/// send; it never submits the draft on its own.
#[derive(Debug, Clone, Default)]
pub struct TranscriptDraft {
    text: String,
    language: Language,
}

impl TranscriptDraft {
    /// Overwrite the draft with a fresh transcript
    pub fn fill(&mut self, text: impl Into<String>, language: Language) {
        self.text = text.into();
        self.language = language;
    }

    /// Replace the text through a user edit, keeping the language
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Drain the draft for sending, leaving it empty
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Current draft text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Language the draft was transcribed in
    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// True when the draft holds nothing sendable
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
