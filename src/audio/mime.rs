//! Container/codec selection for capture
//!
//! Recorders differ in what they can emit, so the session negotiates: it
//! walks a prioritized candidate list and takes the first pair the recorder
//! supports. Negotiation is a pure function over an injected predicate,
//! which keeps it testable without a device.

use std::fmt;

/// A container/codec pair a recorder may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MimeType {
    /// Opus in WebM
    WebmOpus,
    /// WebM with the recorder's default codec
    Webm,
    /// Opus in Ogg
    OggOpus,
    /// Ogg with the recorder's default codec
    Ogg,
    /// PCM in a RIFF/WAVE container (native recorder fallback)
    Wav,
}

/// Candidate order: highest fidelity for speech first, WAV as the native
/// fallback
pub const DEFAULT_CANDIDATES: [MimeType; 5] = [
    MimeType::WebmOpus,
    MimeType::Webm,
    MimeType::OggOpus,
    MimeType::Ogg,
    MimeType::Wav,
];

impl MimeType {
    /// Wire form of the pair
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebmOpus => "audio/webm;codecs=opus",
            Self::Webm => "audio/webm",
            Self::OggOpus => "audio/ogg;codecs=opus",
            Self::Ogg => "audio/ogg",
            Self::Wav => "audio/wav",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the first supported candidate, or `None` when nothing matches
pub fn negotiate(
    candidates: &[MimeType],
    supports: impl Fn(MimeType) -> bool,
) -> Option<MimeType> {
    candidates.iter().copied().find(|&mime| supports(mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_supported_candidate_wins() {
        let chosen = negotiate(&DEFAULT_CANDIDATES, |m| {
            matches!(m, MimeType::OggOpus | MimeType::Ogg | MimeType::Wav)
        });
        assert_eq!(chosen, Some(MimeType::OggOpus));
    }

    #[test]
    fn full_support_prefers_webm_opus() {
        assert_eq!(
            negotiate(&DEFAULT_CANDIDATES, |_| true),
            Some(MimeType::WebmOpus)
        );
    }

    #[test]
    fn no_support_yields_none() {
        assert_eq!(negotiate(&DEFAULT_CANDIDATES, |_| false), None);
    }

    #[test]
    fn wire_forms() {
        assert_eq!(MimeType::WebmOpus.as_str(), "audio/webm;codecs=opus");
        assert_eq!(MimeType::Wav.as_str(), "audio/wav");
    }
}
