//! Language catalog for transcription and synthesis
//!
//! The backend keys its STT and TTS voices off BCP-47 codes; the catalog is
//! the fixed set of pairs the product ships with. Selection is locked by the
//! orchestrator while a recording or a request is in flight.

use std::fmt;

use crate::{Error, Result};

/// A selectable language: a BCP-47 code plus its display name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    code: &'static str,
    name: &'static str,
}

/// All languages the backend has voices for
pub const CATALOG: [Language; 10] = [
    Language { code: "hi-IN", name: "हिंदी (Hindi)" },
    Language { code: "en-US", name: "English" },
    Language { code: "mr-IN", name: "मराठी (Marathi)" },
    Language { code: "gu-IN", name: "ગુજરાતી (Gujarati)" },
    Language { code: "bn-IN", name: "বাংলা (Bengali)" },
    Language { code: "te-IN", name: "తెలుగు (Telugu)" },
    Language { code: "ta-IN", name: "தமிழ் (Tamil)" },
    Language { code: "kn-IN", name: "ಕನ್ನಡ (Kannada)" },
    Language { code: "ml-IN", name: "മലയാളം (Malayalam)" },
    Language { code: "pa-IN", name: "ਪੰਜਾਬੀ (Punjabi)" },
];

impl Language {
    /// Look up a catalog entry by its BCP-47 code
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLanguage`] for codes outside the catalog.
    pub fn from_code(code: &str) -> Result<Self> {
        CATALOG
            .iter()
            .copied()
            .find(|l| l.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::UnknownLanguage(code.to_string()))
    }

    /// BCP-47 code sent on the wire
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// Human-readable display name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for Language {
    fn default() -> Self {
        CATALOG[0]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}
