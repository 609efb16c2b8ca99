//! Binary ⇄ transport-text conversion
//!
//! Audio payloads travel to the backend as base64 inside JSON bodies; replies
//! carry synthesized speech the same way. Both directions are pure functions.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::audio::AudioPayload;
use crate::{Error, Result};

/// Encode a captured payload as transport text
#[must_use]
pub fn encode(payload: &AudioPayload) -> String {
    STANDARD.encode(&payload.bytes)
}

/// Decode transport text back into raw audio bytes
///
/// Accepts a bare base64 string or a `data:` URL (everything up to the first
/// comma is dropped, matching what the speech service tolerates).
///
/// # Errors
///
/// Returns [`Error::MalformedEncoding`] if the input is not valid base64.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let body = text.rsplit_once(',').map_or(text, |(_, rest)| rest);
    STANDARD
        .decode(body.trim())
        .map_err(|e| Error::MalformedEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MimeType;

    fn payload(bytes: Vec<u8>) -> AudioPayload {
        AudioPayload::new(bytes, MimeType::Wav)
    }

    #[test]
    fn round_trip_preserves_bytes() {
        let original = payload(vec![0u8, 1, 2, 254, 255, 128, 7]);
        let text = encode(&original);
        assert_eq!(decode(&text).unwrap(), original.bytes);
    }

    #[test]
    fn round_trip_empty_payload() {
        let original = payload(Vec::new());
        assert_eq!(decode(&encode(&original)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_strips_data_url_prefix() {
        let original = payload(b"hello audio".to_vec());
        let text = format!("data:audio/webm;base64,{}", encode(&original));
        assert_eq!(decode(&text).unwrap(), original.bytes);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode("not!!valid//base64===").unwrap_err();
        assert!(matches!(err, Error::MalformedEncoding(_)));
    }
}
