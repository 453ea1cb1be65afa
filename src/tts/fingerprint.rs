//! Cache-key fingerprint for a synthesis request: a sha256 digest over the
//! request's pipe-joined fields, with enumerations lowercased. Text itself
//! is taken verbatim (whitespace normalization is out of scope, per the
//! router's cache-key contract), so two requests differing only in case of
//! `text` are distinct cache entries.

use sha2::{Digest, Sha256};

#[allow(clippy::too_many_arguments)]
pub fn fingerprint(
    text: &str,
    language: &str,
    voice: Option<&str>,
    engine: &str,
    speed: f32,
    pitch: Option<f32>,
    emotion: Option<&str>,
    format: &str,
    sample_rate: u32,
) -> String {
    let canonical = format!(
        "{text}|{}|{}|{}|{speed}|{}|{}|{}|{sample_rate}",
        language.to_lowercase(),
        voice.unwrap_or(""),
        engine.to_lowercase(),
        pitch.map(|p| p.to_string()).unwrap_or_default(),
        emotion.unwrap_or(""),
        format.to_lowercase(),
    );

    let digest = Sha256::digest(canonical.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_requests_produce_identical_fingerprints() {
        let a = fingerprint("Welcome", "en-US", Some("rachel"), "elevenlabs", 1.0, None, None, "mp3", 24000);
        let b = fingerprint("Welcome", "en-US", Some("rachel"), "elevenlabs", 1.0, None, None, "mp3", 24000);
        assert_eq!(a, b);
    }

    #[test]
    fn engine_case_does_not_affect_fingerprint() {
        let a = fingerprint("Welcome", "en-US", Some("rachel"), "ElevenLabs", 1.0, None, None, "mp3", 24000);
        let b = fingerprint("Welcome", "en-US", Some("rachel"), "elevenlabs", 1.0, None, None, "MP3", 24000);
        assert_eq!(a, b);
    }

    #[test]
    fn differing_text_case_changes_fingerprint() {
        let a = fingerprint("Welcome", "en-US", None, "azure", 1.0, None, None, "wav", 16000);
        let b = fingerprint("welcome", "en-US", None, "azure", 1.0, None, None, "wav", 16000);
        assert_ne!(a, b);
    }

    #[test]
    fn missing_voice_and_present_voice_differ() {
        let a = fingerprint("Hi", "en-US", None, "azure", 1.0, None, None, "wav", 16000);
        let b = fingerprint("Hi", "en-US", Some(""), "azure", 1.0, None, None, "wav", 16000);
        assert_eq!(a, b, "empty voice_name and absent voice collapse to the same key");
    }
}
