//! Language detection: transcribe a short lead-in sample with the default
//! model, classify the result into a supported BCP-47 locale, and fall back
//! to `en-US` at confidence 0.5 on any failure.

use crate::asr::client::{AsrClient, AudioEncoding, TranscribeParams};

const DEFAULT_MODEL_LANGUAGE: &str = "auto";
const CONFIDENCE_THRESHOLD: f64 = 0.95;
const MAX_LOW_CONFIDENCE_ALTERNATIVES: usize = 2;
const FALLBACK_LANGUAGE: &str = "en-US";
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Result of a language-detection pass.
#[derive(Debug, Clone)]
pub struct LanguageDetection {
    pub language: String,
    pub confidence: f64,
    /// Populated only when `confidence < 0.95`, up to two alternatives.
    pub alternatives: Vec<super::client::Alternative>,
    /// True when the result is the hardcoded fallback rather than a real
    /// classification (the upstream call failed, or returned low confidence
    /// with no usable alternatives).
    pub is_fallback: bool,
}

impl LanguageDetection {
    fn fallback() -> Self {
        Self {
            language: FALLBACK_LANGUAGE.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            alternatives: Vec::new(),
            is_fallback: true,
        }
    }
}

/// Detect the spoken language of `sample`, a lead-in clip of at most five
/// seconds of audio captured by the caller. Any upstream failure (circuit
/// open, timeout, validation) degrades to the `en-US`/0.5 fallback rather
/// than propagating, since language detection is advisory.
pub async fn detect_language(
    client: &AsrClient,
    sample: Vec<u8>,
    encoding: AudioEncoding,
    sample_rate: u32,
) -> LanguageDetection {
    let params = TranscribeParams {
        audio_bytes: sample,
        encoding,
        sample_rate,
        language: DEFAULT_MODEL_LANGUAGE.to_string(),
        max_alternatives: MAX_LOW_CONFIDENCE_ALTERNATIVES as u32 + 1,
        enable_punctuation: false,
        enable_word_time_offsets: false,
    };

    match client.transcribe(params).await {
        Ok(result) => classify(result),
        Err(_) => LanguageDetection::fallback(),
    }
}

fn classify(result: crate::asr::client::TranscribeResult) -> LanguageDetection {
    if result.language.is_empty() {
        return LanguageDetection::fallback();
    }

    let alternatives = if result.confidence < CONFIDENCE_THRESHOLD {
        result
            .alternatives
            .into_iter()
            .take(MAX_LOW_CONFIDENCE_ALTERNATIVES)
            .collect()
    } else {
        Vec::new()
    };

    LanguageDetection {
        language: result.language,
        confidence: result.confidence,
        alternatives,
        is_fallback: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::client::{Alternative, TranscribeResult};

    fn result(language: &str, confidence: f64, alt_count: usize) -> TranscribeResult {
        TranscribeResult {
            transcript: "hello".into(),
            confidence,
            words: Vec::new(),
            alternatives: (0..alt_count)
                .map(|i| Alternative { transcript: format!("alt-{i}"), confidence: 0.5 })
                .collect(),
            language: language.to_string(),
            processing_time_ms: 10,
        }
    }

    #[test]
    fn high_confidence_drops_alternatives() {
        let detection = classify(result("en-US", 0.99, 3));
        assert_eq!(detection.language, "en-US");
        assert!(detection.alternatives.is_empty());
        assert!(!detection.is_fallback);
    }

    #[test]
    fn low_confidence_caps_alternatives_at_two() {
        let detection = classify(result("es-ES", 0.4, 5));
        assert_eq!(detection.alternatives.len(), 2);
        assert!(!detection.is_fallback);
    }

    #[test]
    fn empty_language_falls_back() {
        let detection = classify(result("", 0.99, 0));
        assert_eq!(detection.language, FALLBACK_LANGUAGE);
        assert_eq!(detection.confidence, FALLBACK_CONFIDENCE);
        assert!(detection.is_fallback);
    }
}
