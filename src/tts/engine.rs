//! Synthesis engine adapters. Each implements a single HTTP round trip
//! (`POST {engine_url}/synthesize`) against its vendor's API, or — for the
//! `mock` engine — a locally generated silent PCM clip. Engines are never
//! called directly by the router; they're wrapped by the Resilience Fabric.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Error;

/// Output container accepted by [`crate::tts::router::CachedAudio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Pcm,
}

impl AudioFormat {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "pcm" => Ok(AudioFormat::Pcm),
            other => Err(Error::ValidationError(format!("unsupported audio format: {other}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }
}

/// A fully-resolved request handed to an engine adapter: voice, engine, and
/// language selection has already happened by the time this is built.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
    pub pitch: Option<f32>,
    pub emotion: Option<String>,
    pub format: AudioFormat,
    pub sample_rate: u32,
}

#[async_trait]
pub trait TtsEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize `req`, returning the raw audio bytes and its duration.
    async fn synthesize(&self, req: &EngineRequest) -> Result<(Vec<u8>, u64), Error>;
}

/// Generic HTTP-backed engine adapter: both the ElevenLabs and Azure
/// reference engines are a single `POST {base_url}/synthesize` call with a
/// vendor-specific auth header, so one adapter covers both.
pub struct HttpTtsEngine {
    name: String,
    base_url: String,
    auth_header_name: String,
    auth_header_value: String,
    http: reqwest::Client,
}

impl HttpTtsEngine {
    pub fn elevenlabs(api_key: &str) -> Result<Self, Error> {
        Self::new("elevenlabs", "https://api.elevenlabs.io/v1", "xi-api-key", api_key)
    }

    pub fn azure(api_key: &str, region: &str) -> Result<Self, Error> {
        Self::new(
            "azure",
            &format!("https://{region}.tts.speech.microsoft.com/cognitiveservices"),
            "Ocp-Apim-Subscription-Key",
            api_key,
        )
    }

    fn new(name: &str, base_url: &str, auth_header_name: &str, auth_header_value: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build TTS HTTP client: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            auth_header_name: auth_header_name.to_string(),
            auth_header_value: auth_header_value.to_string(),
            http,
        })
    }
}

#[async_trait]
impl TtsEngine for HttpTtsEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn synthesize(&self, req: &EngineRequest) -> Result<(Vec<u8>, u64), Error> {
        let body = serde_json::json!({
            "text": req.text,
            "voice": req.voice,
            "speed": req.speed,
            "pitch": req.pitch,
            "emotion": req.emotion,
            "format": req.format.as_str(),
            "sample_rate": req.sample_rate,
        });

        let response = self
            .http
            .post(format!("{}/synthesize", self.base_url))
            .header(&self.auth_header_name, &self.auth_header_value)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transient(format!("{} request failed: {e}", self.name)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::rate_limited(Duration::from_secs(1)));
        }
        if status.is_server_error() {
            return Err(Error::transient(format!("{} returned {status}", self.name)));
        }
        if !status.is_success() {
            return Err(Error::External(format!("{} synthesis failed: {status}", self.name)));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::transient(format!("{} response read failed: {e}", self.name)))?
            .to_vec();

        Ok((audio, estimate_duration_ms(&req.text, req.speed)))
    }
}

/// Silent-PCM fallback engine: produces a clip of duration proportional to
/// text length rather than calling out, flagged `mock` in `engine_used`.
pub struct MockEngine;

#[async_trait]
impl TtsEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, req: &EngineRequest) -> Result<(Vec<u8>, u64), Error> {
        let duration_ms = estimate_duration_ms(&req.text, req.speed);
        let sample_count = (req.sample_rate as u64 * duration_ms / 1000) as usize;
        // 16-bit silence, two bytes per sample.
        Ok((vec![0u8; sample_count * 2], duration_ms))
    }
}

/// Average spoken-word rate of 2.5 words/sec, scaled by the requested speed.
fn estimate_duration_ms(text: &str, speed: f32) -> u64 {
    let words = text.split_whitespace().count().max(1) as f32;
    let base_ms = (words / 2.5) * 1000.0;
    (base_ms / speed.max(0.01)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_engine_duration_scales_with_text_length() {
        let short = MockEngine
            .synthesize(&EngineRequest {
                text: "hi".into(),
                voice: "default".into(),
                speed: 1.0,
                pitch: None,
                emotion: None,
                format: AudioFormat::Pcm,
                sample_rate: 16000,
            })
            .await
            .unwrap();

        let long = MockEngine
            .synthesize(&EngineRequest {
                text: "hi there this is a much longer utterance to synthesize".into(),
                voice: "default".into(),
                speed: 1.0,
                pitch: None,
                emotion: None,
                format: AudioFormat::Pcm,
                sample_rate: 16000,
            })
            .await
            .unwrap();

        assert!(long.1 > short.1);
        assert_eq!(long.0.len(), 16000 * (long.1 as usize) / 1000 * 2);
    }

    #[tokio::test]
    async fn mock_engine_duration_scales_inversely_with_speed() {
        let normal = MockEngine
            .synthesize(&EngineRequest {
                text: "a moderate length sentence".into(),
                voice: "default".into(),
                speed: 1.0,
                pitch: None,
                emotion: None,
                format: AudioFormat::Pcm,
                sample_rate: 16000,
            })
            .await
            .unwrap();

        let fast = MockEngine
            .synthesize(&EngineRequest {
                text: "a moderate length sentence".into(),
                voice: "default".into(),
                speed: 2.0,
                pitch: None,
                emotion: None,
                format: AudioFormat::Pcm,
                sample_rate: 16000,
            })
            .await
            .unwrap();

        assert!(fast.1 < normal.1);
    }

    #[test]
    fn parses_known_formats_case_insensitively() {
        assert_eq!(AudioFormat::parse("MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::parse("wav").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::parse("Pcm").unwrap(), AudioFormat::Pcm);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(AudioFormat::parse("ogg").is_err());
    }
}
