//! TTS Router: engine/voice selection, cache-backed single-flight synthesis,
//! and the mock fallback path, per spec's TTS Router contract.

#[cfg(all(feature = "cache", feature = "resilience"))]
pub mod engine;
#[cfg(all(feature = "cache", feature = "resilience"))]
pub mod fingerprint;
#[cfg(all(feature = "cache", feature = "resilience"))]
pub mod router;

#[cfg(all(feature = "cache", feature = "resilience"))]
pub use engine::{AudioFormat, EngineRequest, HttpTtsEngine, MockEngine, TtsEngine};
#[cfg(all(feature = "cache", feature = "resilience"))]
pub use fingerprint::fingerprint;
#[cfg(all(feature = "cache", feature = "resilience"))]
pub use router::{CachedAudio, SynthesizeParams, SynthesizeResult, TtsRouter, VoiceCatalog, VoiceEntry};
