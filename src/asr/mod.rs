//! ASR Proxy: fronts an upstream speech-recognizer gRPC service behind the
//! Resilience Fabric, with a small round-robin channel pool, a unary
//! transcription call, a bidirectional streaming-recognition call, and a
//! language-detection fallback used when a caller doesn't pin a locale.
//!
//! Every call here runs under the `asr` breaker (tolerant: 5 failures / 60s
//! cooldown / 120s deadline) for the RPC itself, and the `connection`
//! breaker (strict: 3 failures / 120s cooldown / 30s deadline) for channel
//! acquisition, per [`crate::config::FabricConfig`]'s defaults.

#[cfg(feature = "grpc")]
pub mod client;
#[cfg(feature = "grpc")]
pub mod language;
#[cfg(feature = "grpc")]
pub mod pool;

#[cfg(feature = "grpc")]
pub mod pb {
    #![allow(clippy::all)]
    tonic::include_proto!("voicehive.recognizer.v1");
}

#[cfg(feature = "grpc")]
pub use client::{
    Alternative, AsrClient, AsrStreamEvent, AsrStreamFrame, AudioEncoding, TranscribeParams,
    TranscribeResult, WordTiming,
};
#[cfg(feature = "grpc")]
pub use language::{detect_language, LanguageDetection};
#[cfg(feature = "grpc")]
pub use pool::AsrChannelPool;
