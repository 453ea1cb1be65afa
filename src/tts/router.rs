//! Engine/voice selection, cached synthesis, and single-flight — the TTS
//! Router's `synthesize` contract. Caching and upstream coalescing are
//! delegated entirely to [`crate::cache::DistributedCache`]; this module
//! owns only selection policy and the engine call itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::cache::DistributedCache;
use crate::config::CacheConfig;
use crate::error::Error;
use crate::resilience::{OperationKind, ResilienceFabric};

use super::engine::{AudioFormat, EngineRequest, MockEngine, TtsEngine};
use super::fingerprint::fingerprint;

/// One entry in the name-based voice catalog.
#[derive(Debug, Clone)]
pub struct VoiceEntry {
    pub name: String,
    pub id: String,
    pub engine: String,
    pub language: String,
}

/// Name → voice lookup with the router's disambiguation order: prefer a
/// match on the requested engine, then on the requested language, then the
/// first entry with that name.
#[derive(Default)]
pub struct VoiceCatalog {
    entries: Vec<VoiceEntry>,
}

impl VoiceCatalog {
    pub fn new(entries: Vec<VoiceEntry>) -> Self {
        Self { entries }
    }

    pub fn lookup_by_name(&self, name: &str, engine: &str, language: &str) -> Option<&VoiceEntry> {
        let matches: Vec<&VoiceEntry> = self.entries.iter().filter(|v| v.name == name).collect();
        if matches.is_empty() {
            return None;
        }
        matches
            .iter()
            .find(|v| v.engine == engine)
            .or_else(|| matches.iter().find(|v| v.language == language))
            .or_else(|| matches.first())
            .copied()
    }

    pub fn default_for(&self, engine: &str, language: &str) -> Option<&VoiceEntry> {
        self.entries
            .iter()
            .find(|v| v.engine == engine && v.language == language)
    }
}

/// What's stored in the distributed cache for a given fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAudio {
    pub audio_b64: String,
    pub duration_ms: u64,
    pub engine_used: String,
    pub voice_used: String,
}

/// Parameters for [`TtsRouter::synthesize`].
#[derive(Debug, Clone)]
pub struct SynthesizeParams {
    pub text: String,
    pub language: String,
    pub voice_id: Option<String>,
    pub voice_name: Option<String>,
    pub engine: Option<String>,
    pub speed: f32,
    pub pitch: Option<f32>,
    pub emotion: Option<String>,
    pub format: String,
    pub sample_rate: u32,
}

/// Result of a synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesizeResult {
    pub audio_b64: String,
    pub duration_ms: u64,
    pub engine_used: String,
    pub voice_used: String,
    pub cached: bool,
    pub processing_time_ms: u64,
}

pub struct TtsRouter {
    engines: HashMap<String, Arc<dyn TtsEngine>>,
    voices: VoiceCatalog,
    default_engine_by_language: HashMap<String, String>,
    cache: Arc<DistributedCache<CachedAudio>>,
    default_ttl: Duration,
    fabric: Arc<ResilienceFabric>,
    allow_mock_fallback: bool,
}

impl TtsRouter {
    pub fn new(
        engines: HashMap<String, Arc<dyn TtsEngine>>,
        voices: VoiceCatalog,
        default_engine_by_language: HashMap<String, String>,
        cache: Arc<DistributedCache<CachedAudio>>,
        default_ttl: Duration,
        fabric: Arc<ResilienceFabric>,
        allow_mock_fallback: bool,
    ) -> Self {
        Self {
            engines,
            voices,
            default_engine_by_language,
            cache,
            default_ttl,
            fabric,
            allow_mock_fallback,
        }
    }

    /// Primary subtag of a BCP-47 tag, e.g. `"en-US"` → `"en"`, used to key
    /// the per-language engine default table.
    fn primary_subtag(language: &str) -> &str {
        language.split('-').next().unwrap_or(language)
    }

    fn default_engine_for(&self, language: &str) -> String {
        self.default_engine_by_language
            .get(Self::primary_subtag(language))
            .or_else(|| self.default_engine_by_language.get(language))
            .cloned()
            .unwrap_or_else(|| "mock".to_string())
    }

    /// Resolve `(engine, voice)` per the selection policy: explicit engine
    /// wins; explicit voice_id wins; voice_name consults the catalog with
    /// engine/language disambiguation and otherwise passes through
    /// unchanged; absent both, the language default for the chosen engine.
    fn resolve_engine_and_voice(&self, params: &SynthesizeParams) -> (String, String) {
        let mut engine = params
            .engine
            .clone()
            .unwrap_or_else(|| self.default_engine_for(&params.language));

        if let Some(voice_id) = &params.voice_id {
            return (engine, voice_id.clone());
        }

        if let Some(voice_name) = &params.voice_name {
            if let Some(entry) = self.voices.lookup_by_name(voice_name, &engine, &params.language) {
                engine = entry.engine.clone();
                return (engine, entry.id.clone());
            }
            // Unknown name: passed through unchanged, engine unspecified
            // (the caller's or default engine stands).
            return (engine, voice_name.clone());
        }

        let voice = self
            .voices
            .default_for(&engine, &params.language)
            .map(|v| v.id.clone())
            .unwrap_or_else(|| format!("{}-default", Self::primary_subtag(&params.language)));
        (engine, voice)
    }

    pub async fn synthesize(&self, params: SynthesizeParams) -> Result<SynthesizeResult, Error> {
        if !(0.5..=2.0).contains(&params.speed) {
            return Err(Error::ValidationError(format!(
                "speed {} outside [0.5, 2.0]",
                params.speed
            )));
        }
        let format = AudioFormat::parse(&params.format)?;

        let started = Instant::now();
        let (engine_name, voice) = self.resolve_engine_and_voice(&params);

        let key = fingerprint(
            &params.text,
            &params.language,
            Some(voice.as_str()).filter(|v| !v.is_empty()),
            &engine_name,
            params.speed,
            params.pitch,
            params.emotion.as_deref(),
            format.as_str(),
            params.sample_rate,
        );

        if let Some(cached) = self.cache.get(&key).await {
            return Ok(SynthesizeResult {
                audio_b64: cached.audio_b64,
                duration_ms: cached.duration_ms,
                engine_used: cached.engine_used,
                voice_used: cached.voice_used,
                cached: true,
                processing_time_ms: started.elapsed().as_millis() as u64,
            });
        }

        let engines = self.engines.clone();
        let fabric = Arc::clone(&self.fabric);
        let allow_mock_fallback = self.allow_mock_fallback;
        let request = EngineRequest {
            text: params.text.clone(),
            voice: voice.clone(),
            speed: params.speed,
            pitch: params.pitch,
            emotion: params.emotion.clone(),
            format,
            sample_rate: params.sample_rate,
        };
        let engine_for_call = engine_name.clone();

        let populated = self
            .cache
            .get_or_populate(&key, Some(self.default_ttl), || async move {
                synthesize_with_fallback(&engines, &fabric, &engine_for_call, &request, allow_mock_fallback).await
            })
            .await
            .map_err(|e| Error::External(e.to_string()))?;

        Ok(SynthesizeResult {
            audio_b64: populated.audio_b64,
            duration_ms: populated.duration_ms,
            engine_used: populated.engine_used,
            voice_used: populated.voice_used,
            cached: false,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

async fn synthesize_with_fallback(
    engines: &HashMap<String, Arc<dyn TtsEngine>>,
    fabric: &ResilienceFabric,
    engine_name: &str,
    request: &EngineRequest,
    allow_mock_fallback: bool,
) -> Result<CachedAudio, Error> {
    let engine = engines
        .get(engine_name)
        .cloned()
        .ok_or_else(|| Error::ValidationError(format!("unknown TTS engine: {engine_name}")))?;

    let primary = fabric
        .execute("tts", "synthesize", OperationKind::Rpc, true, || {
            let engine = Arc::clone(&engine);
            let request = request.clone();
            async move { engine.synthesize(&request).await }
        })
        .await;

    let (audio, duration_ms, engine_used) = match primary {
        Ok((audio, duration_ms)) => (audio, duration_ms, engine_name.to_string()),
        Err(err) if allow_mock_fallback => {
            tracing::warn!(engine = engine_name, error = %err, "TTS engine failed, falling back to mock");
            let (audio, duration_ms) = MockEngine.synthesize(request).await?;
            (audio, duration_ms, "mock".to_string())
        }
        Err(err) => return Err(err),
    };

    Ok(CachedAudio {
        audio_b64: base64::engine::general_purpose::STANDARD.encode(audio),
        duration_ms,
        engine_used,
        voice_used: request.voice.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FabricConfig;

    fn catalog() -> VoiceCatalog {
        VoiceCatalog::new(vec![
            VoiceEntry { name: "rachel".into(), id: "voice-rachel-11l".into(), engine: "elevenlabs".into(), language: "en-US".into() },
            VoiceEntry { name: "rachel".into(), id: "voice-rachel-az".into(), engine: "azure".into(), language: "en-US".into() },
            VoiceEntry { name: "sofia".into(), id: "voice-sofia-az".into(), engine: "azure".into(), language: "es-ES".into() },
        ])
    }

    fn router(engines: HashMap<String, Arc<dyn TtsEngine>>) -> TtsRouter {
        let mut default_engine_by_language = HashMap::new();
        default_engine_by_language.insert("en".to_string(), "elevenlabs".to_string());
        default_engine_by_language.insert("es".to_string(), "azure".to_string());

        let cache = Arc::new(
            DistributedCache::<CachedAudio>::new("tts", &CacheConfig::default(), None).unwrap(),
        );

        TtsRouter::new(
            engines,
            catalog(),
            default_engine_by_language,
            cache,
            Duration::from_secs(3600),
            Arc::new(ResilienceFabric::new(FabricConfig::default())),
            true,
        )
    }

    fn mock_engines() -> HashMap<String, Arc<dyn TtsEngine>> {
        let mut m: HashMap<String, Arc<dyn TtsEngine>> = HashMap::new();
        m.insert("mock".to_string(), Arc::new(MockEngine));
        m
    }

    #[test]
    fn picks_language_default_engine_when_unspecified() {
        let router = router(mock_engines());
        let (engine, _) = router.resolve_engine_and_voice(&SynthesizeParams {
            text: "hi".into(),
            language: "en-US".into(),
            voice_id: None,
            voice_name: None,
            engine: None,
            speed: 1.0,
            pitch: None,
            emotion: None,
            format: "mp3".into(),
            sample_rate: 24000,
        });
        assert_eq!(engine, "elevenlabs");
    }

    #[test]
    fn explicit_engine_wins_over_language_default() {
        let router = router(mock_engines());
        let (engine, _) = router.resolve_engine_and_voice(&SynthesizeParams {
            text: "hi".into(),
            language: "en-US".into(),
            voice_id: None,
            voice_name: None,
            engine: Some("azure".into()),
            speed: 1.0,
            pitch: None,
            emotion: None,
            format: "mp3".into(),
            sample_rate: 24000,
        });
        assert_eq!(engine, "azure");
    }

    #[test]
    fn voice_name_disambiguates_by_engine_match() {
        let router = router(mock_engines());
        let (engine, voice) = router.resolve_engine_and_voice(&SynthesizeParams {
            text: "hi".into(),
            language: "en-US".into(),
            voice_id: None,
            voice_name: Some("rachel".into()),
            engine: Some("azure".into()),
            speed: 1.0,
            pitch: None,
            emotion: None,
            format: "mp3".into(),
            sample_rate: 24000,
        });
        assert_eq!(engine, "azure");
        assert_eq!(voice, "voice-rachel-az");
    }

    #[test]
    fn unknown_voice_name_passes_through_unchanged() {
        let router = router(mock_engines());
        let (_, voice) = router.resolve_engine_and_voice(&SynthesizeParams {
            text: "hi".into(),
            language: "en-US".into(),
            voice_id: None,
            voice_name: Some("nobody".into()),
            engine: None,
            speed: 1.0,
            pitch: None,
            emotion: None,
            format: "mp3".into(),
            sample_rate: 24000,
        });
        assert_eq!(voice, "nobody");
    }

    #[tokio::test]
    async fn rejects_speed_out_of_range() {
        let router = router(mock_engines());
        let result = router
            .synthesize(SynthesizeParams {
                text: "hi".into(),
                language: "en-US".into(),
                voice_id: None,
                voice_name: None,
                engine: Some("mock".into()),
                speed: 3.0,
                pitch: None,
                emotion: None,
                format: "mp3".into(),
                sample_rate: 24000,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrent_misses_invoke_engine_once_and_second_caller_may_hit_cache() {
        use std::sync::atomic::{AtomicU32, Ordering};

        struct CountingEngine(Arc<AtomicU32>);

        #[async_trait::async_trait]
        impl TtsEngine for CountingEngine {
            fn name(&self) -> &str {
                "mock"
            }
            async fn synthesize(&self, req: &EngineRequest) -> Result<(Vec<u8>, u64), Error> {
                self.0.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok((vec![0u8; 10], 400 + req.text.len() as u64))
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let mut engines: HashMap<String, Arc<dyn TtsEngine>> = HashMap::new();
        engines.insert("mock".to_string(), Arc::new(CountingEngine(Arc::clone(&calls))));
        let router = Arc::new(router(engines));

        let params = || SynthesizeParams {
            text: "Welcome".into(),
            language: "en-US".into(),
            voice_id: None,
            voice_name: Some("rachel".into()),
            engine: Some("mock".into()),
            speed: 1.0,
            pitch: None,
            emotion: None,
            format: "mp3".into(),
            sample_rate: 24000,
        };

        let r1 = Arc::clone(&router);
        let r2 = Arc::clone(&router);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { r1.synthesize(params()).await }),
            tokio::spawn(async move { r2.synthesize(params()).await }),
        );
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.audio_b64, b.audio_b64);
    }
}
