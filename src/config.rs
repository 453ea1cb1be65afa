//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: VOICEHIVE_)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/voicehive-orchestrator/{service_name}/config.toml
//! 4. System directory: /etc/voicehive-orchestrator/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Database configuration (optional)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Redis configuration (optional)
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// OpenTelemetry configuration (optional)
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,

    /// gRPC configuration (optional)
    #[serde(default)]
    pub grpc: Option<GrpcConfig>,

    /// Resilience Fabric configuration (per-breaker circuit breaker + retry + deadline)
    #[serde(default)]
    pub fabric: FabricConfig,

    /// Distributed cache configuration (in-process + shared tier)
    #[serde(default)]
    pub cache_subsystem: CacheConfig,

    /// ASR proxy configuration
    #[serde(default)]
    pub asr: AsrConfig,

    /// TTS router configuration
    #[serde(default)]
    pub tts: TtsConfig,

    /// PMS connector configuration
    #[serde(default)]
    pub pms: PmsConfig,

    /// MFA configuration
    #[serde(default)]
    pub mfa: MfaConfig,

    /// Configuration-change approval rule table
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Secret lifecycle & anomaly-detection configuration
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// TLS termination configuration (optional; requires `tls` feature)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Path to public key for JWT verification
    pub public_key_path: PathBuf,

    /// JWT algorithm (RS256, ES256, HS256)
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,

    /// JWT issuer to validate
    #[serde(default)]
    pub issuer: Option<String>,

    /// JWT audience to validate
    #[serde(default)]
    pub audience: Option<String>,
}

/// TLS termination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to the PEM certificate chain
    pub cert_path: PathBuf,

    /// Path to the PEM private key
    pub key_path: PathBuf,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per minute per user
    #[serde(default = "default_per_user_rpm")]
    pub per_user_rpm: u32,

    /// Requests per minute per client
    #[serde(default = "default_per_client_rpm")]
    pub per_client_rpm: u32,

    /// Rate limit window in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Per-route rate limit override, keyed by a route pattern string in
/// [`RateLimitConfig`]'s route table (e.g. `"POST /api/v1/uploads"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRateLimitConfig {
    /// Requests per minute for this route
    pub requests_per_minute: u32,

    /// Burst size allowed above the steady rate
    pub burst_size: u32,

    /// Whether the limit is keyed per authenticated user (vs. per client/IP)
    #[serde(default = "default_true")]
    pub per_user: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing database connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Whether database is optional (service can start without it)
    #[serde(default = "default_false")]
    pub optional: bool,

    /// Whether to initialize connection lazily (in background)
    #[serde(default = "default_lazy_init")]
    pub lazy_init: bool,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (redis://host:port or cluster URLs)
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing Redis connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Whether Redis is optional (service can start without it)
    #[serde(default = "default_false")]
    pub optional: bool,

    /// Whether to initialize connection lazily (in background)
    #[serde(default = "default_lazy_init")]
    pub lazy_init: bool,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpConfig {
    /// OTLP endpoint URL
    pub endpoint: String,

    /// Service name for tracing
    #[serde(default)]
    pub service_name: Option<String>,

    /// Enable tracing
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// gRPC server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcConfig {
    /// Enable gRPC server
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Use separate port for gRPC (if false, shares port with HTTP)
    #[serde(default = "default_false")]
    pub use_separate_port: bool,

    /// gRPC port (only used if use_separate_port is true)
    #[serde(default = "default_grpc_port")]
    pub port: u16,

    /// Enable gRPC reflection service
    #[serde(default = "default_true")]
    pub reflection_enabled: bool,

    /// Enable gRPC health check service
    #[serde(default = "default_true")]
    pub health_check_enabled: bool,

    /// Maximum message size in MB
    #[serde(default = "default_grpc_max_message_mb")]
    pub max_message_size_mb: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Protocol buffer runtime configuration
    #[serde(default)]
    pub proto: ProtoConfig,
}

/// Protocol buffer runtime configuration
///
/// NOTE: This is RUNTIME configuration only. Proto compilation happens at build time.
/// See `crate::build_utils` for build-time proto compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtoConfig {
    /// Proto directory reference (for documentation/tooling only, not used during compilation)
    ///
    /// Build-time compilation uses `VOICEHIVE_PROTO_DIR` environment variable or `proto/` convention.
    /// This field can be used by runtime tooling (e.g., generating OpenAPI from protos).
    #[serde(default = "default_proto_dir")]
    pub dir: String,

    /// Service registry endpoint for dynamic service registration
    ///
    /// Example: "consul://localhost:8500" or "etcd://localhost:2379"
    #[serde(default)]
    pub service_registry: Option<String>,

    /// Service mesh integration endpoint
    ///
    /// Used for service mesh sidecar integration (Istio, Linkerd, etc.)
    #[serde(default)]
    pub service_mesh_endpoint: Option<String>,

    /// Enable proto validation (if using buf validate or similar)
    #[serde(default = "default_false")]
    pub validation_enabled: bool,

    /// Service metadata for discovery and registration
    ///
    /// Key-value pairs for service mesh/registry metadata
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ProtoConfig {
    fn default() -> Self {
        Self {
            dir: default_proto_dir(),
            service_registry: None,
            service_mesh_endpoint: None,
            validation_enabled: false,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl GrpcConfig {
    /// Get the effective port (either separate port or HTTP port)
    pub fn effective_port(&self, http_port: u16) -> u16 {
        if self.use_separate_port {
            self.port
        } else {
            http_port
        }
    }

    /// Get max message size in bytes
    pub fn max_message_size_bytes(&self) -> usize {
        self.max_message_size_mb * 1024 * 1024
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Middleware configuration (all optional, feature-gated)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request tracking configuration (request IDs, header propagation)
    #[serde(default)]
    pub request_tracking: RequestTrackingConfig,

    /// Resilience configuration (circuit breaker, retry, bulkhead)
    #[serde(default)]
    pub resilience: Option<ResilienceConfig>,

    /// HTTP metrics configuration (OpenTelemetry)
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,

    /// Local rate limiting configuration (governor)
    #[serde(default)]
    pub governor: Option<LocalRateLimitConfig>,

    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS configuration
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            request_tracking: RequestTrackingConfig::default(),
            resilience: None,
            metrics: None,
            governor: None,
            body_limit_mb: default_body_limit_mb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
        }
    }
}

/// Request tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrackingConfig {
    /// Enable request ID generation
    #[serde(default = "default_true")]
    pub request_id_enabled: bool,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Enable header propagation
    #[serde(default = "default_true")]
    pub propagate_headers: bool,

    /// Enable sensitive header masking in logs
    #[serde(default = "default_true")]
    pub mask_sensitive_headers: bool,
}

impl Default for RequestTrackingConfig {
    fn default() -> Self {
        Self {
            request_id_enabled: true,
            request_id_header: default_request_id_header(),
            propagate_headers: true,
            mask_sensitive_headers: true,
        }
    }
}

/// Resilience configuration (circuit breaker, retry, bulkhead)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Enable circuit breaker
    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,

    /// Failure threshold before circuit opens (0.0-1.0)
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: f64,

    /// Minimum requests before calculating failure rate
    #[serde(default = "default_circuit_breaker_min_requests")]
    pub circuit_breaker_min_requests: u64,

    /// Duration to wait before attempting to close circuit (seconds)
    #[serde(default = "default_circuit_breaker_wait_secs")]
    pub circuit_breaker_wait_secs: u64,

    /// Enable retry logic
    #[serde(default = "default_true")]
    pub retry_enabled: bool,

    /// Maximum number of retry attempts
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,

    /// Base delay for exponential backoff (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum delay for exponential backoff (milliseconds)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Enable bulkhead (concurrency limiting)
    #[serde(default = "default_true")]
    pub bulkhead_enabled: bool,

    /// Maximum concurrent requests
    #[serde(default = "default_bulkhead_max_concurrent")]
    pub bulkhead_max_concurrent: usize,

    /// Maximum queued requests
    #[serde(default = "default_bulkhead_max_queued")]
    pub bulkhead_max_queued: usize,
}

impl ResilienceConfig {
    /// Convert to Duration types for runtime use
    pub fn circuit_breaker_wait_duration(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_wait_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

/// HTTP metrics configuration (OpenTelemetry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Include request path in metrics
    #[serde(default = "default_true")]
    pub include_path: bool,

    /// Include request method in metrics
    #[serde(default = "default_true")]
    pub include_method: bool,

    /// Include status code in metrics
    #[serde(default = "default_true")]
    pub include_status: bool,

    /// Histogram buckets for latency (in milliseconds)
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets_ms: Vec<f64>,
}

impl MetricsConfig {
    pub fn latency_buckets_as_duration(&self) -> Vec<Duration> {
        self.latency_buckets_ms
            .iter()
            .map(|&ms| Duration::from_millis(ms as u64))
            .collect()
    }
}

/// Local rate limiting configuration (governor-based)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalRateLimitConfig {
    /// Enable local rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per period
    #[serde(default = "default_governor_requests")]
    pub requests_per_period: u32,

    /// Time period in seconds
    #[serde(default = "default_governor_period_secs")]
    pub period_secs: u64,

    /// Burst size (allow temporary spikes)
    #[serde(default = "default_governor_burst")]
    pub burst_size: u32,
}

impl LocalRateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

/// Per-breaker circuit breaker + retry + deadline overrides, keyed by
/// dependency name (`asr`, `connection`, `pms`, `tts`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerProfile {
    /// Consecutive failures that trip the breaker from `closed` to `open`.
    #[serde(default = "default_fabric_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_fabric_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    #[serde(default = "default_fabric_deadline_secs")]
    pub deadline_secs: u64,

    #[serde(default = "default_fabric_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for BreakerProfile {
    fn default() -> Self {
        Self {
            failure_threshold: default_fabric_failure_threshold(),
            recovery_timeout_secs: default_fabric_recovery_timeout_secs(),
            deadline_secs: default_fabric_deadline_secs(),
            max_retries: default_fabric_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl BreakerProfile {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Resilience Fabric configuration: a default breaker profile plus
/// per-dependency overrides for the ASR, outbound-connection, PMS, and TTS
/// breakers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default)]
    pub default_profile: BreakerProfile,

    #[serde(default)]
    pub asr: Option<BreakerProfile>,

    #[serde(default)]
    pub connection: Option<BreakerProfile>,

    #[serde(default)]
    pub pms: Option<BreakerProfile>,

    #[serde(default)]
    pub tts: Option<BreakerProfile>,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            default_profile: BreakerProfile::default(),
            // Tolerant: 5 failures / 60s cooldown / 120s deadline.
            asr: Some(BreakerProfile {
                failure_threshold: 5,
                recovery_timeout_secs: 60,
                deadline_secs: 120,
                ..BreakerProfile::default()
            }),
            // Strict: 3 failures / 120s cooldown / 30s deadline.
            connection: Some(BreakerProfile {
                failure_threshold: 3,
                recovery_timeout_secs: 120,
                deadline_secs: 30,
                ..BreakerProfile::default()
            }),
            pms: None,
            tts: None,
        }
    }
}

impl FabricConfig {
    /// Resolve the effective profile for a named dependency, falling back to
    /// the default profile when no override is configured.
    pub fn profile_for(&self, dependency: &str) -> BreakerProfile {
        match dependency {
            "asr" => self.asr.clone(),
            "connection" => self.connection.clone(),
            "pms" => self.pms.clone(),
            "tts" => self.tts.clone(),
            _ => None,
        }
        .unwrap_or_else(|| self.default_profile.clone())
    }
}

/// Distributed cache (in-process L1 + shared Redis L2) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_memory_max_entries")]
    pub memory_max_entries: usize,

    #[serde(default = "default_cache_memory_max_bytes")]
    pub memory_max_bytes: usize,

    #[serde(default = "default_cache_ttl_s")]
    pub default_ttl_s: u64,

    #[serde(default = "default_eviction_policy")]
    pub eviction_policy: String,

    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_entries: default_cache_memory_max_entries(),
            memory_max_bytes: default_cache_memory_max_bytes(),
            default_ttl_s: default_cache_ttl_s(),
            eviction_policy: default_eviction_policy(),
            compression_threshold: default_compression_threshold(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_s)
    }
}

/// ASR Proxy configuration: the upstream gRPC speech recognizer and the
/// size of the outbound channel pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrConfig {
    #[serde(default = "default_asr_server")]
    pub server: String,

    #[serde(default = "default_asr_port")]
    pub port: u16,

    #[serde(default = "default_asr_pool_size")]
    pub pool_size: usize,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            server: default_asr_server(),
            port: default_asr_port(),
            pool_size: default_asr_pool_size(),
        }
    }
}

impl AsrConfig {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.server, self.port)
    }
}

/// TTS Router configuration: engine credentials, default engine by
/// language, and response cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,

    #[serde(default)]
    pub azure_key: Option<String>,

    #[serde(default)]
    pub azure_region: Option<String>,

    #[serde(default = "default_engine_by_language")]
    pub default_engine_by_language: std::collections::HashMap<String, String>,

    #[serde(default = "default_cache_ttl_s")]
    pub cache_ttl_s: u64,

    #[serde(default = "default_true")]
    pub allow_mock_fallback: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            elevenlabs_api_key: None,
            azure_key: None,
            azure_region: None,
            default_engine_by_language: default_engine_by_language(),
            cache_ttl_s: default_cache_ttl_s(),
            allow_mock_fallback: true,
        }
    }
}

impl TtsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_s)
    }
}

/// PMS (property management system) connector configuration, e.g. the
/// Apaleo reference adapter's OAuth2 client-credentials settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmsConfig {
    #[serde(default = "default_pms_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub property_id: Option<String>,

    #[serde(default = "default_pms_max_rps")]
    pub max_requests_per_second: u32,
}

impl Default for PmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_pms_base_url(),
            client_id: None,
            client_secret: None,
            property_id: None,
            max_requests_per_second: default_pms_max_rps(),
        }
    }
}

/// Multi-factor authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaConfig {
    #[serde(default = "default_totp_window")]
    pub totp_window: u8,

    #[serde(default = "default_recovery_codes_count")]
    pub recovery_codes_count: usize,

    #[serde(default = "default_issuer_name")]
    pub issuer_name: String,

    #[serde(default = "default_session_verification_ttl_minutes")]
    pub session_verification_ttl_minutes: u64,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            totp_window: default_totp_window(),
            recovery_codes_count: default_recovery_codes_count(),
            issuer_name: default_issuer_name(),
            session_verification_ttl_minutes: default_session_verification_ttl_minutes(),
        }
    }
}

impl MfaConfig {
    pub fn session_verification_ttl(&self) -> Duration {
        Duration::from_secs(self.session_verification_ttl_minutes * 60)
    }
}

/// A single configuration-change approval rule, matched against a changed
/// field path either exactly or via a single-level wildcard suffix
/// (`auth.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub field_path: String,
    pub required_approvers: Vec<String>,
    #[serde(default = "default_approval_priority")]
    pub priority: u8,
    #[serde(default = "default_approval_expiry_h")]
    pub expiry_h: u64,
    #[serde(default)]
    pub allow_emergency_override: bool,
}

impl ApprovalRule {
    /// Whether this rule's `field_path` matches a changed field, supporting
    /// an exact match or a single-level wildcard suffix like `auth.*`.
    pub fn matches(&self, changed_field: &str) -> bool {
        match self.field_path.strip_suffix(".*") {
            Some(prefix) => changed_field
                .strip_prefix(prefix)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false),
            None => self.field_path == changed_field,
        }
    }
}

/// Configuration-change approval rule table (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub rules: Vec<ApprovalRule>,

    #[serde(default = "default_true")]
    pub production_requires_platform_admin: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            production_requires_platform_admin: true,
        }
    }
}

/// Secret lifecycle rotation defaults and anomaly-detection thresholds
/// (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_rotation_interval_days")]
    pub rotation_interval_days: u32,

    #[serde(default = "default_excessive_access_threshold")]
    pub excessive_access_threshold: u32,

    #[serde(default = "default_failed_attempts_threshold")]
    pub failed_attempts_threshold: u32,

    #[serde(default = "default_off_hours_ratio_threshold")]
    pub off_hours_ratio_threshold: f64,

    #[serde(default = "default_concurrent_access_threshold")]
    pub concurrent_access_threshold: u32,

    #[serde(default = "default_risk_score_alert_threshold")]
    pub risk_score_alert_threshold: f64,

    #[serde(default)]
    pub allowed_countries: Vec<String>,

    #[serde(default = "default_backup_retention")]
    pub backup_retention: usize,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            rotation_interval_days: default_rotation_interval_days(),
            excessive_access_threshold: default_excessive_access_threshold(),
            failed_attempts_threshold: default_failed_attempts_threshold(),
            off_hours_ratio_threshold: default_off_hours_ratio_threshold(),
            concurrent_access_threshold: default_concurrent_access_threshold(),
            risk_score_alert_threshold: default_risk_score_alert_threshold(),
            allowed_countries: Vec::new(),
            backup_retention: default_backup_retention(),
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_jwt_algorithm() -> String {
    "RS256".to_string()
}

fn default_per_user_rpm() -> u32 {
    200
}

fn default_per_client_rpm() -> u32 {
    1000
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_connections() -> u32 {
    50
}

fn default_min_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_redis_max_connections() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_lazy_init() -> bool {
    true
}

// Middleware default functions
fn default_body_limit_mb() -> usize {
    10 // 10 MB
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

// Resilience default functions
fn default_circuit_breaker_threshold() -> f64 {
    0.5 // 50% failure rate
}

fn default_circuit_breaker_min_requests() -> u64 {
    10
}

fn default_circuit_breaker_wait_secs() -> u64 {
    30
}

fn default_retry_max_attempts() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    10000 // 10 seconds
}

fn default_bulkhead_max_concurrent() -> usize {
    100
}

fn default_bulkhead_max_queued() -> usize {
    200
}

// Metrics default functions
fn default_latency_buckets() -> Vec<f64> {
    vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
}

// Governor default functions
fn default_governor_requests() -> u32 {
    100
}

fn default_governor_period_secs() -> u64 {
    60
}

fn default_governor_burst() -> u32 {
    10
}

// gRPC default functions
fn default_grpc_port() -> u16 {
    9090
}

fn default_grpc_max_message_mb() -> usize {
    4 // 4 MB
}

fn default_proto_dir() -> String {
    "proto".to_string()
}

// Resilience Fabric default functions
fn default_fabric_failure_threshold() -> u32 {
    5
}

fn default_fabric_recovery_timeout_secs() -> u64 {
    30
}

fn default_fabric_deadline_secs() -> u64 {
    5
}

fn default_fabric_max_retries() -> u32 {
    3
}

// Cache default functions
fn default_cache_memory_max_entries() -> usize {
    10_000
}

fn default_cache_memory_max_bytes() -> usize {
    64 * 1024 * 1024 // 64 MB
}

fn default_cache_ttl_s() -> u64 {
    300
}

fn default_eviction_policy() -> String {
    "lru".to_string()
}

fn default_compression_threshold() -> usize {
    1024 // bytes
}

// ASR default functions
fn default_asr_server() -> String {
    "localhost".to_string()
}

fn default_asr_port() -> u16 {
    50051
}

fn default_asr_pool_size() -> usize {
    5
}

// TTS default functions
fn default_engine_by_language() -> std::collections::HashMap<String, String> {
    let mut m = std::collections::HashMap::new();
    m.insert("en".to_string(), "elevenlabs".to_string());
    m.insert("es".to_string(), "azure".to_string());
    m
}

// PMS default functions
fn default_pms_base_url() -> String {
    "https://api.apaleo.com".to_string()
}

fn default_pms_max_rps() -> u32 {
    10
}

// MFA default functions
fn default_totp_window() -> u8 {
    1
}

fn default_recovery_codes_count() -> usize {
    10
}

fn default_issuer_name() -> String {
    "VoiceHive Hotels".to_string()
}

fn default_session_verification_ttl_minutes() -> u64 {
    15
}

// Approval default functions
fn default_approval_priority() -> u8 {
    1
}

fn default_approval_expiry_h() -> u64 {
    72
}

// Secrets default functions
fn default_rotation_interval_days() -> u32 {
    90
}

fn default_excessive_access_threshold() -> u32 {
    50
}

fn default_failed_attempts_threshold() -> u32 {
    5
}

fn default_off_hours_ratio_threshold() -> f64 {
    0.6
}

fn default_concurrent_access_threshold() -> u32 {
    3
}

fn default_risk_score_alert_threshold() -> f64 {
    0.75
}

fn default_backup_retention() -> usize {
    5
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found is used):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/voicehive-orchestrator/{service_name}/config.toml
    /// 3. System directory: /etc/voicehive-orchestrator/{service_name}/config.toml
    ///
    /// Environment variables (VOICEHIVE_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        // Try to infer service name from binary name or use default
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "voicehive-orchestrator".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    ///
    /// This is the recommended way to load config in production.
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        // Log which config paths we're checking
        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()));

        // Merge config files in reverse order (lowest priority first)
        // so that higher priority files override lower ones
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        // Environment variables have highest priority
        figment = figment.merge(Env::prefixed("VOICEHIVE_").split("_"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    /// Useful for testing or non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Load from config file (if exists)
            .merge(Toml::file(path))
            // Override with environment variables
            .merge(Env::prefixed("VOICEHIVE_").split("_"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service
    ///
    /// Returns paths in priority order (highest first):
    /// 1. Current working directory
    /// 2. XDG config directory
    /// 3. System directory
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Current working directory (highest priority for dev/testing)
        paths.push(PathBuf::from("config.toml"));

        // 2. XDG config directory (~/.config/voicehive-orchestrator/{service_name}/config.toml)
        let xdg_dirs = xdg::BaseDirectories::with_prefix("voicehive-orchestrator");
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Ok(path) = xdg_dirs.place_config_file(&config_file_path) {
            paths.push(path);
        }

        // 3. System-wide directory (/etc/voicehive-orchestrator/{service_name}/config.toml)
        paths.push(PathBuf::from("/etc/voicehive-orchestrator").join(service_name).join("config.toml"));

        paths
    }

    /// Get the recommended config path for a service
    ///
    /// This is where the config file should be placed in production.
    /// Returns: ~/.config/voicehive-orchestrator/{service_name}/config.toml
    pub fn recommended_path(service_name: &str) -> PathBuf {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("voicehive-orchestrator");
        let config_file_path = Path::new(service_name).join("config.toml");

        // place_config_file creates parent directories if needed
        xdg_dirs.place_config_file(&config_file_path)
            .unwrap_or_else(|_| {
                // Fallback to manual path construction if place_config_file fails
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| String::from("~")))
                    .join(".config/voicehive-orchestrator")
                    .join(service_name)
                    .join("config.toml")
            })
    }

    /// Create the config directory structure for a service
    ///
    /// Creates ~/.config/voicehive-orchestrator/{service_name}/ if it doesn't exist
    pub fn create_config_dir(service_name: &str) -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("voicehive-orchestrator");
        let config_file_path = Path::new(service_name).join("config.toml");

        // place_config_file creates all necessary parent directories
        let config_path = xdg_dirs.place_config_file(&config_file_path)
            .map_err(|e| crate::error::Error::Internal(format!("Failed to create config directory: {}", e)))?;

        // Return the directory path, not the file path
        Ok(config_path.parent()
            .ok_or_else(|| crate::error::Error::Internal("Invalid config path".to_string()))?
            .to_path_buf())
    }

    /// Get database URL
    pub fn database_url(&self) -> Option<&str> {
        self.database.as_ref().map(|db| db.url.as_str())
    }

    /// Get Redis URL
    pub fn redis_url(&self) -> Option<&str> {
        self.redis.as_ref().map(|r| r.url.as_str())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "voicehive-orchestrator".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            jwt: JwtConfig {
                public_key_path: PathBuf::from("./keys/jwt-public.pem"),
                algorithm: default_jwt_algorithm(),
                issuer: None,
                audience: None,
            },
            rate_limit: RateLimitConfig {
                per_user_rpm: default_per_user_rpm(),
                per_client_rpm: default_per_client_rpm(),
                window_secs: default_window_secs(),
            },
            middleware: MiddlewareConfig::default(),
            database: None,
            redis: None,
            otlp: None,
            grpc: None,
            fabric: FabricConfig::default(),
            cache_subsystem: CacheConfig::default(),
            asr: AsrConfig::default(),
            tts: TtsConfig::default(),
            pms: PmsConfig::default(),
            mfa: MfaConfig::default(),
            approval: ApprovalConfig::default(),
            secrets: SecretsConfig::default(),
            tls: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.rate_limit.per_user_rpm, 200);
    }

    #[test]
    fn test_fabric_profile_falls_back_to_default() {
        let fabric = FabricConfig::default();
        let profile = fabric.profile_for("pms");
        assert_eq!(profile.failure_threshold, fabric.default_profile.failure_threshold);
    }

    #[test]
    fn test_fabric_profile_override_wins() {
        let mut fabric = FabricConfig::default();
        fabric.pms = Some(BreakerProfile {
            failure_threshold: 3,
            ..BreakerProfile::default()
        });
        assert_eq!(fabric.profile_for("pms").failure_threshold, 3);
        assert_eq!(fabric.profile_for("asr").failure_threshold, fabric.default_profile.failure_threshold);
    }

    #[test]
    fn test_approval_rule_exact_match() {
        let rule = ApprovalRule {
            field_path: "pms.client_secret".to_string(),
            required_approvers: vec!["platform_admin".to_string()],
            priority: 1,
            expiry_h: 72,
            allow_emergency_override: false,
        };
        assert!(rule.matches("pms.client_secret"));
        assert!(!rule.matches("pms.base_url"));
    }

    #[test]
    fn test_approval_rule_wildcard_match() {
        let rule = ApprovalRule {
            field_path: "auth.*".to_string(),
            required_approvers: vec!["security_team".to_string()],
            priority: 2,
            expiry_h: 24,
            allow_emergency_override: true,
        };
        assert!(rule.matches("auth.jwt_secret_key"));
        assert!(!rule.matches("auth"));
        assert!(!rule.matches("authx.jwt_secret_key"));
    }
}
