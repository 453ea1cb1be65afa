//! # voicehive-orchestrator
//!
//! Control-plane orchestrator core for a multi-tenant voice-AI hotel platform:
//! a shared resilience fabric, an ASR gRPC proxy, a multi-engine TTS router,
//! a normalized PMS connector contract (Apaleo reference), a tenant/chain
//! hierarchy engine, MFA and session verification, configuration-change
//! approval, and secret lifecycle management with audit.
//!
//! ## Features
//!
//! - **Resilience Fabric**: circuit breaker, retry with jittered backoff,
//!   deadlines, and pooled connections shared by every outbound dependency
//! - **ASR Proxy**: pooled gRPC channels, unary + streaming recognition,
//!   language-detection fallback
//! - **TTS Router**: engine/voice selection policy, content-fingerprinted
//!   cache, single-flight synthesis
//! - **PMS Connector**: capability-described connector contract, OAuth2
//!   client-credentials lifecycle, typed error mapping
//! - **Tenant & Chain Engine**: hierarchical config inheritance, chain-wide
//!   bounded-concurrency operations
//! - **MFA & Approval**: TOTP + recovery codes, multi-approver config-change
//!   workflow, secret rotation with anomaly detection
//! - **Observability**: OpenTelemetry tracing, HTTP metrics, request ID
//!   propagation
//! - **Connection pooling**: PostgreSQL, Redis
//! - **Health checks**: Liveness and readiness probes
//! - **Graceful shutdown**: Proper signal handling (SIGTERM, SIGINT)
//!
//! ## Example
//!
//! ```rust,no_run
//! use voicehive_orchestrator::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     // Build application state
//!     let state = AppState::builder()
//!         .config(config.clone())
//!         .build()
//!         .await?;
//!
//!     // Create router
//!     let app = Router::new()
//!         .route("/health", get(health))
//!         .route("/ready", get(readiness))
//!         .with_state(state);
//!
//!     // Run server
//!     Server::new(config)
//!         .serve(app)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod health;
pub mod pool_health;
pub mod responses;
pub mod server;
pub mod service_builder;
pub mod state;
pub mod versioning;

#[cfg(feature = "database")]
pub mod database;

#[cfg(feature = "cache")]
pub mod cache;

pub mod observability;

#[cfg(feature = "resilience")]
pub mod resilience;

#[cfg(feature = "audit")]
pub mod audit;

#[cfg(feature = "grpc")]
pub mod grpc;

#[cfg(all(feature = "grpc", feature = "resilience"))]
pub mod asr;

#[cfg(all(feature = "cache", feature = "resilience"))]
pub mod tts;

#[cfg(all(feature = "resilience", feature = "governor"))]
pub mod pms;

pub mod tenant;

#[cfg(feature = "cache")]
pub mod mfa;

pub mod approval;

#[cfg(feature = "cache")]
pub mod secrets;

#[cfg(feature = "auth")]
pub mod auth;

#[cfg(feature = "tls")]
pub mod tls;

/// Internal agent-based components
///
/// Connection pool management is handled internally by agents. Users don't
/// need to interact with this module directly - just use `ServiceBuilder::build()`
/// and access pools via `state.db()`, `state.redis()`, etc.
///
/// The only user-facing types from this module are:
/// - [`BackgroundWorker`](agents::BackgroundWorker) - for managed background tasks
/// - [`TaskStatus`](agents::TaskStatus) - for checking background task status
/// - [`HealthStatus`](agents::HealthStatus) - for health check results
pub mod agents;

/// Build-time utilities for compiling protocol buffers
///
/// These are used in `build.rs` scripts, not at runtime.
pub mod build_utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, RateLimitConfig, RouteRateLimitConfig};

    #[cfg(feature = "tls")]
    pub use crate::config::TlsConfig;

    #[cfg(feature = "tls")]
    pub use crate::tls::{load_server_config, TlsListener};

    pub use crate::error::{Error, Result};
    pub use crate::health::{health, readiness, pool_metrics};
    pub use crate::ids::{MakeTypedRequestId, RequestId, RequestIdError};
    pub use crate::pool_health::PoolHealthSummary;

    #[cfg(feature = "database")]
    pub use crate::pool_health::DatabasePoolHealth;

    #[cfg(feature = "cache")]
    pub use crate::pool_health::RedisPoolHealth;

    #[cfg(feature = "resilience")]
    pub use crate::pool_health::BreakerHealth;

    #[cfg(feature = "cache")]
    pub use crate::cache::{CacheStats, DistributedCache, EvictionPolicy, SingleFlight, Tier as CacheTier};
    pub use crate::middleware::{
        Claims, TokenValidator, CompiledRoutePatterns, RateLimit, RequestTrackingConfig,
        PROPAGATE_HEADERS, SENSITIVE_HEADERS, normalize_path,
        request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    };

    #[cfg(feature = "cache")]
    pub use crate::middleware::{TokenRevocation, RedisTokenRevocation};
    pub use crate::server::Server;
    pub use crate::service_builder::{ActonService, ServiceBuilder, VersionedRoutes};
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::versioning::{
        ApiVersion, DeprecationInfo, VersionedApiBuilder, VersionedResponse,
        extract_version_from_path, versioned_router,
    };
    pub use crate::responses::{
        Accepted, Conflict, Created, FieldError, NoContent, Success, ValidationError,
    };

    #[cfg(feature = "resilience")]
    pub use crate::middleware::ResilienceConfig;

    #[cfg(feature = "resilience")]
    pub use crate::resilience::{
        CircuitBreaker, CircuitSnapshot, CircuitState, OperationKind, ResilienceFabric, RetryPolicy,
    };

    #[cfg(all(feature = "grpc", feature = "resilience"))]
    pub use crate::asr::{
        Alternative, AsrChannelPool, AsrClient, AsrStreamEvent, AsrStreamFrame, AudioEncoding,
        TranscribeParams, TranscribeResult, WordTiming,
    };

    #[cfg(all(feature = "cache", feature = "resilience"))]
    pub use crate::tts::{
        AudioFormat, CachedAudio, EngineRequest, HttpTtsEngine, MockEngine, SynthesizeParams,
        SynthesizeResult, TtsEngine, TtsRouter, VoiceCatalog, VoiceEntry,
    };

    #[cfg(all(feature = "resilience", feature = "governor"))]
    pub use crate::pms::{
        ApaleoConnector, AvailabilityGrid, ConnectorCapabilities, ConnectorHealth, GuestProfile,
        GuestSearchQuery, HealthStatus, NewReservation, OAuthTokenManager, OutboundRateLimiter,
        PmsConnector, RateQuote, Reservation, ReservationPatch, ReservationStatus,
        ReservationStream, RoomAvailability,
    };

    pub use crate::tenant::{
        execute_chain_operation, resolve_targets, Chain, ChainOperation, ChainOperationStatus,
        ChainOperationType, ExecutionProgress, HierarchyEngine, InheritanceMode, OperationHandler,
        OperationTargets, Property, PropertyStatus, TargetResult, MAX_DEPTH,
    };

    #[cfg(feature = "cache")]
    pub use crate::mfa::{
        EncryptedSecret, HashedRecoveryCode, MfaEnrollment, MfaPolicy, MfaService, PendingEnrollment,
        SecretCipher, SessionGate,
    };

    pub use crate::approval::{
        create_request, emergency_override, expire_if_due, record_decision, resolve,
        ApprovalDecision, ApprovalRequest, ApprovalStatus, ChangedField, Decision, Requirements,
    };
    #[cfg(feature = "audit")]
    pub use crate::approval::ApprovalService;

    #[cfg(feature = "cache")]
    pub use crate::secrets::{
        AccessEvent, AccessContext, Anomaly, AnomalyKind, RotationOutcome, RotationStrategy,
        SecretMetadata, SecretStatus, SecretStore, SecretType, ValueCipher,
    };
    #[cfg(all(feature = "cache", feature = "audit"))]
    pub use crate::secrets::SecretService;

    #[cfg(feature = "otel-metrics")]
    pub use crate::middleware::{MetricsConfig, metric_labels, metric_names};

    #[cfg(feature = "governor")]
    pub use crate::middleware::{GovernorConfig, GovernorRateLimit, RateLimitExceeded};

    #[cfg(feature = "observability")]
    pub use crate::observability::init_tracing;

    #[cfg(feature = "grpc")]
    pub use crate::grpc::{
        GrpcServer, HealthService, Request,
        Response as GrpcResponse,
        Status, Code,
        request_id_interceptor, token_auth_interceptor,
        RequestIdExtension, add_request_id_to_response, GrpcTracingLayer, LoggingLayer,
    };

    #[cfg(all(feature = "grpc", feature = "governor"))]
    pub use crate::grpc::GrpcRateLimitLayer;

    // Auth module exports
    #[cfg(feature = "auth")]
    pub use crate::auth::{
        AuthConfig, PasswordConfig, TokenGenerationConfig, JwtGenerationConfig,
        RefreshTokenConfig, PasswordHasher, TokenGenerator, TokenPair, JwtGenerator,
        ApiKey, ApiKeyGenerator,
    };

    // Re-export axum Html for direct HTML responses
    pub use axum::response::Html;

    // Background task management (user-facing)
    pub use crate::agents::{BackgroundWorker, TaskStatus};

    // Health status types (for checking aggregated health)
    pub use crate::agents::{AggregatedHealthResponse, HealthStatus};

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post, put},
        Extension, Router,
    };

    pub use serde::{Deserialize, Serialize};

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};

    // Re-export tokio for async runtime
    pub use tokio;

    // Re-export async-trait for async trait definitions
    pub use async_trait::async_trait;

    // Re-export error handling utilities
    pub use thiserror::Error;
    pub use anyhow::{self, Context as AnyhowContext};

    // Re-export time utilities
    pub use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};

    // Re-export UUID
    pub use uuid::Uuid;

    // Re-export futures utilities
    pub use futures::{future, stream, Future, Stream, StreamExt, TryFutureExt, TryStreamExt};

    // Re-export HTTP types
    pub use http::{Method, Uri};

    // Re-export acton-reactive prelude for actor system
    pub use acton_reactive::prelude::*;
}
