//! gRPC server support for voicehive-orchestrator
//!
//! This module provides gRPC server functionality that can run alongside HTTP services.
//! It supports both single-port (HTTP + gRPC multiplexed) and dual-port modes.

#[cfg(feature = "grpc")]
pub mod server;

#[cfg(feature = "grpc")]
pub mod interceptors;

#[cfg(feature = "grpc")]
pub mod middleware;

#[cfg(feature = "grpc")]
pub mod health;

// Re-exports
#[cfg(feature = "grpc")]
pub use server::GrpcServer;

#[cfg(feature = "grpc")]
pub use health::HealthService;

#[cfg(feature = "grpc")]
pub use interceptors::{
    request_id_interceptor, token_auth_interceptor, RequestIdExtension,
    add_request_id_to_response,
};

#[cfg(feature = "grpc")]
pub use middleware::{GrpcTracingLayer, LoggingLayer};

#[cfg(all(feature = "grpc", feature = "governor"))]
pub use middleware::GrpcRateLimitLayer;

// Re-export tonic types for convenience
#[cfg(feature = "grpc")]
pub use tonic::{Request, Response, Status, Code};
