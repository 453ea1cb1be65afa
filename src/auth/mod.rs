//! Authentication module for token generation, password hashing, and more
//!
//! This module complements the existing token validation middleware with
//! token generation capabilities, password hashing, and API key management.
//!
//! # Features
//!
//! - `auth` - Core authentication: password hashing (Argon2id), JWT generation,
//!   API key management
//!
//! # Example
//!
//! ```rust,ignore
//! use voicehive_orchestrator::auth::{PasswordHasher, JwtGenerator, TokenGenerator};
//! use voicehive_orchestrator::middleware::Claims;
//!
//! // Hash a password
//! let hasher = PasswordHasher::default();
//! let hash = hasher.hash("my_secure_password")?;
//!
//! // Verify a password
//! assert!(hasher.verify("my_secure_password", &hash)?);
//!
//! // Generate a token
//! let generator = JwtGenerator::new(&jwt_config, &token_config)?;
//! let claims = Claims { sub: "user:123".to_string(), /* ... */ };
//! let token = generator.generate_token(&claims)?;
//! ```

// Configuration
pub mod config;

// Password hashing (Argon2id)
pub mod password;

// Token generation
pub mod tokens;

// API key management
pub mod api_keys;

// Re-exports for convenience
pub use config::{
    AuthConfig, JwtGenerationConfig, PasswordConfig, RefreshTokenConfig, TokenGenerationConfig,
};

pub use config::ApiKeyConfig;

pub use password::PasswordHasher;

pub use tokens::jwt_generator::JwtGenerator;
pub use tokens::refresh::{RefreshTokenData, RefreshTokenMetadata, RefreshTokenStorage};
pub use tokens::{TokenGenerator, TokenPair};

#[cfg(feature = "cache")]
pub use tokens::refresh::RedisRefreshStorage;

#[cfg(feature = "database")]
pub use tokens::refresh::PgRefreshStorage;

// API key exports
pub use api_keys::{ApiKey, ApiKeyGenerator, ApiKeyStorage};

#[cfg(feature = "cache")]
pub use api_keys::RedisApiKeyStorage;

#[cfg(feature = "database")]
pub use api_keys::PgApiKeyStorage;
