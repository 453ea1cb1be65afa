//! Application state management

use std::sync::Arc;

#[cfg(any(feature = "database", feature = "cache"))]
use tokio::sync::RwLock;

#[cfg(feature = "database")]
use sqlx::PgPool;

#[cfg(feature = "cache")]
use deadpool_redis::Pool as RedisPool;

use acton_reactive::prelude::AgentHandle;

#[cfg(feature = "resilience")]
use crate::resilience::ResilienceFabric;

#[cfg(feature = "audit")]
use crate::approval::ApprovalService;

#[cfg(all(feature = "cache", feature = "audit"))]
use crate::mfa::MfaService;

#[cfg(all(feature = "cache", feature = "audit"))]
use crate::secrets::SecretService;

use crate::{config::Config, error::Result};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,

    #[cfg(feature = "database")]
    db_pool: Arc<RwLock<Option<PgPool>>>,

    #[cfg(feature = "cache")]
    redis_pool: Arc<RwLock<Option<RedisPool>>>,

    /// Resilience Fabric shared by every outbound-calling subsystem
    /// (PMS, ASR, TTS, database, Redis). Constructed eagerly from
    /// `config.fabric`; it holds no network resources of its own.
    #[cfg(feature = "resilience")]
    resilience: Arc<ResilienceFabric>,

    /// Configuration-change approval engine. Constructed eagerly from
    /// `config.approval`; rule evaluation needs no external resources.
    #[cfg(feature = "audit")]
    approval: Arc<ApprovalService>,

    /// MFA enrollment/verification service. `None` until a deployment
    /// key (sourced from the secret manager, not `Config`) is supplied
    /// via `AppStateBuilder::mfa_service`.
    #[cfg(all(feature = "cache", feature = "audit"))]
    mfa: Option<Arc<MfaService>>,

    /// Secret lifecycle service. `None` until a deployment key is
    /// supplied via `AppStateBuilder::secret_service`, for the same
    /// reason as `mfa` above.
    #[cfg(all(feature = "cache", feature = "audit"))]
    secrets: Option<Arc<SecretService>>,

    /// Agent broker handle for type-safe event broadcasting
    ///
    /// When the acton-reactive feature is enabled and an agent runtime
    /// is initialized, HTTP handlers can use this broker to broadcast
    /// typed events to subscribed agents.
    broker: Option<AgentHandle>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AppState {
    /// Create a new AppState with the given configuration
    ///
    /// This creates an AppState with no connection pools initialized.
    /// For lazy initialization of connections, use `AppStateBuilder` instead.
    pub fn new(config: Config) -> Self {
        #[cfg(feature = "resilience")]
        let resilience = Arc::new(ResilienceFabric::new(config.fabric.clone()));
        #[cfg(feature = "audit")]
        let approval = Arc::new(ApprovalService::new(config.approval.clone()));

        Self {
            #[cfg(feature = "resilience")]
            resilience,
            #[cfg(feature = "audit")]
            approval,
            #[cfg(all(feature = "cache", feature = "audit"))]
            mfa: None,
            #[cfg(all(feature = "cache", feature = "audit"))]
            secrets: None,
            config: Arc::new(config),
            #[cfg(feature = "database")]
            db_pool: Arc::new(RwLock::new(None)),
            #[cfg(feature = "cache")]
            redis_pool: Arc::new(RwLock::new(None)),
                        broker: None,
        }
    }

    /// Create a new builder for AppState
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the shared Resilience Fabric.
    #[cfg(feature = "resilience")]
    pub fn resilience(&self) -> &Arc<ResilienceFabric> {
        &self.resilience
    }

    /// Get the configuration-change approval engine.
    #[cfg(feature = "audit")]
    pub fn approval(&self) -> &Arc<ApprovalService> {
        &self.approval
    }

    /// Get the MFA service, if a deployment key has been supplied.
    #[cfg(all(feature = "cache", feature = "audit"))]
    pub fn mfa(&self) -> Option<&Arc<MfaService>> {
        self.mfa.as_ref()
    }

    /// Get the secret lifecycle service, if a deployment key has been
    /// supplied.
    #[cfg(all(feature = "cache", feature = "audit"))]
    pub fn secrets(&self) -> Option<&Arc<SecretService>> {
        self.secrets.as_ref()
    }

    /// Get the database pool (async to handle RwLock)
    ///
    /// Returns a cloned PgPool if available. PgPool uses Arc internally,
    /// so cloning is cheap.
    #[cfg(feature = "database")]
    pub async fn db(&self) -> Option<PgPool> {
        self.db_pool.read().await.clone()
    }

    /// Get direct access to the database pool RwLock
    ///
    /// Use this if you need to check availability without acquiring the pool
    #[cfg(feature = "database")]
    pub fn db_lock(&self) -> &Arc<RwLock<Option<PgPool>>> {
        &self.db_pool
    }

    /// Replace the database pool storage with one shared by an external
    /// pool agent, so updates the agent makes are visible through this state.
    #[cfg(feature = "database")]
    pub fn set_db_pool_storage(&mut self, storage: Arc<RwLock<Option<PgPool>>>) {
        self.db_pool = storage;
    }

    /// Get the Redis pool (async to handle RwLock)
    ///
    /// Returns a cloned RedisPool if available. RedisPool uses Arc internally,
    /// so cloning is cheap.
    #[cfg(feature = "cache")]
    pub async fn redis(&self) -> Option<RedisPool> {
        self.redis_pool.read().await.clone()
    }

    /// Get direct access to the Redis pool RwLock
    #[cfg(feature = "cache")]
    pub fn redis_lock(&self) -> &Arc<RwLock<Option<RedisPool>>> {
        &self.redis_pool
    }

    /// Replace the Redis pool storage with one shared by an external pool agent.
    #[cfg(feature = "cache")]
    pub fn set_redis_pool_storage(&mut self, storage: Arc<RwLock<Option<RedisPool>>>) {
        self.redis_pool = storage;
    }

    /// Get the agent broker handle for event broadcasting
    ///
    /// Returns the broker handle if the acton-reactive runtime was initialized.
    /// HTTP handlers can use this to broadcast typed events to subscribed agents.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use voicehive_orchestrator::prelude::*;
    ///
    /// async fn create_user_handler(
    ///     State(state): State<Arc<AppState>>,
    ///     Json(user): Json<CreateUser>,
    /// ) -> Result<Json<User>, AppError> {
    ///     let user = create_user(user).await?;
    ///
    ///     // Broadcast event to all subscribed agents
    ///     if let Some(broker) = state.broker() {
    ///         broker.broadcast(UserCreatedEvent {
    ///             user_id: user.id,
    ///         }).await;
    ///     }
    ///
    ///     Ok(Json(user))
    /// }
    /// ```
        pub fn broker(&self) -> Option<&AgentHandle> {
        self.broker.as_ref()
    }

    /// Set the agent broker handle
    ///
    /// This is typically called by `ServiceBuilder` when an agent runtime
    /// is initialized via `with_agent_runtime()`.
        pub fn set_broker(&mut self, broker: AgentHandle) {
        self.broker = Some(broker);
    }

    /// Get pool health metrics for all configured pools
    ///
    /// Returns a summary of connection pool health including utilization,
    /// availability, and connection status for database and cache.
    pub async fn pool_health(&self) -> crate::pool_health::PoolHealthSummary {
        let mut summary = crate::pool_health::PoolHealthSummary::new();

        #[cfg(feature = "database")]
        if let Some(pool) = self.db().await {
            if let Some(db_config) = &self.config.database {
                summary.database = Some(crate::pool_health::DatabasePoolHealth::from_pool(
                    &pool, db_config,
                ));
            }
        }

        #[cfg(feature = "cache")]
        if let Some(pool) = self.redis().await {
            if let Some(redis_config) = &self.config.redis {
                summary.redis = Some(crate::pool_health::RedisPoolHealth::from_pool(
                    &pool,
                    redis_config,
                ));
            }
        }

        #[cfg(feature = "resilience")]
        {
            summary.breakers = self
                .resilience
                .snapshots()
                .iter()
                .map(crate::pool_health::BreakerHealth::from)
                .collect();
        }

        summary.healthy = summary.is_healthy();
        summary
    }
}

/// Builder for AppState
pub struct AppStateBuilder {
    config: Option<Config>,
    enable_tracing: bool,

    #[cfg(feature = "database")]
    db_pool: Option<PgPool>,

    #[cfg(feature = "cache")]
    redis_pool: Option<RedisPool>,

    #[cfg(all(feature = "cache", feature = "audit"))]
    mfa: Option<crate::mfa::MfaService>,

    #[cfg(all(feature = "cache", feature = "audit"))]
    secrets: Option<crate::secrets::SecretService>,

        broker: Option<AgentHandle>,
}

impl AppStateBuilder {
    /// Create a new builder with sensible defaults
    ///
    /// By default:
    /// - Config will be loaded from `Config::default()` if not provided
    /// - Tracing will be auto-initialized if not already set up
    pub fn new() -> Self {
        Self {
            config: None,
            enable_tracing: true,
            #[cfg(feature = "database")]
            db_pool: None,
            #[cfg(feature = "cache")]
            redis_pool: None,
            #[cfg(all(feature = "cache", feature = "audit"))]
            mfa: None,
            #[cfg(all(feature = "cache", feature = "audit"))]
            secrets: None,
                        broker: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Supply a pre-built MFA service. MFA requires a deployment
    /// encryption key that `Config` does not carry, so it cannot be
    /// constructed automatically from config alone.
    #[cfg(all(feature = "cache", feature = "audit"))]
    pub fn mfa_service(mut self, mfa: crate::mfa::MfaService) -> Self {
        self.mfa = Some(mfa);
        self
    }

    /// Supply a pre-built secret lifecycle service, for the same
    /// key-provisioning reason as [`Self::mfa_service`].
    #[cfg(all(feature = "cache", feature = "audit"))]
    pub fn secret_service(mut self, secrets: crate::secrets::SecretService) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Set the database pool
    #[cfg(feature = "database")]
    pub fn db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Set the Redis pool
    #[cfg(feature = "cache")]
    pub fn redis_pool(mut self, pool: RedisPool) -> Self {
        self.redis_pool = Some(pool);
        self
    }

    /// Set the agent broker handle for event broadcasting
    ///
    /// The broker handle can be obtained from `AgentRuntime::broker()` after
    /// initializing the acton-reactive runtime via `ServiceBuilder::with_agent_runtime()`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let runtime = service_builder.with_agent_runtime();
    /// let broker = runtime.broker();
    ///
    /// let state = AppState::builder()
    ///     .config(config)
    ///     .broker(broker)
    ///     .build()
    ///     .await?;
    /// ```
        pub fn broker(mut self, broker: AgentHandle) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Enable automatic tracing initialization (default: enabled)
    ///
    /// When enabled, the builder will automatically set up tracing with sensible
    /// defaults if it hasn't been initialized already. This is the default behavior.
    pub fn with_tracing(mut self) -> Self {
        self.enable_tracing = true;
        self
    }

    /// Disable automatic tracing initialization
    ///
    /// Use this if you want to set up tracing manually or if your application
    /// already has tracing configured before calling `build()`.
    pub fn without_tracing(mut self) -> Self {
        self.enable_tracing = false;
        self
    }

    /// Initialize tracing with sensible defaults
    ///
    /// This is called automatically during `build()` unless disabled with `without_tracing()`.
    /// It's safe to call multiple times - subsequent calls are no-ops.
    fn init_tracing() {
        use std::sync::Once;
        static INIT: Once = Once::new();

        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .with_target(false)
                .init();
            tracing::debug!("Tracing initialized with default configuration");
        });
    }

    /// Build the AppState, initializing connection pools as needed
    ///
    /// This will:
    /// - Use provided config or load `Config::default()` if not set
    /// - Initialize tracing with sensible defaults (unless disabled or already initialized)
    /// - Set up database, cache, and event connections based on config
    pub async fn build(self) -> Result<AppState> {
        // Initialize tracing if enabled and not already set up
        if self.enable_tracing {
            Self::init_tracing();
        }

        // Use provided config or default
        let config = self.config.unwrap_or_default();

        #[cfg(feature = "database")]
        let db_pool = if let Some(pool) = self.db_pool {
            // Pool was provided explicitly
            Arc::new(RwLock::new(Some(pool)))
        } else if let Some(db_config) = &config.database {
            if db_config.lazy_init {
                // Lazy initialization: start with None and connect in background
                let pool_lock = Arc::new(RwLock::new(None));
                let pool_clone = pool_lock.clone();
                let db_config_clone = db_config.clone();

                tokio::spawn(async move {
                    tracing::info!("Initiating lazy database connection...");
                    match crate::database::create_pool(&db_config_clone).await {
                        Ok(pool) => {
                            *pool_clone.write().await = Some(pool);
                            tracing::info!("Lazy database connection established successfully");
                        }
                        Err(e) => {
                            if db_config_clone.optional {
                                tracing::warn!("Optional database connection failed: {}. Service will continue without database.", e);
                            } else {
                                tracing::error!("Required database connection failed: {}. Service is degraded.", e);
                            }
                        }
                    }
                });

                pool_lock
            } else {
                // Eager initialization: connect now
                match crate::database::create_pool(db_config).await {
                    Ok(pool) => Arc::new(RwLock::new(Some(pool))),
                    Err(e) => {
                        if db_config.optional {
                            tracing::warn!("Optional database connection failed: {}. Service starting without database.", e);
                            Arc::new(RwLock::new(None))
                        } else {
                            // Non-optional, fail fast
                            return Err(e);
                        }
                    }
                }
            }
        } else {
            // No database configuration
            Arc::new(RwLock::new(None))
        };

        #[cfg(feature = "cache")]
        let redis_pool = if let Some(pool) = self.redis_pool {
            // Pool was provided explicitly
            Arc::new(RwLock::new(Some(pool)))
        } else if let Some(redis_config) = &config.redis {
            if redis_config.lazy_init {
                // Lazy initialization: start with None and connect in background
                let pool_lock = Arc::new(RwLock::new(None));
                let pool_clone = pool_lock.clone();
                let redis_config_clone = redis_config.clone();

                tokio::spawn(async move {
                    tracing::info!("Initiating lazy Redis connection...");
                    match crate::cache::create_pool(&redis_config_clone).await {
                        Ok(pool) => {
                            *pool_clone.write().await = Some(pool);
                            tracing::info!("Lazy Redis connection established successfully");
                        }
                        Err(e) => {
                            if redis_config_clone.optional {
                                tracing::warn!("Optional Redis connection failed: {}. Service will continue without Redis.", e);
                            } else {
                                tracing::error!("Required Redis connection failed: {}. Service is degraded.", e);
                            }
                        }
                    }
                });

                pool_lock
            } else {
                // Eager initialization: connect now
                match crate::cache::create_pool(redis_config).await {
                    Ok(pool) => Arc::new(RwLock::new(Some(pool))),
                    Err(e) => {
                        if redis_config.optional {
                            tracing::warn!("Optional Redis connection failed: {}. Service starting without Redis.", e);
                            Arc::new(RwLock::new(None))
                        } else {
                            // Non-optional, fail fast
                            return Err(e);
                        }
                    }
                }
            }
        } else {
            // No Redis configuration
            Arc::new(RwLock::new(None))
        };

        #[cfg(feature = "resilience")]
        let resilience = Arc::new(ResilienceFabric::new(config.fabric.clone()));
        #[cfg(feature = "audit")]
        let approval = Arc::new(ApprovalService::new(config.approval.clone()));

        Ok(AppState {
            #[cfg(feature = "resilience")]
            resilience,
            #[cfg(feature = "audit")]
            approval,
            #[cfg(all(feature = "cache", feature = "audit"))]
            mfa: self.mfa.map(Arc::new),
            #[cfg(all(feature = "cache", feature = "audit"))]
            secrets: self.secrets.map(Arc::new),
            config: Arc::new(config),
            #[cfg(feature = "database")]
            db_pool,
            #[cfg(feature = "cache")]
            redis_pool,
                        broker: self.broker,
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_builder() {
        let config = Config::default();
        let builder = AppStateBuilder::new()
            .config(config)
            .without_tracing(); // Disable tracing in tests to avoid global subscriber conflicts

        // This should succeed even without connection pools
        let state = builder.build().await.unwrap();
        assert_eq!(state.config().service.name, "voicehive-orchestrator");
    }

    #[tokio::test]
    async fn test_state_builder_defaults() {
        // Test that config defaults work
        let state = AppStateBuilder::new()
            .without_tracing() // Disable tracing in tests
            .build()
            .await
            .unwrap();

        assert_eq!(state.config().service.name, "voicehive-orchestrator");
    }
}
