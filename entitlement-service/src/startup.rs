//! Application startup and lifecycle management.

use crate::config::{EntitlementConfig, EntitlementSettings};
use crate::handlers;
use crate::services::{
    init_metrics, Database, EntitlementStore, LimitGuard, PaymentGraceOnly, ProjectGuard,
    SubscriptionValidator, TtlCache, ValidationResult,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use ruzma_core::error::AppError;
use ruzma_core::middleware::{metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntitlementStore>,
    pub cache: Arc<TtlCache<ValidationResult>>,
    pub validator: Arc<SubscriptionValidator>,
    pub project_guard: Arc<ProjectGuard>,
    pub limit_guard: Arc<LimitGuard>,
}

impl AppState {
    /// Wire the validator and guards around `store`.
    pub fn new(store: Arc<dyn EntitlementStore>, settings: &EntitlementSettings) -> Self {
        let cache = Arc::new(TtlCache::new(settings.cache_ttl));
        let grace = Arc::new(PaymentGraceOnly {
            days: settings.payment_grace_days,
        });
        let validator = Arc::new(SubscriptionValidator::new(
            store.clone(),
            grace,
            cache.clone(),
        ));
        let project_guard = Arc::new(ProjectGuard::new(
            store.clone(),
            validator.clone(),
            settings.failure_policy,
        ));
        let limit_guard = Arc::new(LimitGuard::new(
            store.clone(),
            validator.clone(),
            settings.failure_policy,
        ));

        Self {
            store,
            cache,
            validator,
            project_guard,
            limit_guard,
        }
    }
}

/// Build the HTTP router for `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/v1/plans", get(handlers::list_plans))
        .route("/v1/subscription", get(handlers::get_subscription))
        .route("/v1/subscription/refresh", post(handlers::refresh_subscription))
        .route("/v1/projects/quota", get(handlers::project_quota))
        .route(
            "/v1/projects/enforce-limits",
            post(handlers::enforce_project_limits),
        )
        .route(
            "/v1/projects/:project_id/access",
            get(handlers::project_access),
        )
        .route("/v1/limits/:resource", get(handlers::check_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Periodically drop expired cache entries so idle users do not pin memory.
fn spawn_cache_sweeper(cache: Arc<TtlCache<ValidationResult>>) {
    let period = cache.ttl().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged = purged, "Purged expired validation cache entries");
            }
        }
    });
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: EntitlementConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: EntitlementConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: EntitlementConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let state = AppState::new(Arc::new(db), &config.entitlements);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            cache_ttl_secs = config.entitlements.cache_ttl.as_secs(),
            failure_policy = config.entitlements.failure_policy.as_str(),
            "Entitlement service listener bound"
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        spawn_cache_sweeper(self.state.cache.clone());

        tracing::info!(
            service = "entitlement-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, build_router(self.state)).await
    }
}
