//! Configuration module for entitlement-service.

use crate::services::FailurePolicy;
use ruzma_core::config::{self as core_config, env_or};
use ruzma_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EntitlementConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub entitlements: EntitlementSettings,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Tunables for validation and the guards.
#[derive(Debug, Clone)]
pub struct EntitlementSettings {
    pub cache_ttl: Duration,
    pub failure_policy: FailurePolicy,
    pub payment_grace_days: i64,
}

impl Default for EntitlementSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            failure_policy: FailurePolicy::Closed,
            payment_grace_days: 7,
        }
    }
}

impl EntitlementSettings {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            cache_ttl: Duration::from_secs(env_or(
                "ENTITLEMENT_CACHE_TTL_SECONDS",
                defaults.cache_ttl.as_secs(),
            )?),
            failure_policy: env_or("ENTITLEMENT_FAILURE_POLICY", defaults.failure_policy)?,
            payment_grace_days: env_or("PAYMENT_GRACE_DAYS", defaults.payment_grace_days)?,
        })
    }
}

impl EntitlementConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "entitlement-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 2)?,
            },
            entitlements: EntitlementSettings::from_env()?,
        })
    }
}
