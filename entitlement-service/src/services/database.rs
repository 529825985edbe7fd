//! Database service for entitlement-service.

use crate::models::{ArchiveReason, Profile, Project, Resource, SubscriptionRecord};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::EntitlementStore;
use async_trait::async_trait;
use ruzma_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "entitlement-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl EntitlementStore for Database {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_profile"])
            .start_timer();

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, user_type, subscription_status, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get profile: {}", e)))?;

        timer.observe_duration();

        Ok(profile)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        // A user may have several rows across re-subscriptions; the newest wins.
        let subscription = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT subscription_id, user_id, user_type, status, expires_at, trial_ends_at,
                   grace_period_ends_at, payment_grace_ends_at, retry_count, last_retry_at,
                   created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscription)
    }

    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    async fn get_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT project_id, user_id, name, status, archived_at, archive_reason, created_at, updated_at
            FROM projects
            WHERE user_id = $1 AND project_id = $2
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        timer.observe_duration();

        Ok(project)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_active_project_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_project_ids"])
            .start_timer();

        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT project_id
            FROM projects
            WHERE user_id = $1 AND status <> 'archived'
            ORDER BY updated_at DESC, project_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list projects: {}", e)))?;

        timer.observe_duration();

        Ok(ids)
    }

    #[instrument(skip(self), fields(user_id = %user_id, resource = resource.as_str()))]
    async fn count_resource(&self, user_id: Uuid, resource: Resource) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_resource"])
            .start_timer();

        let sql = match resource {
            Resource::Projects => {
                "SELECT COUNT(*) FROM projects WHERE user_id = $1 AND status <> 'archived'"
            }
            Resource::Clients => "SELECT COUNT(*) FROM clients WHERE user_id = $1",
            Resource::Invoices => "SELECT COUNT(*) FROM invoices WHERE user_id = $1",
            Resource::Storage => {
                "SELECT COALESCE(CEIL(SUM(size_bytes)::numeric / 1048576), 0)::BIGINT \
                 FROM storage_objects WHERE user_id = $1"
            }
        };

        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to count {}: {}",
                    resource.as_str(),
                    e
                ))
            })?;

        timer.observe_duration();

        Ok(count)
    }

    #[instrument(skip(self, project_ids, reason), fields(user_id = %user_id, count = project_ids.len()))]
    async fn archive_projects(
        &self,
        user_id: Uuid,
        project_ids: &[Uuid],
        reason: &ArchiveReason,
    ) -> Result<u64, AppError> {
        if project_ids.is_empty() {
            return Ok(0);
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["archive_projects"])
            .start_timer();

        // updated_at is left alone so the in-limit ordering survives a later upgrade.
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET status = 'archived', archived_at = NOW(), archive_reason = $3
            WHERE user_id = $1 AND project_id = ANY($2) AND status <> 'archived'
            "#,
        )
        .bind(user_id)
        .bind(project_ids)
        .bind(reason.to_json())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to archive projects: {}", e))
        })?;

        timer.observe_duration();
        info!(archived = result.rows_affected(), "Projects archived");

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }
}
