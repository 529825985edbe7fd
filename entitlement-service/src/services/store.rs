//! Read/write seam between the guards and the backing database.

use crate::models::{ArchiveReason, Profile, Project, Resource, SubscriptionRecord};
use async_trait::async_trait;
use ruzma_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn get_subscription(&self, user_id: Uuid)
        -> Result<Option<SubscriptionRecord>, AppError>;

    async fn get_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, AppError>;

    /// Non-archived project ids, most recently updated first.
    async fn list_active_project_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// Current usage of `resource`. Projects exclude archived rows; storage is
    /// reported in whole megabytes, rounded up.
    async fn count_resource(&self, user_id: Uuid, resource: Resource) -> Result<i64, AppError>;

    /// Archive the given projects. Returns the number of rows changed.
    async fn archive_projects(
        &self,
        user_id: Uuid,
        project_ids: &[Uuid],
        reason: &ArchiveReason,
    ) -> Result<u64, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
