use crate::middleware::UserId;
use crate::services::{ProjectAccess, ProjectQuota};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use ruzma_core::error::AppError;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct EnforceLimitsResponse {
    pub archived_project_ids: Vec<Uuid>,
    pub count: usize,
}

#[tracing::instrument(skip(state))]
pub async fn project_quota(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Json<ProjectQuota> {
    Json(state.project_guard.can_create_project(user_id).await)
}

#[tracing::instrument(skip(state))]
pub async fn project_access(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectAccess>, AppError> {
    let project_id = Uuid::parse_str(&project_id).map_err(|_| {
        AppError::BadRequest(anyhow::anyhow!("Invalid project id: {}", project_id))
    })?;

    Ok(Json(
        state
            .project_guard
            .check_project_access(user_id, project_id)
            .await,
    ))
}

/// Archive projects beyond the caller's plan limit. Called after a downgrade.
#[tracing::instrument(skip(state))]
pub async fn enforce_project_limits(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<EnforceLimitsResponse>, AppError> {
    let archived = state.project_guard.enforce_plan_limits(user_id).await?;
    let count = archived.len();

    Ok(Json(EnforceLimitsResponse {
        archived_project_ids: archived,
        count,
    }))
}
