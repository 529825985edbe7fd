use crate::middleware::UserId;
use crate::models::Resource;
use crate::services::LimitCheck;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use ruzma_core::error::AppError;

#[tracing::instrument(skip(state))]
pub async fn check_limit(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(resource): Path<String>,
) -> Result<Json<LimitCheck>, AppError> {
    let resource = Resource::from_string(&resource).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid resource: {}. Must be one of: projects, clients, invoices, storage",
            resource
        ))
    })?;

    Ok(Json(state.limit_guard.check_limit(user_id, resource).await))
}
