use crate::middleware::UserId;
use crate::services::ValidationResult;
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    /// Comma-separated feature names to check against the plan.
    pub features: Option<String>,
}

impl SubscriptionQuery {
    fn feature_names(&self) -> Vec<&str> {
        self.features
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[tracing::instrument(skip(state))]
pub async fn get_subscription(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(query): Query<SubscriptionQuery>,
) -> Json<ValidationResult> {
    Json(
        state
            .validator
            .validate(user_id, &query.feature_names())
            .await,
    )
}

/// Drop the cached result and validate against the store again.
#[tracing::instrument(skip(state))]
pub async fn refresh_subscription(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Json<ValidationResult> {
    state.validator.invalidate(user_id);
    Json(state.validator.validate::<&str>(user_id, &[]).await)
}
