//! Usage limit and feature checks for clients, invoices, storage and projects.

use crate::models::{PlanLimits, Resource, UNLIMITED};
use crate::services::metrics::{record_error, record_guard_decision};
use crate::services::policy::FailurePolicy;
use crate::services::store::EntitlementStore;
use crate::services::validator::SubscriptionValidator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub resource: Resource,
    pub allowed: bool,
    pub current: i64,
    pub limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Limit decision for adding one more unit of `resource`.
pub fn limit_check(resource: Resource, current: i64, limit: i64) -> LimitCheck {
    let allowed = PlanLimits::has_room(limit, current);
    let message = (!allowed).then(|| match resource {
        Resource::Storage => format!(
            "You have used {} MB of your {} MB storage. Upgrade your plan for more space.",
            current, limit
        ),
        _ => format!(
            "You have reached your plan's limit of {} {}. Upgrade your plan to add more.",
            limit,
            resource.as_str()
        ),
    });

    LimitCheck {
        resource,
        allowed,
        current,
        limit,
        message,
        error: None,
    }
}

pub struct LimitGuard {
    store: Arc<dyn EntitlementStore>,
    validator: Arc<SubscriptionValidator>,
    policy: FailurePolicy,
}

impl LimitGuard {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        validator: Arc<SubscriptionValidator>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            store,
            validator,
            policy,
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, resource = resource.as_str()))]
    pub async fn check_limit(&self, user_id: Uuid, resource: Resource) -> LimitCheck {
        let validation = self.validator.validate::<&str>(user_id, &[]).await;
        let limit = validation
            .effective_user_type()
            .limits()
            .limit_for(resource);

        let usage = match validation.error {
            Some(error) => Err(error),
            None => self
                .store
                .count_resource(user_id, resource)
                .await
                .map_err(|e| {
                    warn!(error = %e, policy = self.policy.as_str(), "Usage count failed");
                    record_error("store_read", "count_resource");
                    e.to_string()
                }),
        };

        let check = match usage {
            Ok(current) => limit_check(resource, current, limit),
            Err(error) => LimitCheck {
                resource,
                allowed: limit == UNLIMITED || self.policy.allows(),
                current: 0,
                limit,
                message: Some("We could not verify your plan usage. Please try again.".to_string()),
                error: Some(error),
            },
        };

        record_guard_decision(
            resource.as_str(),
            if check.allowed { "allow" } else { "deny" },
        );
        check
    }

    /// Whether the user's plan grants every named feature. With no features
    /// named, any valid paid plan qualifies.
    pub async fn has_features<S: AsRef<str>>(&self, user_id: Uuid, features: &[S]) -> bool {
        let granted = self
            .validator
            .validate(user_id, features)
            .await
            .has_features(features);
        record_guard_decision("features", if granted { "allow" } else { "deny" });
        granted
    }
}
