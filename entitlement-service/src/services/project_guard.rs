//! Project creation and project access guards.

use crate::models::{ArchiveReason, PlanLimits, Resource, UserType, UNLIMITED};
use crate::services::metrics::{record_error, record_guard_decision};
use crate::services::policy::FailurePolicy;
use crate::services::store::EntitlementStore;
use crate::services::validator::{SubscriptionValidator, ValidationResult};
use chrono::{DateTime, Utc};
use ruzma_core::error::AppError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectQuota {
    pub can_create: bool,
    pub current_count: i64,
    pub max_projects: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why access to a project was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenialReason {
    Archived {
        archived_at: Option<DateTime<Utc>>,
        archive_reason: Option<ArchiveReason>,
    },
    /// Outside the `max_projects` most recently updated projects.
    PlanLimits { position: usize, max_projects: i64 },
    /// Same as `PlanLimits`, but caused by a paid plan that lapsed.
    SubscriptionExpired {
        plan: UserType,
        position: usize,
        max_projects: i64,
    },
    NotFound,
    Unavailable,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::Archived { .. } => "archived",
            DenialReason::PlanLimits { .. } => "plan_limits",
            DenialReason::SubscriptionExpired { .. } => "subscription_expired",
            DenialReason::NotFound => "not_found",
            DenialReason::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectAccess {
    pub has_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<DenialReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectAccess {
    pub fn allowed() -> Self {
        Self {
            has_access: true,
            denial: None,
            error: None,
        }
    }

    pub fn denied(reason: DenialReason) -> Self {
        Self {
            has_access: false,
            denial: Some(reason),
            error: None,
        }
    }

    fn unavailable(policy: FailurePolicy, error: String) -> Self {
        let mut access = if policy.allows() {
            Self::allowed()
        } else {
            Self::denied(DenialReason::Unavailable)
        };
        access.error = Some(error);
        access
    }
}

/// Quota decision for creating one more project.
pub fn project_quota(current_count: i64, max_projects: i64) -> ProjectQuota {
    let can_create = PlanLimits::has_room(max_projects, current_count);
    let message = (!can_create).then(|| {
        format!(
            "You have reached your plan's limit of {} project{}. Upgrade your plan or archive a project to create a new one.",
            max_projects,
            if max_projects == 1 { "" } else { "s" }
        )
    });

    ProjectQuota {
        can_create,
        current_count,
        max_projects,
        message,
        error: None,
    }
}

/// Access decision for a non-archived project given the owner's active
/// projects ordered most recently updated first.
///
/// After a downgrade the `max_projects` most recently updated projects stay
/// reachable and the rest are refused.
pub fn access_by_position(
    ordered_project_ids: &[Uuid],
    project_id: Uuid,
    validation: &ValidationResult,
) -> ProjectAccess {
    let max_projects = validation.effective_user_type().limits().max_projects;
    if max_projects == UNLIMITED || ordered_project_ids.len() as i64 <= max_projects {
        return ProjectAccess::allowed();
    }

    // A project missing from the list was touched concurrently; its own row
    // already said it is not archived.
    let Some(position) = ordered_project_ids.iter().position(|id| *id == project_id) else {
        return ProjectAccess::allowed();
    };

    if (position as i64) < max_projects {
        return ProjectAccess::allowed();
    }

    if validation.user_type != UserType::Free && !validation.is_valid {
        ProjectAccess::denied(DenialReason::SubscriptionExpired {
            plan: validation.user_type,
            position,
            max_projects,
        })
    } else {
        ProjectAccess::denied(DenialReason::PlanLimits {
            position,
            max_projects,
        })
    }
}

pub struct ProjectGuard {
    store: Arc<dyn EntitlementStore>,
    validator: Arc<SubscriptionValidator>,
    policy: FailurePolicy,
}

impl ProjectGuard {
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

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Whether the user may create one more project under their current plan.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn can_create_project(&self, user_id: Uuid) -> ProjectQuota {
        let validation = self.validator.validate::<&str>(user_id, &[]).await;
        let max_projects = validation.effective_user_type().limits().max_projects;

        let quota = match validation.error {
            Some(error) => self.unverified_quota(max_projects, error),
            None => match self.store.count_resource(user_id, Resource::Projects).await {
                Ok(current_count) => project_quota(current_count, max_projects),
                Err(e) => {
                    warn!(error = %e, policy = self.policy.as_str(), "Project count failed");
                    record_error("store_read", "count_projects");
                    self.unverified_quota(max_projects, e.to_string())
                }
            },
        };

        record_guard_decision(
            "project_create",
            if quota.can_create { "allow" } else { "deny" },
        );
        quota
    }

    fn unverified_quota(&self, max_projects: i64, error: String) -> ProjectQuota {
        ProjectQuota {
            can_create: max_projects == UNLIMITED || self.policy.allows(),
            current_count: 0,
            max_projects,
            message: Some("We could not verify your project limit. Please try again.".to_string()),
            error: Some(error),
        }
    }

    /// Whether the user may open `project_id`.
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    pub async fn check_project_access(&self, user_id: Uuid, project_id: Uuid) -> ProjectAccess {
        let access = self.resolve_access(user_id, project_id).await;
        record_guard_decision(
            "project_access",
            match &access.denial {
                None => "allow",
                Some(reason) => reason.as_str(),
            },
        );
        access
    }

    async fn resolve_access(&self, user_id: Uuid, project_id: Uuid) -> ProjectAccess {
        let project = match self.store.get_project(user_id, project_id).await {
            Ok(Some(project)) => project,
            Ok(None) => return ProjectAccess::denied(DenialReason::NotFound),
            Err(e) => {
                warn!(error = %e, policy = self.policy.as_str(), "Project read failed");
                record_error("store_read", "get_project");
                return ProjectAccess::unavailable(self.policy, e.to_string());
            }
        };

        if project.is_archived() {
            return ProjectAccess::denied(DenialReason::Archived {
                archived_at: project.archived_at,
                archive_reason: project.archive_reason(),
            });
        }

        let validation = self.validator.validate::<&str>(user_id, &[]).await;
        if let Some(error) = &validation.error {
            return ProjectAccess::unavailable(self.policy, error.clone());
        }
        if validation.effective_user_type().limits().max_projects == UNLIMITED {
            return ProjectAccess::allowed();
        }

        match self.store.list_active_project_ids(user_id).await {
            Ok(ordered) => access_by_position(&ordered, project_id, &validation),
            Err(e) => {
                warn!(error = %e, policy = self.policy.as_str(), "Project list read failed");
                record_error("store_read", "list_active_project_ids");
                ProjectAccess::unavailable(self.policy, e.to_string())
            }
        }
    }

    /// Archive every active project beyond the plan's limit, keeping the most
    /// recently updated ones. Returns the archived project ids.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn enforce_plan_limits(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        self.validator.invalidate(user_id);
        let validation = self.validator.evaluate_at(user_id, Utc::now()).await;
        if let Some(error) = &validation.error {
            warn!(error = %error, "Cannot enforce plan limits without a subscription read");
            return Err(AppError::ServiceUnavailable);
        }

        let plan = validation.effective_user_type();
        let max_projects = plan.limits().max_projects;
        if max_projects == UNLIMITED {
            return Ok(Vec::new());
        }

        let ordered = self.store.list_active_project_ids(user_id).await?;
        let keep = usize::try_from(max_projects).unwrap_or(0);
        let excess: Vec<Uuid> = ordered.into_iter().skip(keep).collect();
        if excess.is_empty() {
            return Ok(excess);
        }

        let reason = ArchiveReason::PlanDowngrade { plan };
        self.store.archive_projects(user_id, &excess, &reason).await?;
        info!(
            archived = excess.len(),
            plan = plan.as_str(),
            "Archived projects over plan limit"
        );

        Ok(excess)
    }
}
