//! Domain models for entitlement-service.

mod plan;
mod project;
mod subscription;

pub use plan::{
    plan_catalog, BillingInterval, Plan, PlanFeature, PlanLimits, Resource, UserType, UNLIMITED,
};
pub use project::{ArchiveReason, Project, ProjectStatus};
pub use subscription::{Profile, SubscriptionRecord, SubscriptionStatus};
