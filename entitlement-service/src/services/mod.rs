//! Services module for entitlement-service.

pub mod cache;
pub mod database;
pub mod grace;
pub mod limit_guard;
pub mod metrics;
pub mod policy;
pub mod project_guard;
pub mod store;
pub mod validator;

pub use cache::TtlCache;
pub use database::Database;
pub use grace::{calculate_payment_grace_end, GracePeriodType, GracePolicy, PaymentGraceOnly};
pub use limit_guard::{LimitCheck, LimitGuard};
pub use metrics::{get_metrics, init_metrics};
pub use policy::FailurePolicy;
pub use project_guard::{DenialReason, ProjectAccess, ProjectGuard, ProjectQuota};
pub use store::EntitlementStore;
pub use validator::{SubscriptionValidator, ValidationResult};
