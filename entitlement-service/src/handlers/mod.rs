//! HTTP handlers for entitlement-service.

pub mod health;
pub mod limits;
pub mod plans;
pub mod projects;
pub mod subscription;

pub use health::{health_check, metrics_handler, readiness_check};
pub use limits::check_limit;
pub use plans::list_plans;
pub use projects::{enforce_project_limits, project_access, project_quota};
pub use subscription::{get_subscription, refresh_subscription};
