//! Subscription validation.
//!
//! Combines the plan catalog, the stored profile/subscription rows and the
//! wall clock into a single [`ValidationResult`]. Read failures never escape:
//! they resolve to the free tier with `is_valid = false` and the error text
//! attached.

use crate::models::{PlanFeature, Profile, SubscriptionRecord, SubscriptionStatus, UserType};
use crate::services::cache::TtlCache;
use crate::services::grace::{GracePeriodType, GracePolicy};
use crate::services::metrics::{record_cache_lookup, record_error, record_validation};
use crate::services::store::EntitlementStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub user_type: UserType,
    pub status: SubscriptionStatus,
    pub is_lifetime: bool,
    pub is_grace_period: bool,
    pub grace_period_type: Option<GracePeriodType>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    /// Outcome of the caller's feature check; absent when none was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features_granted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    /// The most restrictive answer, used whenever the backing reads fail.
    pub fn fail_closed(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            user_type: UserType::Free,
            status: SubscriptionStatus::Active,
            is_lifetime: false,
            is_grace_period: false,
            grace_period_type: None,
            grace_period_ends_at: None,
            days_until_expiry: None,
            features_granted: None,
            error: Some(error.into()),
        }
    }

    /// Tier whose limits apply right now. A lapsed subscription falls back to free.
    pub fn effective_user_type(&self) -> UserType {
        if self.is_valid {
            self.user_type
        } else {
            UserType::Free
        }
    }

    pub fn has_feature(&self, feature: PlanFeature) -> bool {
        self.is_valid
            && self.user_type != UserType::Free
            && self.user_type.limits().has_feature(feature)
    }

    /// All named features must be known and granted. Free or invalid
    /// subscriptions never pass.
    pub fn has_features<S: AsRef<str>>(&self, names: &[S]) -> bool {
        if !self.is_valid || self.user_type == UserType::Free {
            return false;
        }
        names.iter().all(|name| {
            PlanFeature::from_string(name.as_ref()).is_some_and(|f| self.has_feature(f))
        })
    }

    fn with_required_features<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.features_granted = if names.is_empty() {
            None
        } else {
            Some(self.has_features(names))
        };
        self
    }
}

/// Whole days until `expires_at`, rounded up. Negative once expired.
pub fn days_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expires_at - now).num_milliseconds();
    (millis as f64 / 86_400_000.0).ceil() as i64
}

/// Pure validation over already-fetched rows.
pub fn evaluate(
    profile: Option<&Profile>,
    record: Option<&SubscriptionRecord>,
    grace: &dyn GracePolicy,
    now: DateTime<Utc>,
) -> ValidationResult {
    let user_type = profile
        .map(Profile::user_type)
        .or_else(|| record.map(SubscriptionRecord::user_type))
        .unwrap_or_default();

    // The subscription row is richer than the profile's coarse copy.
    let status = record
        .map(SubscriptionRecord::status)
        .or_else(|| profile.map(Profile::status))
        .unwrap_or(SubscriptionStatus::Active);
    let expires_at = record.and_then(|r| r.expires_at);

    let days_until_expiry = match (status, expires_at) {
        (SubscriptionStatus::Active, Some(at)) => Some(days_until(at, now)),
        _ => None,
    };

    let (mut grace_period_type, mut grace_period_ends_at) = (None, None);
    if status == SubscriptionStatus::Unpaid {
        grace_period_type = Some(GracePeriodType::Payment);
        grace_period_ends_at = record.and_then(|r| grace.payment_grace_end(r));
    } else if !status.grants_access() {
        if let Some(end) = record.and_then(|r| grace.trial_grace_end(r)) {
            if now < end {
                grace_period_type = Some(GracePeriodType::Trial);
                grace_period_ends_at = Some(end);
            }
        }
    }
    let is_grace_period = grace_period_type.is_some();

    let is_lifetime = user_type.plan().lifetime;
    let is_valid = user_type != UserType::Free
        && (is_lifetime
            || status.grants_access()
            || grace_period_type == Some(GracePeriodType::Trial));

    ValidationResult {
        is_valid,
        user_type,
        status,
        is_lifetime,
        is_grace_period,
        grace_period_type,
        grace_period_ends_at,
        days_until_expiry,
        features_granted: None,
        error: None,
    }
}

pub struct SubscriptionValidator {
    store: Arc<dyn EntitlementStore>,
    grace: Arc<dyn GracePolicy>,
    cache: Arc<TtlCache<ValidationResult>>,
}

impl SubscriptionValidator {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        grace: Arc<dyn GracePolicy>,
        cache: Arc<TtlCache<ValidationResult>>,
    ) -> Self {
        Self {
            store,
            grace,
            cache,
        }
    }

    pub fn cache_key(user_id: Uuid) -> String {
        format!("subscription:{}", user_id)
    }

    /// Validate against the store as of `now`, bypassing the cache.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn evaluate_at(&self, user_id: Uuid, now: DateTime<Utc>) -> ValidationResult {
        let profile = match self.store.get_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "Profile read failed, treating user as free");
                record_error("store_read", "get_profile");
                record_validation(UserType::Free.as_str(), "error");
                return ValidationResult::fail_closed(e.to_string());
            }
        };

        let record = match self.store.get_subscription(user_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Subscription read failed, treating user as free");
                record_error("store_read", "get_subscription");
                record_validation(UserType::Free.as_str(), "error");
                return ValidationResult::fail_closed(e.to_string());
            }
        };

        let result = evaluate(profile.as_ref(), record.as_ref(), self.grace.as_ref(), now);
        record_validation(
            result.user_type.as_str(),
            if result.is_valid { "valid" } else { "invalid" },
        );
        result
    }

    /// Validate the user's subscription and, when `required_features` is
    /// non-empty, check them against the plan.
    ///
    /// Results computed without a read error are cached for the cache's TTL.
    pub async fn validate<S: AsRef<str>>(
        &self,
        user_id: Uuid,
        required_features: &[S],
    ) -> ValidationResult {
        let key = Self::cache_key(user_id);
        let base = match self.cache.get(&key) {
            Some(cached) => {
                record_cache_lookup(true);
                cached
            }
            None => {
                record_cache_lookup(false);
                let fresh = self.evaluate_at(user_id, Utc::now()).await;
                if fresh.error.is_none() {
                    self.cache.insert(key, fresh.clone());
                }
                fresh
            }
        };

        base.with_required_features(required_features)
    }

    /// Forget the cached result for `user_id`.
    pub fn invalidate(&self, user_id: Uuid) -> bool {
        self.cache.invalidate(&Self::cache_key(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::grace::PaymentGraceOnly;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn profile(user_type: &str, status: &str) -> Profile {
        Profile {
            user_id: Uuid::nil(),
            user_type: user_type.to_string(),
            subscription_status: status.to_string(),
            updated_at: now(),
        }
    }

    fn record(user_type: &str, status: &str, expires_at: Option<DateTime<Utc>>) -> SubscriptionRecord {
        SubscriptionRecord {
            subscription_id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            user_type: user_type.to_string(),
            status: status.to_string(),
            expires_at,
            trial_ends_at: None,
            grace_period_ends_at: None,
            payment_grace_ends_at: None,
            retry_count: 0,
            last_retry_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    struct FixedTrialGrace(DateTime<Utc>);

    impl GracePolicy for FixedTrialGrace {
        fn payment_grace_end(&self, _record: &SubscriptionRecord) -> Option<DateTime<Utc>> {
            None
        }

        fn trial_grace_end(&self, _record: &SubscriptionRecord) -> Option<DateTime<Utc>> {
            Some(self.0)
        }
    }

    #[test]
    fn free_user_is_never_valid() {
        let grace = PaymentGraceOnly::default();
        for status in ["active", "on_trial", "unpaid", "cancelled", "expired"] {
            let p = profile("free", status);
            let r = record("free", status, Some(now() + Duration::days(30)));
            let result = evaluate(Some(&p), Some(&r), &grace, now());
            assert!(!result.is_valid, "status {status}");
            assert!(!result.has_features(&["custom_branding"]));
            for feature in PlanFeature::ALL {
                assert!(!result.has_feature(feature));
            }
        }
    }

    #[test]
    fn lifetime_plan_is_valid_after_expiry() {
        let grace = PaymentGraceOnly::default();
        let p = profile("pro", "expired");
        let r = record("pro", "cancelled", Some(now() - Duration::days(400)));
        let result = evaluate(Some(&p), Some(&r), &grace, now());
        assert!(result.is_valid);
        assert!(result.is_lifetime);
        assert!(result.has_features(&["white_label", "prioritySupport"]));
    }

    #[test]
    fn unpaid_is_payment_grace() {
        let grace = PaymentGraceOnly { days: 5 };
        let p = profile("plus", "active");
        let mut r = record("plus", "unpaid", Some(now() - Duration::days(1)));
        r.last_retry_at = Some(now() - Duration::days(1));
        let result = evaluate(Some(&p), Some(&r), &grace, now());
        assert!(result.is_grace_period);
        assert_eq!(result.grace_period_type, Some(GracePeriodType::Payment));
        assert_eq!(result.grace_period_ends_at, Some(now() + Duration::days(4)));
        assert!(result.is_valid);
        assert_eq!(result.days_until_expiry, None);
    }

    #[test]
    fn subscription_record_overrides_profile_status() {
        let grace = PaymentGraceOnly::default();
        let p = profile("plus", "active");
        let r = record("plus", "cancelled", None);
        let result = evaluate(Some(&p), Some(&r), &grace, now());
        assert_eq!(result.status, SubscriptionStatus::Cancelled);
        assert!(!result.is_valid);
        assert_eq!(result.effective_user_type(), UserType::Free);
    }

    #[test]
    fn days_until_expiry_rounds_up() {
        let grace = PaymentGraceOnly::default();
        let p = profile("plus", "active");
        let r = record("plus", "active", Some(now() + Duration::hours(36)));
        let result = evaluate(Some(&p), Some(&r), &grace, now());
        assert_eq!(result.days_until_expiry, Some(2));
        assert_eq!(days_until(now() + Duration::days(3), now()), 3);
        assert_eq!(days_until(now() - Duration::hours(12), now()), 0);
    }

    #[test]
    fn days_until_expiry_only_for_active() {
        let grace = PaymentGraceOnly::default();
        let p = profile("plus", "on_trial");
        let r = record("plus", "on_trial", Some(now() + Duration::days(10)));
        let result = evaluate(Some(&p), Some(&r), &grace, now());
        assert_eq!(result.days_until_expiry, None);
        assert!(result.is_valid);
    }

    #[test]
    fn missing_rows_mean_free_and_active() {
        let result = evaluate(None, None, &PaymentGraceOnly::default(), now());
        assert_eq!(result.user_type, UserType::Free);
        assert_eq!(result.status, SubscriptionStatus::Active);
        assert!(!result.is_valid);
        assert!(result.error.is_none());
    }

    #[test]
    fn unknown_feature_is_never_granted() {
        let p = profile("pro", "active");
        let result = evaluate(Some(&p), None, &PaymentGraceOnly::default(), now());
        assert!(result.is_valid);
        assert!(!result.has_features(&["ai_assistant"]));
        assert!(!result.has_features(&["custom_branding", "ai_assistant"]));
    }

    #[test]
    fn plus_lacks_white_label() {
        let p = profile("plus", "active");
        let result = evaluate(Some(&p), None, &PaymentGraceOnly::default(), now());
        assert!(result.has_features(&["custom_branding", "advanced_analytics"]));
        assert!(!result.has_features(&["white_label"]));
    }

    #[test]
    fn trial_grace_policy_keeps_access_open() {
        let p = profile("plus", "expired");
        let r = record("plus", "expired", Some(now() - Duration::days(1)));
        let policy = FixedTrialGrace(now() + Duration::days(2));
        let result = evaluate(Some(&p), Some(&r), &policy, now());
        assert!(result.is_valid);
        assert_eq!(result.grace_period_type, Some(GracePeriodType::Trial));

        let lapsed = FixedTrialGrace(now() - Duration::days(2));
        let result = evaluate(Some(&p), Some(&r), &lapsed, now());
        assert!(!result.is_valid);
        assert!(!result.is_grace_period);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let grace = PaymentGraceOnly::default();
        let p = profile("plus", "active");
        let mut r = record("plus", "unpaid", Some(now() + Duration::days(20)));
        r.last_retry_at = Some(now() - Duration::days(2));

        let first = evaluate(Some(&p), Some(&r), &grace, now());
        let second = evaluate(Some(&p), Some(&r), &grace, now());
        assert_eq!(first, second);
    }

    #[test]
    fn fail_closed_is_free_and_invalid() {
        let result = ValidationResult::fail_closed("connection refused");
        assert!(!result.is_valid);
        assert_eq!(result.user_type, UserType::Free);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
        assert!(!result.has_features::<&str>(&[]));
    }

    #[test]
    fn feature_check_is_omitted_when_nothing_requested() {
        let p = profile("plus", "active");
        let result = evaluate(Some(&p), None, &PaymentGraceOnly::default(), now());
        let empty: [&str; 0] = [];
        assert_eq!(result.clone().with_required_features(&empty).features_granted, None);
        assert_eq!(
            result.with_required_features(&["custom_branding"]).features_granted,
            Some(true)
        );
    }
}
