//! Grace period policies.
//!
//! A grace period keeps access open for a bounded window after a payment
//! failure or trial end. Only payment grace is computed today; trial grace is
//! left to alternative `GracePolicy` implementations.

use crate::models::SubscriptionRecord;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GracePeriodType {
    Payment,
    Trial,
}

pub trait GracePolicy: Send + Sync {
    /// End of the payment grace window for an unpaid subscription, if known.
    fn payment_grace_end(&self, record: &SubscriptionRecord) -> Option<DateTime<Utc>>;

    /// End of the grace window that follows a trial. `None` means no trial grace.
    fn trial_grace_end(&self, record: &SubscriptionRecord) -> Option<DateTime<Utc>>;
}

/// Payment grace only. The window comes from the record when the payment
/// provider has set it, otherwise from the last retry plus `days`.
#[derive(Debug, Clone, Copy)]
pub struct PaymentGraceOnly {
    pub days: i64,
}

impl Default for PaymentGraceOnly {
    fn default() -> Self {
        Self { days: 7 }
    }
}

impl GracePolicy for PaymentGraceOnly {
    fn payment_grace_end(&self, record: &SubscriptionRecord) -> Option<DateTime<Utc>> {
        record
            .payment_grace_ends_at
            .or(record.grace_period_ends_at)
            .or_else(|| {
                record
                    .last_retry_at
                    .map(|failed_at| calculate_payment_grace_end(failed_at, self.days))
            })
    }

    fn trial_grace_end(&self, _record: &SubscriptionRecord) -> Option<DateTime<Utc>> {
        None
    }
}

pub fn calculate_payment_grace_end(failed_at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    failed_at + Duration::days(days.max(0))
}
