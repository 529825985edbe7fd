//! Profile and subscription records.

use super::UserType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription lifecycle state as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    OnTrial,
    Unpaid,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::OnTrial => "on_trial",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Unrecognised values are read as `expired` so they never grant access.
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => SubscriptionStatus::Active,
            "on_trial" => SubscriptionStatus::OnTrial,
            "unpaid" => SubscriptionStatus::Unpaid,
            "cancelled" => SubscriptionStatus::Cancelled,
            _ => SubscriptionStatus::Expired,
        }
    }

    /// States in which a recurring plan still grants access.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::OnTrial | SubscriptionStatus::Unpaid
        )
    }
}

/// Coarse entitlement fields kept on the user's profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub user_type: String,
    pub subscription_status: String,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn user_type(&self) -> UserType {
        UserType::from_string(&self.user_type)
    }

    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_string(&self.subscription_status)
    }
}

/// Provider-backed subscription row, written by checkout and payment webhooks.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRecord {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub user_type: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub payment_grace_ends_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_string(&self.status)
    }

    pub fn user_type(&self) -> UserType {
        UserType::from_string(&self.user_type)
    }
}
