//! Plan catalog: tiers, prices, limits and feature flags.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sentinel limit value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Entitlement tier stored on the user's profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Free,
    Plus,
    Pro,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Free => "free",
            UserType::Plus => "plus",
            UserType::Pro => "pro",
        }
    }

    /// Unknown plan ids resolve to the most restrictive tier.
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "plus" => UserType::Plus,
            "pro" => UserType::Pro,
            _ => UserType::Free,
        }
    }

    pub fn plan(&self) -> Plan {
        Plan::for_user_type(*self)
    }

    pub fn limits(&self) -> PlanLimits {
        self.plan().limits
    }
}

/// How often a plan is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    None,
    Monthly,
    OneTime,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::None => "none",
            BillingInterval::Monthly => "monthly",
            BillingInterval::OneTime => "one_time",
        }
    }
}

/// Premium features gated by plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFeature {
    CustomBranding,
    AdvancedAnalytics,
    PrioritySupport,
    WhiteLabel,
}

impl PlanFeature {
    pub const ALL: [PlanFeature; 4] = [
        PlanFeature::CustomBranding,
        PlanFeature::AdvancedAnalytics,
        PlanFeature::PrioritySupport,
        PlanFeature::WhiteLabel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanFeature::CustomBranding => "custom_branding",
            PlanFeature::AdvancedAnalytics => "advanced_analytics",
            PlanFeature::PrioritySupport => "priority_support",
            PlanFeature::WhiteLabel => "white_label",
        }
    }

    /// Accepts both `snake_case` and the frontend's `camelCase` names.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim() {
            "custom_branding" | "customBranding" => Some(PlanFeature::CustomBranding),
            "advanced_analytics" | "advancedAnalytics" => Some(PlanFeature::AdvancedAnalytics),
            "priority_support" | "prioritySupport" => Some(PlanFeature::PrioritySupport),
            "white_label" | "whiteLabel" => Some(PlanFeature::WhiteLabel),
            _ => None,
        }
    }
}

/// Countable resources a plan puts a ceiling on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Projects,
    Clients,
    Invoices,
    Storage,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Projects => "projects",
            Resource::Clients => "clients",
            Resource::Invoices => "invoices",
            Resource::Storage => "storage",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "projects" => Some(Resource::Projects),
            "clients" => Some(Resource::Clients),
            "invoices" => Some(Resource::Invoices),
            "storage" => Some(Resource::Storage),
            _ => None,
        }
    }
}

/// Static limits for one tier. `UNLIMITED` (-1) disables a ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub max_projects: i64,
    pub max_clients: i64,
    pub max_storage_mb: i64,
    pub max_invoices: i64,
    pub features: Vec<PlanFeature>,
}

impl PlanLimits {
    pub fn limit_for(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Projects => self.max_projects,
            Resource::Clients => self.max_clients,
            Resource::Invoices => self.max_invoices,
            Resource::Storage => self.max_storage_mb,
        }
    }

    pub fn has_feature(&self, feature: PlanFeature) -> bool {
        self.features.contains(&feature)
    }

    /// Whether one more item fits under `limit` given `current` usage.
    /// Reaching the limit exactly means no more room.
    pub fn has_room(limit: i64, current: i64) -> bool {
        limit == UNLIMITED || current < limit
    }
}

/// A purchasable plan.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: UserType,
    pub name: &'static str,
    pub price: Decimal,
    pub currency: &'static str,
    pub interval: BillingInterval,
    /// One-time purchase that never expires.
    pub lifetime: bool,
    pub limits: PlanLimits,
}

impl Plan {
    pub fn for_user_type(user_type: UserType) -> Self {
        match user_type {
            UserType::Free => Plan {
                id: UserType::Free,
                name: "Free",
                price: Decimal::ZERO,
                currency: "USD",
                interval: BillingInterval::None,
                lifetime: false,
                limits: PlanLimits {
                    max_projects: 1,
                    max_clients: 1,
                    max_storage_mb: 100,
                    max_invoices: 3,
                    features: Vec::new(),
                },
            },
            UserType::Plus => Plan {
                id: UserType::Plus,
                name: "Plus",
                price: Decimal::new(1900, 2),
                currency: "USD",
                interval: BillingInterval::Monthly,
                lifetime: false,
                limits: PlanLimits {
                    max_projects: 10,
                    max_clients: 25,
                    max_storage_mb: 1024,
                    max_invoices: 50,
                    features: vec![PlanFeature::CustomBranding, PlanFeature::AdvancedAnalytics],
                },
            },
            UserType::Pro => Plan {
                id: UserType::Pro,
                name: "Pro",
                price: Decimal::new(34900, 2),
                currency: "USD",
                interval: BillingInterval::OneTime,
                lifetime: true,
                limits: PlanLimits {
                    max_projects: UNLIMITED,
                    max_clients: UNLIMITED,
                    max_storage_mb: 10240,
                    max_invoices: UNLIMITED,
                    features: PlanFeature::ALL.to_vec(),
                },
            },
        }
    }
}

/// Every plan, cheapest first.
pub fn plan_catalog() -> Vec<Plan> {
    [UserType::Free, UserType::Plus, UserType::Pro]
        .into_iter()
        .map(Plan::for_user_type)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_plan_id_resolves_to_free() {
        assert_eq!(UserType::from_string("enterprise"), UserType::Free);
        assert_eq!(UserType::from_string(""), UserType::Free);
        assert_eq!(UserType::from_string(" PRO "), UserType::Pro);
    }

    #[test]
    fn free_tier_has_no_features() {
        let limits = UserType::Free.limits();
        for feature in PlanFeature::ALL {
            assert!(!limits.has_feature(feature));
        }
    }

    #[test]
    fn pro_is_the_only_lifetime_plan() {
        let lifetime: Vec<UserType> = plan_catalog()
            .into_iter()
            .filter(|p| p.lifetime)
            .map(|p| p.id)
            .collect();
        assert_eq!(lifetime, vec![UserType::Pro]);
    }

    #[test]
    fn has_room_treats_limit_as_exclusive_ceiling() {
        assert!(PlanLimits::has_room(1, 0));
        assert!(!PlanLimits::has_room(1, 1));
        assert!(!PlanLimits::has_room(1, 5));
        assert!(PlanLimits::has_room(UNLIMITED, 10_000));
    }

    #[test]
    fn feature_names_accept_camel_case() {
        assert_eq!(
            PlanFeature::from_string("whiteLabel"),
            Some(PlanFeature::WhiteLabel)
        );
        assert_eq!(
            PlanFeature::from_string("custom_branding"),
            Some(PlanFeature::CustomBranding)
        );
        assert_eq!(PlanFeature::from_string("ai_assistant"), None);
    }

    #[test]
    fn plus_price_is_nineteen_dollars() {
        assert_eq!(UserType::Plus.plan().price.to_string(), "19.00");
    }
}
