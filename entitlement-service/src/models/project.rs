//! Project view used by the access guards.

use super::UserType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Project lifecycle state relevant to access decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "archived" => ProjectStatus::Archived,
            _ => ProjectStatus::Active,
        }
    }
}

/// Why a project was archived. Stored as JSONB in `projects.archive_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiveReason {
    /// Archived because the owner's plan no longer covers it.
    PlanDowngrade { plan: UserType },
    /// Archived by the owner. Rows written before reasons were structured
    /// carry their free-text reason here.
    Manual {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
}

impl ArchiveReason {
    /// Decode a stored reason. A bare JSON string is a legacy free-text reason.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(note) => Some(ArchiveReason::Manual {
                note: Some(note.clone()),
            }),
            other => serde_json::from_value(other.clone()).ok().or_else(|| {
                Some(ArchiveReason::Manual {
                    note: Some(other.to_string()),
                })
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub status: String,
    pub archived_at: Option<DateTime<Utc>>,
    pub archive_reason: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn status(&self) -> ProjectStatus {
        ProjectStatus::from_string(&self.status)
    }

    pub fn is_archived(&self) -> bool {
        self.status() == ProjectStatus::Archived
    }

    pub fn archive_reason(&self) -> Option<ArchiveReason> {
        self.archive_reason.as_ref().and_then(ArchiveReason::from_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_free_text_reason_becomes_manual_note() {
        let reason = ArchiveReason::from_json(&json!("plan_downgrade to free")).unwrap();
        assert_eq!(
            reason,
            ArchiveReason::Manual {
                note: Some("plan_downgrade to free".to_string())
            }
        );
    }

    #[test]
    fn structured_downgrade_reason_is_decoded() {
        let stored = json!({ "kind": "plan_downgrade", "plan": "free" });
        assert_eq!(
            ArchiveReason::from_json(&stored),
            Some(ArchiveReason::PlanDowngrade {
                plan: UserType::Free
            })
        );
    }

    #[test]
    fn null_reason_is_absent() {
        assert_eq!(ArchiveReason::from_json(&serde_json::Value::Null), None);
    }
}
