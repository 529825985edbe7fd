//! Shared test harness: an in-memory store behind the real router.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use entitlement_service::config::EntitlementSettings;
use entitlement_service::models::{
    ArchiveReason, Profile, Project, Resource, SubscriptionRecord,
};
use entitlement_service::services::{EntitlementStore, FailurePolicy};
use entitlement_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use ruzma_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    subscriptions: HashMap<Uuid, SubscriptionRecord>,
    projects: Vec<Project>,
    usage: HashMap<(Uuid, Resource), i64>,
}

/// `EntitlementStore` over plain maps. Flip `fail_reads` to simulate an outage.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(AppError::DatabaseError(anyhow::anyhow!(
                "connection refused"
            )))
        } else {
            Ok(())
        }
    }

    pub fn put_profile(&self, user_id: Uuid, user_type: &str, status: &str) {
        self.tables.lock().unwrap().profiles.insert(
            user_id,
            Profile {
                user_id,
                user_type: user_type.to_string(),
                subscription_status: status.to_string(),
                updated_at: Utc::now(),
            },
        );
    }

    pub fn put_subscription(
        &self,
        user_id: Uuid,
        user_type: &str,
        status: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> SubscriptionRecord {
        let now = Utc::now();
        let record = SubscriptionRecord {
            subscription_id: Uuid::new_v4(),
            user_id,
            user_type: user_type.to_string(),
            status: status.to_string(),
            expires_at,
            trial_ends_at: None,
            grace_period_ends_at: None,
            payment_grace_ends_at: None,
            retry_count: 0,
            last_retry_at: None,
            created_at: now,
            updated_at: now,
        };
        self.put_record(record.clone());
        record
    }

    pub fn put_record(&self, record: SubscriptionRecord) {
        self.tables
            .lock()
            .unwrap()
            .subscriptions
            .insert(record.user_id, record);
    }

    /// Add an active project last updated `age_minutes` ago.
    pub fn add_project(&self, user_id: Uuid, name: &str, age_minutes: i64) -> Uuid {
        let project_id = Uuid::new_v4();
        let updated_at = Utc::now() - Duration::minutes(age_minutes);
        self.tables.lock().unwrap().projects.push(Project {
            project_id,
            user_id,
            name: name.to_string(),
            status: "active".to_string(),
            archived_at: None,
            archive_reason: None,
            created_at: updated_at,
            updated_at,
        });
        project_id
    }

    /// Archive a project by hand, as its owner would.
    pub fn archive_project(&self, project_id: Uuid, note: &str) {
        let reason = ArchiveReason::Manual {
            note: Some(note.to_string()),
        };
        for project in self.tables.lock().unwrap().projects.iter_mut() {
            if project.project_id == project_id {
                project.status = "archived".to_string();
                project.archived_at = Some(Utc::now());
                project.archive_reason = Some(reason.to_json());
            }
        }
    }

    pub fn set_usage(&self, user_id: Uuid, resource: Resource, value: i64) {
        self.tables
            .lock()
            .unwrap()
            .usage
            .insert((user_id, resource), value);
    }

    pub fn project(&self, project_id: Uuid) -> Option<Project> {
        self.tables
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.project_id == project_id)
            .cloned()
    }
}

#[async_trait]
impl EntitlementStore for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        self.check()?;
        Ok(self.tables.lock().unwrap().profiles.get(&user_id).cloned())
    }

    async fn get_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .subscriptions
            .get(&user_id)
            .cloned())
    }

    async fn get_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<Option<Project>, AppError> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.user_id == user_id && p.project_id == project_id)
            .cloned())
    }

    async fn list_active_project_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut active: Vec<&Project> = tables
            .projects
            .iter()
            .filter(|p| p.user_id == user_id && !p.is_archived())
            .collect();
        active.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.project_id.cmp(&b.project_id))
        });
        Ok(active.into_iter().map(|p| p.project_id).collect())
    }

    async fn count_resource(&self, user_id: Uuid, resource: Resource) -> Result<i64, AppError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(match resource {
            Resource::Projects => tables
                .projects
                .iter()
                .filter(|p| p.user_id == user_id && !p.is_archived())
                .count() as i64,
            other => tables.usage.get(&(user_id, other)).copied().unwrap_or(0),
        })
    }

    async fn archive_projects(
        &self,
        user_id: Uuid,
        project_ids: &[Uuid],
        reason: &ArchiveReason,
    ) -> Result<u64, AppError> {
        self.check()?;
        let now = Utc::now();
        let mut changed = 0;
        for project in self.tables.lock().unwrap().projects.iter_mut() {
            if project.user_id == user_id
                && project_ids.contains(&project.project_id)
                && !project.is_archived()
            {
                project.status = "archived".to_string();
                project.archived_at = Some(now);
                project.archive_reason = Some(reason.to_json());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check()
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Fail-closed app with caching disabled.
    pub fn new() -> Self {
        Self::with_settings(EntitlementSettings {
            cache_ttl: std::time::Duration::ZERO,
            ..EntitlementSettings::default()
        })
    }

    pub fn with_policy(failure_policy: FailurePolicy) -> Self {
        Self::with_settings(EntitlementSettings {
            cache_ttl: std::time::Duration::ZERO,
            failure_policy,
            ..EntitlementSettings::default()
        })
    }

    pub fn with_settings(settings: EntitlementSettings) -> Self {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::new(store.clone(), &settings);
        let router = build_router(state.clone());
        Self {
            store,
            state,
            router,
        }
    }

    pub async fn get(&self, uri: &str, user_id: Option<Uuid>) -> (StatusCode, serde_json::Value) {
        self.send("GET", uri, user_id.map(|id| id.to_string())).await
    }

    pub async fn post(&self, uri: &str, user_id: Option<Uuid>) -> (StatusCode, serde_json::Value) {
        self.send("POST", uri, user_id.map(|id| id.to_string())).await
    }

    /// GET with a verbatim `X-User-ID` header value.
    pub async fn get_as(&self, uri: &str, raw_user_id: &str) -> (StatusCode, serde_json::Value) {
        self.send("GET", uri, Some(raw_user_id.to_string())).await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user_header: Option<String>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(value) = user_header {
            request = request.header("X-User-ID", value);
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }
}
