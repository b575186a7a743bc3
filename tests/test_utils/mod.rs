//! Test utilities for database testing.
//!
//! This module provides utilities for setting up in-memory SQLite databases
//! with migrations, plus fixtures for organizations, users and integrations.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use url::Url;
use uuid::Uuid;

use timetrack::crypto::CryptoKey;
use timetrack::models::{integration, user::Role};
use timetrack::providers::{
    ExternalResource, ExternalTimeEntry, HierarchyLabels, HierarchySupport, IntegrationError,
    OAuthTokens, ProviderFeatures, ProviderMetadata, ProviderUser, Registry, ResourceHierarchy,
    TimeEntryInput, TimeTrackingProvider,
};
use timetrack::repositories::{ConnectParams, IntegrationRepository, OrganizationRepository};

pub const STUB_PROVIDER: &str = "stub";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    // Create in-memory SQLite database
    let db = Database::connect("sqlite::memory:").await?;

    // Run all migrations
    Migrator::up(&db, None).await?;

    // Fixtures insert rows out of dependency order in a few places.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

pub fn test_key() -> CryptoKey {
    CryptoKey::new(vec![3u8; 32]).expect("32 byte key")
}

/// Organization plus one user with the given role
pub struct OrgFixture {
    pub org_id: Uuid,
    pub user_id: Uuid,
}

pub async fn create_org_with_user(
    db: &DatabaseConnection,
    settings: Option<serde_json::Value>,
    role: Role,
    can_blur: bool,
) -> Result<OrgFixture> {
    let repo = OrganizationRepository::new(db.clone());
    let org = repo.create("Acme", settings).await?;
    let user = repo
        .create_user(
            Some(org.id),
            &format!("{}@acme.test", Uuid::new_v4()),
            "Test User",
            role,
            can_blur,
        )
        .await?;
    Ok(OrgFixture {
        org_id: org.id,
        user_id: user.id,
    })
}

/// Organization-wide integration with a static token
pub async fn connect_integration(
    db: &DatabaseConnection,
    key: &CryptoKey,
    org_id: Uuid,
    provider: &str,
) -> Result<integration::Model> {
    IntegrationRepository::new(db.clone(), key.clone())
        .connect(ConnectParams {
            organization_id: org_id,
            provider: provider.to_string(),
            tokens: OAuthTokens {
                access_token: "tok_stub".to_string(),
                refresh_token: None,
                expires_in: None,
                token_type: "Bearer".to_string(),
                scope: None,
            },
            provider_account_id: Some("c0".to_string()),
            metadata: None,
            user_id: None,
        })
        .await
}

/// In-memory provider with a regular tree of the given shape
pub struct StubProvider {
    pub containers: usize,
    pub projects: usize,
    pub collections: usize,
    pub tasks: usize,
}

impl StubProvider {
    pub fn new(containers: usize, projects: usize, collections: usize, tasks: usize) -> Self {
        Self {
            containers,
            projects,
            collections,
            tasks,
        }
    }

    fn nodes(prefix: &str, tag: &str, count: usize, kind: &str) -> Vec<ExternalResource> {
        (0..count)
            .map(|i| {
                let id = if prefix.is_empty() {
                    format!("{tag}{i:03}")
                } else {
                    format!("{prefix}-{tag}{i:03}")
                };
                ExternalResource {
                    name: format!("{kind} {id}"),
                    id,
                    provider_type: kind.to_string(),
                    status: None,
                    color: None,
                    metadata: None,
                }
            })
            .collect()
    }
}

#[async_trait]
impl TimeTrackingProvider for StubProvider {
    fn id(&self) -> &'static str {
        STUB_PROVIDER
    }

    fn auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, IntegrationError> {
        let mut url = Url::parse("https://stub.test/authorize")
            .map_err(|e| IntegrationError::unsupported(STUB_PROVIDER, &e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("state", state)
            .append_pair("redirect_uri", redirect_uri);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _redirect_uri: &str,
    ) -> Result<OAuthTokens, IntegrationError> {
        Err(IntegrationError::unsupported(STUB_PROVIDER, "no oauth"))
    }

    async fn refresh_access_token(
        &self,
        _refresh_token: &str,
    ) -> Result<OAuthTokens, IntegrationError> {
        Err(IntegrationError::unsupported(STUB_PROVIDER, "no oauth"))
    }

    async fn fetch_workspaces(
        &self,
        _access_token: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        Ok(Self::nodes("", "c", self.containers, "workspace"))
    }

    async fn fetch_projects(
        &self,
        _access_token: &str,
        workspace_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        Ok(Self::nodes(workspace_id, "p", self.projects, "project"))
    }

    async fn fetch_collections(
        &self,
        _access_token: &str,
        project_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        Ok(Self::nodes(project_id, "l", self.collections, "list"))
    }

    async fn fetch_tasks(
        &self,
        _access_token: &str,
        collection_id: &str,
    ) -> Result<Vec<ExternalResource>, IntegrationError> {
        Ok(Self::nodes(collection_id, "t", self.tasks, "task"))
    }

    async fn create_time_entry(
        &self,
        _access_token: &str,
        entry: &TimeEntryInput,
    ) -> Result<ExternalTimeEntry, IntegrationError> {
        Ok(ExternalTimeEntry {
            id: "entry-1".to_string(),
            task_id: Some(entry.task_id.clone()),
            start: Some(entry.start),
            end: entry.end,
            duration_ms: Some(entry.effective_duration_ms()),
        })
    }

    async fn update_time_entry(
        &self,
        access_token: &str,
        _entry_id: &str,
        entry: &TimeEntryInput,
    ) -> Result<ExternalTimeEntry, IntegrationError> {
        self.create_time_entry(access_token, entry).await
    }

    async fn delete_time_entry(
        &self,
        _access_token: &str,
        _entry_id: &str,
    ) -> Result<(), IntegrationError> {
        Ok(())
    }

    async fn current_user(&self, _access_token: &str) -> Result<ProviderUser, IntegrationError> {
        Ok(ProviderUser {
            id: "u1".to_string(),
            name: Some("Stub".to_string()),
            email: None,
        })
    }

    fn hierarchy(&self) -> ResourceHierarchy {
        ResourceHierarchy {
            supports: HierarchySupport {
                containers: true,
                projects: true,
                collections: true,
                sub_collections: false,
            },
            labels: HierarchyLabels {
                container: "Workspace".to_string(),
                project: "Project".to_string(),
                collection: "List".to_string(),
                task: "Task".to_string(),
            },
            max_depth: 3,
        }
    }
}

pub fn stub_metadata() -> ProviderMetadata {
    ProviderMetadata {
        name: STUB_PROVIDER.to_string(),
        display_name: "Stub".to_string(),
        description: "In-memory provider".to_string(),
        icon: STUB_PROVIDER.to_string(),
        color: "#000000".to_string(),
        features: ProviderFeatures {
            time_tracking: true,
            tasks: true,
            projects: true,
            workspaces: true,
        },
        required_env_vars: Vec::new(),
        is_enabled: true,
    }
}

pub fn stub_registry(provider: StubProvider) -> Arc<Registry> {
    let mut registry = Registry::new();
    registry.register(Arc::new(provider), stub_metadata());
    Arc::new(registry)
}
