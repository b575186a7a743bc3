//! Resource sync engine
//!
//! Mirrors a provider's hierarchy (containers → projects → collections →
//! tasks) into `synced_resources`. Smart sync samples the first branches of
//! the tree; full sync walks all of it. Individual levels can be refreshed on
//! demand behind a short-lived cache.

pub mod cache;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crypto::CryptoKey;
use crate::models::integration;
use crate::models::synced_resource::{self, ResourceType};
use crate::providers::{
    ExternalResource, IntegrationError, Registry, RegistryError,
};
use crate::repositories::{IntegrationRepository, ResourceUpsert, SyncedResourceRepository};

pub use cache::LevelCache;

/// Most resources written by a single level call; the rest is dropped
pub const MAX_RESOURCES_PER_LEVEL: usize = 100;
/// Smart sync: containers whose projects are fetched
pub const SMART_CONTAINER_LIMIT: u64 = 1;
/// Smart sync: projects whose collections are fetched
pub const SMART_PROJECT_LIMIT: u64 = 5;
/// Smart sync: collections whose tasks are fetched
pub const SMART_COLLECTION_LIMIT: u64 = 5;
/// Smart sync: tasks kept per collection
pub const SMART_TASKS_PER_COLLECTION: usize = 20;
/// Depth used for breadcrumb walks when the provider is no longer registered
const DEFAULT_MAX_DEPTH: u8 = 3;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] IntegrationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("resource {id} not found")]
    ResourceNotFound { id: Uuid },
    #[error("parent resource {id} not found")]
    ParentNotFound { id: Uuid },
    #[error("{level} cannot be loaded under a {parent_type}")]
    InvalidLevel {
        level: &'static str,
        parent_type: String,
    },
    #[error("integration {id} not found or not active")]
    IntegrationNotFound { id: Uuid },
    #[error("resource tree integrity violation: {message}")]
    DataIntegrity { message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Breadth of a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Smart,
    Full,
}

impl SyncMode {
    pub fn from_full_flag(full: bool) -> Self {
        if full { SyncMode::Full } else { SyncMode::Smart }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Smart => "smart",
            SyncMode::Full => "full",
        }
    }

    fn breadth(self, smart_limit: u64) -> Option<u64> {
        match self {
            SyncMode::Smart => Some(smart_limit),
            SyncMode::Full => None,
        }
    }
}

/// Rows written per level during one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncStats {
    pub containers: usize,
    pub projects: usize,
    pub collections: usize,
    pub tasks: usize,
}

impl SyncStats {
    pub fn total(&self) -> usize {
        self.containers + self.projects + self.collections + self.tasks
    }
}

/// Child level refreshed by [`SmartSyncService::sync_level`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncLevel {
    Projects,
    Collections,
    Tasks,
}

impl SyncLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncLevel::Projects => "projects",
            SyncLevel::Collections => "collections",
            SyncLevel::Tasks => "tasks",
        }
    }

    pub fn resource_type(self) -> ResourceType {
        match self {
            SyncLevel::Projects => ResourceType::Project,
            SyncLevel::Collections => ResourceType::Collection,
            SyncLevel::Tasks => ResourceType::Task,
        }
    }
}

/// Result of an on-demand level sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelSyncOutcome {
    pub count: usize,
    pub cached: bool,
}

/// Drives provider adapters and writes the resource mirror
#[derive(Clone)]
pub struct SmartSyncService {
    resources: SyncedResourceRepository,
    integrations: IntegrationRepository,
    registry: Arc<Registry>,
    cache: Arc<LevelCache>,
}

impl SmartSyncService {
    pub fn new(
        db: DatabaseConnection,
        crypto_key: CryptoKey,
        registry: Arc<Registry>,
        cache: Arc<LevelCache>,
    ) -> Self {
        Self {
            resources: SyncedResourceRepository::new(db.clone()),
            integrations: IntegrationRepository::new(db, crypto_key),
            registry,
            cache,
        }
    }

    /// Resolve an active integration within the organization
    pub async fn integration(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
    ) -> Result<integration::Model, SyncError> {
        self.integrations
            .get_by_id(organization_id, integration_id)
            .await?
            .ok_or(SyncError::IntegrationNotFound { id: integration_id })
    }

    /// Walk the provider hierarchy and upsert what it returns.
    ///
    /// Levels run strictly in order; each level picks its parents from what is
    /// already stored, so a smart pass after a full pass still samples only
    /// the first branches.
    #[instrument(skip(self, integration), fields(integration_id = %integration.id, provider = %integration.provider, mode = mode.as_str()))]
    pub async fn sync_integration(
        &self,
        integration: &integration::Model,
        mode: SyncMode,
    ) -> Result<SyncStats, SyncError> {
        let provider = self.registry.get_enabled(&integration.provider)?;
        let token = self.integrations.access_token(integration)?;
        let hierarchy = provider.hierarchy();
        let org = integration.organization_id;
        let mut stats = SyncStats::default();

        info!("starting resource sync");

        if hierarchy.supports.containers {
            let containers = provider.fetch_workspaces(&token).await?;
            stats.containers = self
                .write_level(integration, ResourceType::Container, None, containers, None)
                .await?;
        }

        if hierarchy.supports.projects {
            let parents = self
                .resources
                .list_by_type(org, integration.id, ResourceType::Container, mode.breadth(SMART_CONTAINER_LIMIT))
                .await?;
            for container in &parents {
                let projects = provider.fetch_projects(&token, &container.external_id).await?;
                stats.projects += self
                    .write_level(integration, ResourceType::Project, Some(container), projects, None)
                    .await?;
            }
        }

        if hierarchy.supports.collections {
            let parents = self
                .resources
                .list_by_type(org, integration.id, ResourceType::Project, mode.breadth(SMART_PROJECT_LIMIT))
                .await?;
            for project in &parents {
                let collections = provider
                    .fetch_collections(&token, &project.external_id)
                    .await?;
                stats.collections += self
                    .write_level(integration, ResourceType::Collection, Some(project), collections, None)
                    .await?;
            }
        }

        let task_cap = match mode {
            SyncMode::Smart => Some(SMART_TASKS_PER_COLLECTION),
            SyncMode::Full => None,
        };
        let parents = self
            .resources
            .list_by_type(org, integration.id, ResourceType::Collection, mode.breadth(SMART_COLLECTION_LIMIT))
            .await?;
        for collection in &parents {
            let tasks = provider.fetch_tasks(&token, &collection.external_id).await?;
            stats.tasks += self
                .write_level(integration, ResourceType::Task, Some(collection), tasks, task_cap)
                .await?;
        }

        self.integrations
            .touch_last_synced(integration.id, Utc::now())
            .await?;
        if mode == SyncMode::Full {
            self.cache.invalidate_integration(integration.id);
        }
        counter!("resources_synced_total", "provider" => integration.provider.clone())
            .increment(stats.total() as u64);

        info!(
            containers = stats.containers,
            projects = stats.projects,
            collections = stats.collections,
            tasks = stats.tasks,
            "resource sync complete"
        );
        Ok(stats)
    }

    /// Refresh the children of one stored node.
    ///
    /// Results are remembered for the cache TTL; a hit returns the cached
    /// count without calling the provider. `level` must sit directly below
    /// the parent's level.
    #[instrument(skip(self, integration), fields(integration_id = %integration.id, level = level.as_str()))]
    pub async fn sync_level(
        &self,
        integration: &integration::Model,
        parent_resource_id: Uuid,
        level: SyncLevel,
    ) -> Result<LevelSyncOutcome, SyncError> {
        let key = LevelCache::key(integration.id, parent_resource_id, level.as_str());
        if let Some(count) = self.cache.get(&key) {
            debug!(%key, "level sync served from cache");
            return Ok(LevelSyncOutcome {
                count,
                cached: true,
            });
        }

        let parent = self
            .resources
            .find(integration.organization_id, parent_resource_id)
            .await?
            .filter(|p| p.integration_id == integration.id)
            .ok_or(SyncError::ParentNotFound {
                id: parent_resource_id,
            })?;
        let resource_type = level.resource_type();
        if resource_type.level() != parent.level + 1 {
            return Err(SyncError::InvalidLevel {
                level: level.as_str(),
                parent_type: parent.resource_type,
            });
        }

        let provider = self.registry.get_enabled(&integration.provider)?;
        let token = self.integrations.access_token(integration)?;
        let fetched = provider
            .fetch_level(&token, resource_type, Some(&parent.external_id))
            .await?;
        let count = self
            .write_level(integration, resource_type, Some(&parent), fetched, None)
            .await?;

        self.cache.put(key, count);
        Ok(LevelSyncOutcome {
            count,
            cached: false,
        })
    }

    pub async fn resource(
        &self,
        organization_id: Uuid,
        resource_id: Uuid,
    ) -> Result<synced_resource::Model, SyncError> {
        self.resources
            .find(organization_id, resource_id)
            .await?
            .ok_or(SyncError::ResourceNotFound { id: resource_id })
    }

    /// Root-to-node chain for a breadcrumb.
    ///
    /// The walk visits at most `max_depth + 1` nodes of the provider hierarchy;
    /// a revisited node or a longer chain is reported as corrupt data.
    pub async fn resource_path(
        &self,
        organization_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<synced_resource::Model>, SyncError> {
        let start = self
            .resources
            .find(organization_id, resource_id)
            .await?
            .ok_or(SyncError::ResourceNotFound { id: resource_id })?;

        let max_depth = self.max_depth_for(&start).await?;
        let bound = usize::from(max_depth) + 1;

        let mut visited = HashSet::from([start.id]);
        let mut chain = vec![start];

        while let Some(parent_id) = chain.last().and_then(|node| node.parent_id) {
            if !visited.insert(parent_id) {
                return Err(SyncError::DataIntegrity {
                    message: format!("cycle detected at resource {parent_id}"),
                });
            }
            if chain.len() >= bound {
                return Err(SyncError::DataIntegrity {
                    message: format!(
                        "resource {resource_id} is nested deeper than {max_depth} levels"
                    ),
                });
            }
            match self.resources.find(organization_id, parent_id).await? {
                Some(parent) => chain.push(parent),
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    pub async fn search(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
        query: &str,
        resource_type: Option<ResourceType>,
    ) -> Result<Vec<synced_resource::Model>, SyncError> {
        Ok(self
            .resources
            .search(organization_id, integration_id, query, resource_type)
            .await?)
    }

    pub async fn list_resources(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
        resource_type: ResourceType,
    ) -> Result<Vec<synced_resource::Model>, SyncError> {
        Ok(self
            .resources
            .list_by_type(organization_id, integration_id, resource_type, None)
            .await?)
    }

    pub async fn children(
        &self,
        organization_id: Uuid,
        parent_id: Uuid,
    ) -> Result<Vec<synced_resource::Model>, SyncError> {
        Ok(self.resources.children(organization_id, parent_id).await?)
    }

    async fn max_depth_for(&self, resource: &synced_resource::Model) -> Result<u8, SyncError> {
        let provider_name = self.integrations.provider_of(resource.integration_id).await?;
        Ok(provider_name
            .and_then(|name| self.registry.get(&name).ok())
            .map(|provider| provider.hierarchy().max_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH))
    }

    /// Upsert one level's worth of resources under `parent`
    async fn write_level(
        &self,
        integration: &integration::Model,
        resource_type: ResourceType,
        parent: Option<&synced_resource::Model>,
        fetched: Vec<ExternalResource>,
        per_parent_cap: Option<usize>,
    ) -> Result<usize, SyncError> {
        let cap = per_parent_cap
            .unwrap_or(MAX_RESOURCES_PER_LEVEL)
            .min(MAX_RESOURCES_PER_LEVEL);
        if fetched.len() > cap {
            debug!(
                resource_type = resource_type.as_str(),
                fetched = fetched.len(),
                cap,
                "truncating level"
            );
        }

        let now = Utc::now();
        let mut written = 0;
        for resource in fetched.into_iter().take(cap) {
            let path = resource_path_string(parent.map(|p| p.path.as_str()), &resource.id);
            let metadata = merge_metadata(&resource);
            self.resources
                .upsert(ResourceUpsert {
                    organization_id: integration.organization_id,
                    integration_id: integration.id,
                    resource_type,
                    provider_type: resource.provider_type,
                    external_id: resource.id,
                    parent_id: parent.map(|p| p.id),
                    path,
                    name: resource.name,
                    metadata,
                    synced_at: now,
                })
                .await?;
            written += 1;
        }
        Ok(written)
    }
}

/// `/a/b/c` style path: parent path plus this node's external id
pub fn resource_path_string(parent_path: Option<&str>, external_id: &str) -> String {
    format!("{}/{}", parent_path.unwrap_or(""), external_id)
}

fn merge_metadata(resource: &ExternalResource) -> Option<serde_json::Value> {
    let mut map = match &resource.metadata {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Some(status) = &resource.status {
        map.insert("status".into(), serde_json::Value::String(status.clone()));
    }
    if let Some(color) = &resource.color {
        map.insert("color".into(), serde_json::Value::String(color.clone()));
    }
    if map.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(map))
    }
}
