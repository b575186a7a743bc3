//! ClickUp workspace project sync job
//!
//! Refreshes the legacy `clickup_projects` table: every list found in the
//! workspace's spaces is recorded once under its project id.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use super::{ClickUpSyncJob, JobFailure, JobHandler, QueuePolicy};
use crate::crypto::CryptoKey;
use crate::models::job;
use crate::providers::{CLICKUP_PROVIDER, Registry};
use crate::repositories::ClickUpRepository;

pub struct ClickUpSyncHandler {
    clickup: ClickUpRepository,
    registry: Arc<Registry>,
}

impl ClickUpSyncHandler {
    pub fn new(db: DatabaseConnection, crypto_key: CryptoKey, registry: Arc<Registry>) -> Self {
        Self {
            clickup: ClickUpRepository::new(db, crypto_key),
            registry,
        }
    }
}

#[async_trait]
impl JobHandler for ClickUpSyncHandler {
    fn policy(&self) -> QueuePolicy {
        QueuePolicy::clickup_sync()
    }

    async fn handle(&self, job: &job::Model) -> Result<(), JobFailure> {
        let payload: ClickUpSyncJob = serde_json::from_value(job.payload.clone())?;

        let workspace = self
            .clickup
            .find_workspace(payload.organization_id, payload.workspace_id)
            .await?
            .ok_or_else(|| JobFailure::permanent("Workspace not found"))?;

        let provider = self.registry.get(CLICKUP_PROVIDER)?;
        let token = self
            .clickup
            .workspace_token(&workspace)
            .map_err(|e| JobFailure::permanent(e.to_string()))?;

        let spaces = provider
            .fetch_projects(&token, &workspace.workspace_id)
            .await?;

        let mut inserted = 0usize;
        for space in &spaces {
            let lists = match provider.fetch_collections(&token, &space.id).await {
                Ok(lists) => lists,
                Err(e) => {
                    warn!(space_id = %space.id, error = %e, "Skipping space whose lists could not be fetched");
                    continue;
                }
            };
            for list in lists {
                if self
                    .clickup
                    .insert_project_if_absent(
                        workspace.id,
                        &list.id,
                        &list.name,
                        list.status.clone(),
                        list.color.clone(),
                    )
                    .await?
                {
                    inserted += 1;
                }
            }
        }

        self.clickup.touch_workspace_synced(workspace.id).await?;
        info!(
            workspace_id = %workspace.workspace_id,
            spaces = spaces.len(),
            inserted,
            "ClickUp workspace synced"
        );
        Ok(())
    }
}
