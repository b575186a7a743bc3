//! Resource sync job, queued after an integration is connected

use async_trait::async_trait;
use tracing::info;

use super::{JobFailure, JobHandler, QueuePolicy, ResourceSyncJob};
use crate::models::job;
use crate::sync::{SmartSyncService, SyncMode};

pub struct ResourceSyncHandler {
    sync: SmartSyncService,
}

impl ResourceSyncHandler {
    pub fn new(sync: SmartSyncService) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl JobHandler for ResourceSyncHandler {
    fn policy(&self) -> QueuePolicy {
        QueuePolicy::resource_sync()
    }

    async fn handle(&self, job: &job::Model) -> Result<(), JobFailure> {
        let payload: ResourceSyncJob = serde_json::from_value(job.payload.clone())?;
        let integration = self
            .sync
            .integration(payload.organization_id, payload.integration_id)
            .await?;

        let stats = self
            .sync
            .sync_integration(&integration, SyncMode::from_full_flag(payload.full))
            .await?;
        info!(
            integration_id = %integration.id,
            total = stats.total(),
            "Background resource sync finished"
        );
        Ok(())
    }
}
