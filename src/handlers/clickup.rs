//! # ClickUp Handlers
//!
//! Workspace-level project refresh for organizations connected to ClickUp.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{ApiError, not_found};
use crate::jobs::{self, ClickUpSyncJob, QueuePolicy};
use crate::repositories::{ClickUpRepository, JobRepository};
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClickUpSyncResponse {
    pub success: bool,
    pub message: String,
    pub job_id: Uuid,
}

/// Queue a project refresh of the organization's ClickUp workspace
#[utoipa::path(
    post,
    path = "/api/clickup/sync",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sync queued", body = ClickUpSyncResponse),
        (status = 403, description = "Caller is not an administrator", body = ApiError),
        (status = 404, description = "ClickUp not connected", body = ApiError)
    ),
    tag = "clickup"
)]
pub async fn start_sync(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> Result<Json<ClickUpSyncResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    let workspace = ClickUpRepository::new(state.db.clone(), state.crypto_key.clone())
        .list_workspaces(organization_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found("ClickUp not connected"))?;

    let job = jobs::enqueue(
        &JobRepository::new(state.db.clone()),
        &QueuePolicy::clickup_sync(),
        &ClickUpSyncJob {
            workspace_id: workspace.id,
            organization_id,
        },
    )
    .await?;
    info!(%organization_id, workspace_id = %workspace.workspace_id, job_id = %job.id, "ClickUp sync queued");

    Ok(Json(ClickUpSyncResponse {
        success: true,
        message: "Sync started".to_string(),
        job_id: job.id,
    }))
}
