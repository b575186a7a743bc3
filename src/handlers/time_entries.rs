//! # Time Entry Link Handlers
//!
//! Links a recorded time entry to a provider task and pushes it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::integrations::ensure_integration;
use crate::auth::AuthUser;
use crate::error::{ApiError, not_found};
use crate::models::time_entry_mapping::TimeEntryLinkInfo;
use crate::repositories::ActivityRepository;
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub integration_id: Uuid,
    /// Task id in the provider
    pub external_task_id: String,
}

/// Link one of the caller's time entries to a provider task
#[utoipa::path(
    post,
    path = "/api/time-entries/{id}/links",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Time entry id")),
    request_body = LinkRequest,
    responses(
        (status = 200, description = "Link created or updated; starts as pending", body = TimeEntryLinkInfo),
        (status = 400, description = "Missing task id", body = ApiError),
        (status = 404, description = "Time entry or integration not found", body = ApiError)
    ),
    tag = "time-entries"
)]
pub async fn link_time_entry(
    State(state): State<AppState>,
    user: AuthUser,
    Path(time_entry_id): Path<Uuid>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<TimeEntryLinkInfo>, ApiError> {
    let organization_id = user.require_organization()?;
    let task_id = request.external_task_id.trim();
    if task_id.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "externalTaskId must not be empty",
        ));
    }

    ActivityRepository::new(state.db.clone())
        .find_time_entry(user.user_id, time_entry_id)
        .await?
        .ok_or_else(|| not_found("Time entry not found"))?;
    ensure_integration(&state, organization_id, request.integration_id).await?;

    let mapping = state
        .integrations()
        .link_time_entry(time_entry_id, request.integration_id, task_id)
        .await?;
    Ok(Json(mapping.into()))
}

/// Push a linked time entry to its provider
#[utoipa::path(
    post,
    path = "/api/time-entry-links/{id}/sync",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Time entry link id")),
    responses(
        (status = 200, description = "Sync attempted; `syncStatus` is `synced` or `error`", body = TimeEntryLinkInfo),
        (status = 404, description = "Link not found", body = ApiError)
    ),
    tag = "time-entries"
)]
pub async fn sync_time_entry_link(
    State(state): State<AppState>,
    user: AuthUser,
    Path(mapping_id): Path<Uuid>,
) -> Result<Json<TimeEntryLinkInfo>, ApiError> {
    let organization_id = user.require_organization()?;
    let integrations = state.integrations();

    let mapping = integrations
        .find_mapping(mapping_id)
        .await?
        .ok_or_else(|| not_found("Time entry link not found"))?;
    ActivityRepository::new(state.db.clone())
        .find_time_entry(user.user_id, mapping.time_entry_id)
        .await?
        .ok_or_else(|| not_found("Time entry link not found"))?;
    ensure_integration(&state, organization_id, mapping.integration_id).await?;

    let synced = integrations
        .sync_time_entry(&state.registry, mapping_id)
        .await?;
    info!(%mapping_id, status = %synced.sync_status, "Time entry sync attempted");
    Ok(Json(synced.into()))
}
