//! # Jobs API Handlers
//!
//! Inspection of jobs that exhausted their attempts.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::jobs::{CLICKUP_SYNC_QUEUE, RESOURCE_SYNC_QUEUE, SCREENSHOTS_QUEUE};
use crate::models::job::JobInfo;
use crate::repositories::JobRepository;
use crate::server::AppState;

/// Query parameters for listing failed jobs
#[derive(Debug, Deserialize, IntoParams)]
pub struct FailedJobsQuery {
    /// Restrict to one queue (`screenshots`, `clickup-sync`, `resource-sync`)
    pub queue: Option<String>,
    /// Maximum number of jobs to return (default: 50, max: 200)
    pub limit: Option<u64>,
}

/// Response payload for the failed jobs endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailedJobsResponse {
    pub jobs: Vec<JobInfo>,
}

/// Failed jobs, newest first
#[utoipa::path(
    get,
    path = "/api/jobs/failed",
    security(("bearer_auth" = [])),
    params(FailedJobsQuery),
    responses(
        (status = 200, description = "Failed jobs", body = FailedJobsResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Caller is not an administrator", body = ApiError)
    ),
    tag = "jobs"
)]
pub async fn list_failed_jobs(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<FailedJobsQuery>,
) -> Result<Json<FailedJobsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "limit must be between 1 and 200",
        ));
    }
    if let Some(queue) = query.queue.as_deref()
        && ![SCREENSHOTS_QUEUE, CLICKUP_SYNC_QUEUE, RESOURCE_SYNC_QUEUE].contains(&queue)
    {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            &format!("unknown queue '{queue}'"),
        ));
    }

    let jobs = JobRepository::new(state.db.clone())
        .list_failed(query.queue.as_deref(), limit)
        .await?;
    Ok(Json(FailedJobsResponse {
        jobs: jobs.into_iter().map(JobInfo::from).collect(),
    }))
}
