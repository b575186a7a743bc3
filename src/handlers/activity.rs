//! # Activity Handler
//!
//! Ingests activity reports from the desktop client: one time entry plus any
//! captured screenshots, which are queued for processing and upload.

use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, not_found, validation_error};
use crate::jobs::{self, QueuePolicy, ScreenshotJob};
use crate::repositories::{
    ActivityRepository, JobRepository, NewScreenshot, NewTimeEntry, OrganizationRepository,
};
use crate::server::AppState;
use crate::storage;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapturedScreenshot {
    pub timestamp: DateTime<Utc>,
    /// JPEG/PNG/WebP bytes, base64 encoded; a `data:` URL prefix is accepted
    pub image_base64: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activity_percentage: f64,
    #[serde(default)]
    pub mouse_clicks: i32,
    #[serde(default)]
    pub keyboard_strokes: i32,
    pub window_title: Option<String>,
    pub application_name: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<CapturedScreenshot>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub success: bool,
    pub time_entry_id: Uuid,
    pub screenshot_ids: Vec<Uuid>,
    pub message: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Record an activity interval and queue its screenshots
#[utoipa::path(
    post,
    path = "/api/activity",
    security(("bearer_auth" = [])),
    request_body = ActivityRequest,
    responses(
        (status = 200, description = "Activity recorded", body = ActivityResponse),
        (status = 400, description = "Missing required fields", body = ApiError),
        (status = 401, description = "Missing or invalid session", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "activity"
)]
pub async fn record_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let window_title = non_empty(request.window_title);
    let application_name = non_empty(request.application_name);
    let (Some(start_time), Some(window_title), Some(application_name)) =
        (request.start_time, window_title, application_name)
    else {
        return Err(validation_error(
            "Missing required fields",
            serde_json::json!({
                "required": ["startTime", "windowTitle", "applicationName"]
            }),
        ));
    };

    let organizations = OrganizationRepository::new(state.db.clone());
    let account = organizations
        .find_user(user.user_id)
        .await?
        .ok_or_else(|| not_found("User not found"))?;
    let settings = organizations.settings(account.organization_id).await?;
    let should_blur = settings.blur_mode.should_blur(account.can_blur_screenshots);

    let activity = ActivityRepository::new(state.db.clone());
    let entry = activity
        .create_time_entry(NewTimeEntry {
            user_id: account.id,
            start_time,
            end_time: request.end_time,
            activity_percentage: request.activity_percentage.clamp(0.0, 100.0),
            mouse_clicks: request.mouse_clicks.max(0),
            keyboard_strokes: request.keyboard_strokes.max(0),
        })
        .await?;

    let job_repo = JobRepository::new(state.db.clone());
    let policy = QueuePolicy::screenshots();
    let mut screenshot_ids = Vec::with_capacity(request.screenshots.len());
    for capture in request.screenshots {
        let shot = activity
            .create_screenshot(NewScreenshot {
                time_entry_id: entry.id,
                user_id: account.id,
                timestamp: capture.timestamp,
                key_original: storage::screenshot_key(account.id, capture.timestamp),
                is_blurred: should_blur,
                window_title: Some(window_title.clone()),
                application_name: Some(application_name.clone()),
                metadata: None,
            })
            .await?;

        jobs::enqueue(
            &job_repo,
            &policy,
            &ScreenshotJob {
                screenshot_id: shot.id,
                user_id: account.id,
                image_base64: capture.image_base64,
                should_blur,
            },
        )
        .await?;
        screenshot_ids.push(shot.id);
    }

    if let Err(e) = organizations.touch_last_seen(account.id).await {
        warn!(user_id = %account.id, error = %e, "Failed to update last seen");
    }

    info!(
        user_id = %account.id,
        time_entry_id = %entry.id,
        screenshots = screenshot_ids.len(),
        blurred = should_blur,
        "Activity recorded"
    );

    Ok(Json(ActivityResponse {
        success: true,
        time_entry_id: entry.id,
        message: format!(
            "Activity recorded; {} screenshot(s) queued for upload",
            screenshot_ids.len()
        ),
        screenshot_ids,
    }))
}
