//! # Screenshot Handlers
//!
//! Owner-initiated deletion within the organization's grace period, and the
//! blur toggle.

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, forbidden, not_found};
use crate::models::organization::{BlurMode, OrganizationSettings};
use crate::repositories::{ActivityRepository, OrganizationRepository};
use crate::server::AppState;
use crate::storage::Bucket;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScreenshotActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlurToggleRequest {
    pub is_blurred: bool,
}

/// Whether a screenshot taken at `taken_at` may still be deleted at `now`
pub fn within_grace_period(
    settings: &OrganizationSettings,
    taken_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    now - taken_at <= Duration::minutes(settings.delete_grace_period)
}

/// Whether `user` may change the blur flag under `settings`
pub fn may_toggle_blur(settings: &OrganizationSettings, user_can_blur: bool, is_admin: bool) -> bool {
    is_admin || (settings.blur_mode == BlurMode::Optional && user_can_blur)
}

/// Delete one of the caller's screenshots
#[utoipa::path(
    delete,
    path = "/api/screenshots/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Screenshot id")),
    responses(
        (status = 200, description = "Screenshot deleted", body = ScreenshotActionResponse),
        (status = 403, description = "Deletion disabled or grace period expired", body = ApiError),
        (status = 404, description = "Screenshot not found", body = ApiError)
    ),
    tag = "screenshots"
)]
pub async fn delete_screenshot(
    State(state): State<AppState>,
    user: AuthUser,
    Path(screenshot_id): Path<Uuid>,
) -> Result<Json<ScreenshotActionResponse>, ApiError> {
    let activity = ActivityRepository::new(state.db.clone());
    let shot = activity
        .find_owned_screenshot(user.user_id, screenshot_id)
        .await?
        .ok_or_else(|| not_found("Screenshot not found"))?;

    let settings = OrganizationRepository::new(state.db.clone())
        .settings(user.organization_id)
        .await?;
    if !settings.allow_screenshot_delete {
        return Err(forbidden(Some("Screenshot deletion not allowed")));
    }
    if !within_grace_period(&settings, shot.timestamp.with_timezone(&Utc), Utc::now()) {
        return Err(forbidden(Some("Grace period expired")));
    }

    if let Err(e) = state.storage.delete(Bucket::Original, &shot.key_original).await {
        warn!(screenshot_id = %shot.id, error = %e, "Failed to delete original object");
    }
    if let Some(key) = shot.key_blurred.as_deref()
        && let Err(e) = state.storage.delete(Bucket::Blurred, key).await
    {
        warn!(screenshot_id = %shot.id, error = %e, "Failed to delete blurred object");
    }

    activity.mark_deleted(shot.id).await?;
    info!(screenshot_id = %shot.id, user_id = %user.user_id, "Screenshot deleted");

    Ok(Json(ScreenshotActionResponse {
        success: true,
        message: "Screenshot deleted".to_string(),
    }))
}

/// Change the blur flag of one of the caller's screenshots
#[utoipa::path(
    patch,
    path = "/api/screenshots/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Screenshot id")),
    request_body = BlurToggleRequest,
    responses(
        (status = 200, description = "Blur flag updated", body = ScreenshotActionResponse),
        (status = 403, description = "Blur policy does not allow the change", body = ApiError),
        (status = 404, description = "Screenshot not found", body = ApiError)
    ),
    tag = "screenshots"
)]
pub async fn toggle_blur(
    State(state): State<AppState>,
    user: AuthUser,
    Path(screenshot_id): Path<Uuid>,
    Json(request): Json<BlurToggleRequest>,
) -> Result<Json<ScreenshotActionResponse>, ApiError> {
    let activity = ActivityRepository::new(state.db.clone());
    let shot = activity
        .find_owned_screenshot(user.user_id, screenshot_id)
        .await?
        .ok_or_else(|| not_found("Screenshot not found"))?;

    let organizations = OrganizationRepository::new(state.db.clone());
    let can_blur = organizations
        .find_user(user.user_id)
        .await?
        .is_some_and(|account| account.can_blur_screenshots);
    let settings = organizations.settings(user.organization_id).await?;
    if !may_toggle_blur(&settings, can_blur, user.is_admin()) {
        return Err(forbidden(Some(
            "Blur settings cannot be changed under the organization's policy",
        )));
    }

    activity.set_blurred(shot.id, request.is_blurred).await?;
    Ok(Json(ScreenshotActionResponse {
        success: true,
        message: if request.is_blurred {
            "Screenshot blurred".to_string()
        } else {
            "Screenshot unblurred".to_string()
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_period_is_inclusive() {
        let settings = OrganizationSettings::default();
        let now = Utc::now();
        assert!(within_grace_period(&settings, now - Duration::minutes(5), now));
        assert!(!within_grace_period(
            &settings,
            now - Duration::minutes(5) - Duration::seconds(1),
            now
        ));
    }

    #[test]
    fn blur_toggle_rules() {
        let mut settings = OrganizationSettings::default();
        settings.blur_mode = BlurMode::Optional;
        assert!(may_toggle_blur(&settings, true, false));
        assert!(!may_toggle_blur(&settings, false, false));

        settings.blur_mode = BlurMode::Always;
        assert!(!may_toggle_blur(&settings, true, false));
        assert!(may_toggle_blur(&settings, false, true));
    }
}
