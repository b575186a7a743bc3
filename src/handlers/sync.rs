//! # Manual Sync Handler
//!
//! Lets an administrator trigger a resource sync for one provider. Errors
//! here use a flat `{error, details}` body consumed by the settings page.

use axum::{
    extract::{Form, Path, Query, State, rejection::FormRejection},
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::providers::IntegrationError;
use crate::server::AppState;
use crate::sync::{SyncError, SyncMode, SyncStats};

/// Error body of the sync endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn sync_error(status: StatusCode, error: &str, details: Option<String>) -> Response {
    (
        status,
        Json(SyncErrorBody {
            error: error.to_string(),
            details,
        }),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct SyncParams {
    /// Walk every branch instead of the smart sample
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub full: Option<bool>,
}

/// Accepts `true`/`false` as well as the `on` a checkbox submits
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|v| matches!(v.as_str(), "true" | "1" | "on")))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub stats: SyncStats,
    pub message: String,
    pub sync_type: String,
}

/// Trigger a resource sync for a provider
#[utoipa::path(
    post,
    path = "/api/integrations/{provider}/sync",
    security(("bearer_auth" = [])),
    params(("provider" = String, Path, description = "Provider identifier"), SyncParams),
    responses(
        (status = 200, description = "Sync finished", body = SyncResponse),
        (status = 401, description = "Not signed in", body = SyncErrorBody),
        (status = 403, description = "No organization or not an administrator", body = SyncErrorBody),
        (status = 404, description = "Integration not connected", body = SyncErrorBody),
        (status = 429, description = "Provider rate limit hit", body = SyncErrorBody),
        (status = 500, description = "Sync failed", body = SyncErrorBody)
    ),
    tag = "integrations"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    user: Result<AuthUser, ApiError>,
    Path(provider): Path<String>,
    Query(query): Query<SyncParams>,
    form: Result<Form<SyncParams>, FormRejection>,
) -> Response {
    let Ok(user) = user else {
        return sync_error(StatusCode::UNAUTHORIZED, "Unauthorized", None);
    };
    let Some(organization_id) = user.organization_id else {
        return sync_error(StatusCode::FORBIDDEN, "No organization found", None);
    };
    if !user.is_admin() {
        return sync_error(
            StatusCode::FORBIDDEN,
            "Only administrators can trigger sync",
            None,
        );
    }

    let integration = match state
        .integrations()
        .get(organization_id, &provider, None)
        .await
    {
        Ok(Some(integration)) => integration,
        Ok(None) => {
            return sync_error(
                StatusCode::NOT_FOUND,
                &format!("{provider} integration not found or not active"),
                None,
            );
        }
        Err(e) => {
            error!(%provider, error = %e, "Failed to load integration for sync");
            return sync_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sync failed",
                Some(e.to_string()),
            );
        }
    };

    let full = form
        .ok()
        .and_then(|Form(params)| params.full)
        .or(query.full)
        .unwrap_or(false);
    let mode = SyncMode::from_full_flag(full);

    match state.sync_service().sync_integration(&integration, mode).await {
        Ok(stats) => {
            info!(%provider, %organization_id, total = stats.total(), "Manual sync finished");
            Json(SyncResponse {
                success: true,
                message: format!(
                    "Successfully synced {} resources from {}",
                    stats.total(),
                    provider
                ),
                stats,
                sync_type: mode.as_str().to_string(),
            })
            .into_response()
        }
        Err(SyncError::Provider(IntegrationError::RateLimit { retry_after, .. })) => {
            let mut response = sync_error(
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded",
                Some(format!("{provider} rate limit exceeded; try again later")),
            );
            if let Some(seconds) = retry_after
                && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
            {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
        Err(e) => {
            error!(%provider, %organization_id, error = %e, "Manual sync failed");
            sync_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sync failed",
                Some(e.to_string()),
            )
        }
    }
}

/// GET is not a way to start a sync
#[utoipa::path(
    get,
    path = "/api/integrations/{provider}/sync",
    params(("provider" = String, Path, description = "Provider identifier")),
    responses((status = 405, description = "Use POST", body = SyncErrorBody)),
    tag = "integrations"
)]
pub async fn sync_method_not_allowed(Path(_provider): Path<String>) -> Response {
    sync_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed. Use POST to trigger sync.",
        None,
    )
}
