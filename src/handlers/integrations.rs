//! # Integration Handlers
//!
//! OAuth connect/callback, disconnect, listing, and per-user defaults for
//! provider integrations. Browser-facing endpoints answer with redirects to
//! the settings page and report failures in its query string.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, not_found};
use crate::jobs::{self, QueuePolicy, ResourceSyncJob};
use crate::models::integration::IntegrationInfo;
use crate::models::user_integration_preference::UserDefaults;
use crate::providers::{CLICKUP_PROVIDER, ExternalResource, TimeTrackingProvider};
use crate::repositories::{
    ClickUpRepository, ConnectParams, JobRepository, OAuthStateRepository, StateLookup,
    generate_state,
};
use crate::server::AppState;
use crate::usage::UsageService;

/// Settings page the OAuth flow returns to
pub const SETTINGS_PATH: &str = "/settings/integrations";

/// Redirect to the settings page with the given query string
fn settings_redirect(query: &str) -> Response {
    found(&format!("{SETTINGS_PATH}?{query}"))
}

fn settings_error(reason: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(reason.as_bytes()).collect();
    settings_redirect(&format!("error={encoded}"))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Callback URL registered with the provider
pub fn redirect_uri(app_url: &str, provider: &str) -> String {
    format!(
        "{}/api/integrations/{}/callback",
        app_url.trim_end_matches('/'),
        provider
    )
}

/// Start the OAuth flow for a provider
#[utoipa::path(
    get,
    path = "/api/integrations/{provider}/connect",
    security(("bearer_auth" = [])),
    params(("provider" = String, Path, description = "Provider identifier, e.g. 'clickup'")),
    responses(
        (status = 302, description = "Redirect to the provider's authorize page, or back to settings with `error=invalid_provider`"),
        (status = 401, description = "Missing or invalid session", body = ApiError),
        (status = 403, description = "Caller is not an administrator", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn connect(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let Ok(adapter) = state.registry.get_enabled(&provider) else {
        return Ok(settings_error("invalid_provider"));
    };

    let oauth_state = generate_state();
    OAuthStateRepository::new(state.db.clone())
        .create(
            &oauth_state,
            &provider,
            user.organization_id,
            Some(user.user_id),
        )
        .await?;

    let authorize_url = adapter.auth_url(&oauth_state, &redirect_uri(&state.config.app_url, &provider))?;
    info!(%provider, user_id = %user.user_id, "Starting OAuth flow");
    Ok(found(authorize_url.as_str()))
}

/// Query parameters sent back by the provider
#[derive(Debug, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Complete the OAuth flow
#[utoipa::path(
    get,
    path = "/api/integrations/{provider}/callback",
    params(("provider" = String, Path, description = "Provider identifier"), CallbackQuery),
    responses(
        (status = 302, description = "Redirect to settings with `success=true` or `error=<reason>`")
    ),
    tag = "integrations"
)]
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(reason) = query.error.as_deref() {
        warn!(%provider, error = %reason, "Provider returned OAuth error");
        return settings_error(reason);
    }

    let (Some(code), Some(oauth_state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return settings_error("invalid_callback");
    };

    let stored = match OAuthStateRepository::new(state.db.clone())
        .consume(oauth_state)
        .await
    {
        Ok(StateLookup::Valid(stored)) => stored,
        Ok(StateLookup::Expired | StateLookup::Unknown) => return settings_error("invalid_state"),
        Err(e) => {
            error!(error = %e, "Failed to load OAuth state");
            return settings_error("connection_failed");
        }
    };

    if stored.provider != provider {
        return settings_error("invalid_provider");
    }
    let Some(organization_id) = stored.organization_id else {
        return settings_error("no_organization");
    };
    let Ok(adapter) = state.registry.get_enabled(&provider) else {
        return settings_error("invalid_provider");
    };

    match complete_connection(&state, adapter.as_ref(), organization_id, code).await {
        Ok(integration_id) => {
            info!(%provider, %organization_id, %integration_id, "Integration connected");
            settings_redirect("success=true")
        }
        Err(reason) => {
            error!(%provider, %organization_id, error = %reason, "Failed to connect integration");
            settings_error(&reason)
        }
    }
}

/// Exchange the code, record the integration and queue its first sync
async fn complete_connection(
    state: &AppState,
    adapter: &dyn TimeTrackingProvider,
    organization_id: Uuid,
    code: &str,
) -> Result<Uuid, String> {
    let provider = adapter.id();
    let tokens = adapter
        .exchange_code(code, &redirect_uri(&state.config.app_url, provider))
        .await
        .map_err(|e| e.to_string())?;
    let provider_user = adapter
        .current_user(&tokens.access_token)
        .await
        .map_err(|e| e.to_string())?;

    let workspaces: Vec<ExternalResource> = match adapter.fetch_workspaces(&tokens.access_token).await {
        Ok(workspaces) => workspaces,
        Err(e) => {
            warn!(provider, error = %e, "Could not fetch workspaces during connect");
            Vec::new()
        }
    };

    let mut metadata = serde_json::json!({
        "providerUser": {
            "id": provider_user.id,
            "name": provider_user.name,
            "email": provider_user.email,
        },
        "connectedAt": chrono::Utc::now().to_rfc3339(),
    });
    if let Some(first) = workspaces.first() {
        metadata["workspaces"] = serde_json::to_value(&workspaces).unwrap_or_default();
        metadata["defaultWorkspace"] = serde_json::to_value(first).unwrap_or_default();
    }

    let access_token = tokens.access_token.clone();
    let integration = state
        .integrations()
        .connect(ConnectParams {
            organization_id,
            provider: provider.to_string(),
            tokens,
            provider_account_id: workspaces.first().map(|w| w.id.clone()),
            metadata: Some(metadata),
            user_id: None,
        })
        .await
        .map_err(|e| e.to_string())?;

    if provider == CLICKUP_PROVIDER {
        let clickup = ClickUpRepository::new(state.db.clone(), state.crypto_key.clone());
        for workspace in &workspaces {
            if let Err(e) = clickup
                .upsert_workspace(organization_id, &workspace.id, &workspace.name, &access_token)
                .await
            {
                warn!(workspace_id = %workspace.id, error = %e, "Failed to record ClickUp workspace");
            }
        }
    }

    jobs::enqueue(
        &JobRepository::new(state.db.clone()),
        &QueuePolicy::resource_sync(),
        &ResourceSyncJob {
            integration_id: integration.id,
            organization_id,
            full: false,
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    Ok(integration.id)
}

/// Disconnect the organization's integration with a provider
#[utoipa::path(
    post,
    path = "/api/integrations/{provider}/disconnect",
    security(("bearer_auth" = [])),
    params(("provider" = String, Path, description = "Provider identifier")),
    responses(
        (status = 302, description = "Redirect to settings with `disconnected=true` or `error=not_found`"),
        (status = 401, description = "Missing or invalid session", body = ApiError),
        (status = 403, description = "Caller is not an administrator", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn disconnect(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(provider): Path<String>,
) -> Result<Response, ApiError> {
    let organization_id = user.require_organization()?;
    let integrations = state.integrations();

    let Some(integration) = integrations.get(organization_id, &provider, None).await? else {
        return Ok(settings_error("not_found"));
    };
    if !integrations.disconnect(organization_id, integration.id).await? {
        return Ok(settings_error("not_found"));
    }
    state.level_cache.invalidate_integration(integration.id);
    info!(integration_id = %integration.id, provider = %provider, "Integration disconnected");
    Ok(settings_redirect("disconnected=true"))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IntegrationsResponse {
    pub integrations: Vec<IntegrationInfo>,
}

/// Active integrations of the caller's organization
#[utoipa::path(
    get,
    path = "/api/integrations",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active integrations", body = IntegrationsResponse),
        (status = 401, description = "Missing or invalid session", body = ApiError),
        (status = 403, description = "User has no organization", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn list_integrations(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<IntegrationsResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    let rows = state
        .integrations()
        .list_for_organization(organization_id)
        .await?;
    Ok(Json(IntegrationsResponse {
        integrations: rows.into_iter().map(IntegrationInfo::from).collect(),
    }))
}

/// The caller's default selections for an integration
#[utoipa::path(
    get,
    path = "/api/integrations/{id}/defaults",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Integration id")),
    responses(
        (status = 200, description = "Saved defaults (all null when none)", body = UserDefaults),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn get_defaults(
    State(state): State<AppState>,
    user: AuthUser,
    Path(integration_id): Path<Uuid>,
) -> Result<Json<UserDefaults>, ApiError> {
    let organization_id = user.require_organization()?;
    ensure_integration(&state, organization_id, integration_id).await?;
    let defaults = UsageService::new(state.db.clone())
        .user_defaults(user.user_id, integration_id)
        .await?;
    Ok(Json(defaults.unwrap_or_default()))
}

/// Save the caller's default selections for an integration
#[utoipa::path(
    put,
    path = "/api/integrations/{id}/defaults",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Integration id")),
    request_body = UserDefaults,
    responses(
        (status = 200, description = "Defaults saved", body = UserDefaults),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn put_defaults(
    State(state): State<AppState>,
    user: AuthUser,
    Path(integration_id): Path<Uuid>,
    Json(defaults): Json<UserDefaults>,
) -> Result<Json<UserDefaults>, ApiError> {
    let organization_id = user.require_organization()?;
    ensure_integration(&state, organization_id, integration_id).await?;
    UsageService::new(state.db.clone())
        .save_user_defaults(user.user_id, integration_id, &defaults)
        .await?;
    Ok(Json(defaults))
}

pub(crate) async fn ensure_integration(
    state: &AppState,
    organization_id: Uuid,
    integration_id: Uuid,
) -> Result<crate::models::integration::Model, ApiError> {
    state
        .integrations()
        .get_by_id(organization_id, integration_id)
        .await?
        .ok_or_else(|| not_found("Integration not found"))
}
