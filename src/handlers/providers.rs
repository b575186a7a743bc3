//! # Providers API Handlers
//!
//! This module contains handlers for the providers endpoints.

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::providers::ProviderMetadata;
use crate::server::AppState;

/// Query parameters for providers listing
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListProvidersQuery {
    /// Only return providers that can be connected right now
    pub enabled: Option<bool>,
}

/// Response containing the list of available providers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersResponse {
    /// Known providers, enabled ones first
    pub providers: Vec<ProviderMetadata>,
}

/// Public endpoint to list all known providers
#[utoipa::path(
    get,
    path = "/api/providers",
    params(ListProvidersQuery),
    responses(
        (status = 200, description = "List of known providers", body = ProvidersResponse, example = json!({
            "providers": [
                {
                    "name": "clickup",
                    "displayName": "ClickUp",
                    "description": "Sync time entries with ClickUp tasks",
                    "icon": "clickup",
                    "color": "#7B68EE",
                    "features": {"timeTracking": true, "tasks": true, "projects": true, "workspaces": true},
                    "requiredEnvVars": ["TIMETRACK_CLICKUP_CLIENT_ID", "TIMETRACK_CLICKUP_CLIENT_SECRET"],
                    "isEnabled": true
                }
            ]
        })),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "providers"
)]
pub async fn list_providers(
    State(state): State<AppState>,
    Query(query): Query<ListProvidersQuery>,
) -> Result<Json<ProvidersResponse>, ApiError> {
    let mut providers = state.registry.list_metadata();
    if let Some(enabled) = query.enabled {
        providers.retain(|p| p.is_enabled == enabled);
    }
    providers.sort_by(|a, b| b.is_enabled.cmp(&a.is_enabled).then_with(|| a.name.cmp(&b.name)));
    Ok(Json(ProvidersResponse { providers }))
}
