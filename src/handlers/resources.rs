//! # Resource Handlers
//!
//! Browsing the synced resource mirror: listing, search, breadcrumbs,
//! on-demand level refresh, usage tracking, recents and favorites.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::integrations::ensure_integration;
use crate::auth::AuthUser;
use crate::error::{ApiError, not_found};
use crate::models::synced_resource::{ResourceInfo, ResourceType};
use crate::server::AppState;
use crate::sync::{LevelSyncOutcome, SyncLevel};
use crate::usage::RecentResourceView;

const MAX_RECENT_LIMIT: u64 = 50;

fn parse_type(raw: Option<&str>) -> Result<Option<ResourceType>, ApiError> {
    raw.map(|value| {
        value.parse::<ResourceType>().map_err(|message| {
            ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
        })
    })
    .transpose()
}

fn to_infos(rows: Vec<crate::models::synced_resource::Model>) -> Vec<ResourceInfo> {
    rows.into_iter().map(ResourceInfo::from).collect()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourcesResponse {
    pub resources: Vec<ResourceInfo>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesQuery {
    /// `container`, `project`, `collection` or `task`
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    /// Only children of this resource
    pub parent_id: Option<Uuid>,
}

/// Resources of an integration, by type or by parent
#[utoipa::path(
    get,
    path = "/api/integrations/{id}/resources",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Integration id"), ListResourcesQuery),
    responses(
        (status = 200, description = "Matching resources", body = ResourcesResponse),
        (status = 400, description = "Invalid resource type", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn list_resources(
    State(state): State<AppState>,
    user: AuthUser,
    Path(integration_id): Path<Uuid>,
    Query(query): Query<ListResourcesQuery>,
) -> Result<Json<ResourcesResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    ensure_integration(&state, organization_id, integration_id).await?;
    let resource_type = parse_type(query.resource_type.as_deref())?;
    let sync = state.sync_service();

    let mut rows = match query.parent_id {
        Some(parent_id) => sync
            .children(organization_id, parent_id)
            .await?
            .into_iter()
            .filter(|r| r.integration_id == integration_id)
            .collect(),
        None => {
            sync.list_resources(
                organization_id,
                integration_id,
                resource_type.unwrap_or(ResourceType::Container),
            )
            .await?
        }
    };
    if let (Some(_), Some(kind)) = (query.parent_id, resource_type) {
        rows.retain(|r| r.resource_type == kind.as_str());
    }

    Ok(Json(ResourcesResponse {
        resources: to_infos(rows),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub integration_id: Uuid,
    /// Case-insensitive substring of the name
    pub q: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
}

/// Search resources by name
#[utoipa::path(
    get,
    path = "/api/resources/search",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "Matches, most used first", body = ResourcesResponse),
        (status = 400, description = "Invalid query", body = ApiError),
        (status = 404, description = "Integration not found", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn search_resources(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ResourcesResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    let term = query.q.trim();
    if term.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            "q must not be empty",
        ));
    }
    ensure_integration(&state, organization_id, query.integration_id).await?;
    let resource_type = parse_type(query.resource_type.as_deref())?;

    let rows = state
        .sync_service()
        .search(organization_id, query.integration_id, term, resource_type)
        .await?;
    Ok(Json(ResourcesResponse {
        resources: to_infos(rows),
    }))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourcePathResponse {
    /// Root first, the requested resource last
    pub path: Vec<ResourceInfo>,
}

/// Breadcrumb from the root container to a resource
#[utoipa::path(
    get,
    path = "/api/resources/{id}/path",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 200, description = "Ancestors and the resource", body = ResourcePathResponse),
        (status = 404, description = "Resource not found", body = ApiError),
        (status = 500, description = "Corrupt resource tree", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn resource_path(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<ResourcePathResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    let chain = state
        .sync_service()
        .resource_path(organization_id, resource_id)
        .await?;
    Ok(Json(ResourcePathResponse {
        path: to_infos(chain),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncLevelRequest {
    pub level: SyncLevel,
}

/// Refresh the children of a resource from the provider
#[utoipa::path(
    post,
    path = "/api/resources/{id}/sync-level",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Parent resource id")),
    request_body = SyncLevelRequest,
    responses(
        (status = 200, description = "Children refreshed or served from cache", body = LevelSyncOutcome),
        (status = 400, description = "Level is not a child level of the resource", body = ApiError),
        (status = 404, description = "Resource or integration not found", body = ApiError),
        (status = 429, description = "Provider rate limit hit", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn sync_level(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<Uuid>,
    Json(request): Json<SyncLevelRequest>,
) -> Result<Json<LevelSyncOutcome>, ApiError> {
    let organization_id = user.require_organization()?;
    let sync = state.sync_service();
    let parent = sync.resource(organization_id, resource_id).await?;
    let integration = sync
        .integration(organization_id, parent.integration_id)
        .await?;
    let outcome = sync.sync_level(&integration, parent.id, request.level).await?;
    Ok(Json(outcome))
}

/// Record that the caller used a resource
#[utoipa::path(
    post,
    path = "/api/resources/{id}/usage",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 204, description = "Usage recorded"),
        (status = 404, description = "Resource not found", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn track_usage(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let organization_id = user.require_organization()?;
    state
        .sync_service()
        .resource(organization_id, resource_id)
        .await?;
    state
        .usage()
        .track_usage(user.user_id, resource_id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Defaults to 10, at most 50
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecentResponse {
    pub recent: Vec<RecentResourceView>,
}

/// The caller's most recently used resources
#[utoipa::path(
    get,
    path = "/api/resources/recent",
    security(("bearer_auth" = [])),
    params(RecentQuery),
    responses((status = 200, description = "Most recent first", body = RecentResponse)),
    tag = "resources"
)]
pub async fn recent_resources(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    let limit = query.limit.map(|l| l.clamp(1, MAX_RECENT_LIMIT));
    let recent = state
        .usage()
        .recent(organization_id, user.user_id, limit)
        .await?;
    Ok(Json(RecentResponse { recent }))
}

/// The caller's favorite resources
#[utoipa::path(
    get,
    path = "/api/resources/favorites",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Favorites in the order added", body = ResourcesResponse)),
    tag = "resources"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ResourcesResponse>, ApiError> {
    let organization_id = user.require_organization()?;
    let resources = state.usage().favorites(organization_id, user.user_id).await?;
    Ok(Json(ResourcesResponse { resources }))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest {
    pub resource_id: Uuid,
}

/// Add a resource to the caller's favorites
#[utoipa::path(
    post,
    path = "/api/resources/favorites",
    security(("bearer_auth" = [])),
    request_body = FavoriteRequest,
    responses(
        (status = 204, description = "Favorite added (no-op if already present)"),
        (status = 404, description = "Resource not found", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<FavoriteRequest>,
) -> Result<StatusCode, ApiError> {
    let organization_id = user.require_organization()?;
    state
        .sync_service()
        .resource(organization_id, request.resource_id)
        .await?;
    state
        .usage()
        .add_favorite(user.user_id, request.resource_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a resource from the caller's favorites
#[utoipa::path(
    delete,
    path = "/api/resources/favorites/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Resource id")),
    responses(
        (status = 204, description = "Favorite removed"),
        (status = 404, description = "Not a favorite", body = ApiError)
    ),
    tag = "resources"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(resource_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    user.require_organization()?;
    if state.usage().remove_favorite(user.user_id, resource_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Favorite not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_filter_parsing() {
        assert_eq!(parse_type(None).unwrap(), None);
        assert_eq!(
            parse_type(Some("collection")).unwrap(),
            Some(ResourceType::Collection)
        );
        let err = parse_type(Some("folder")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
