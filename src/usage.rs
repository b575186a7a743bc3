//! Usage tracking
//!
//! Records which synced resources a user picks so pickers can offer recents,
//! favorites and per-integration defaults.

use chrono::{DateTime, Utc};
use sea_orm::prelude::*;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::favorite_resource::{self, Entity as FavoriteResource};
use crate::models::recent_resource::{self, Entity as RecentResource};
use crate::models::synced_resource::{self, Entity as SyncedResource, ResourceInfo};
use crate::models::user_integration_preference::{
    self, Entity as UserIntegrationPreference, UserDefaults,
};
use crate::repositories::SyncedResourceRepository;

/// Default size of the recent list
pub const DEFAULT_RECENT_LIMIT: u64 = 10;

/// A recently used resource
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentResourceView {
    pub resource: ResourceInfo,
    pub last_used_at: String,
    pub use_count: i32,
}

#[derive(Debug, Clone)]
pub struct UsageService {
    db: DatabaseConnection,
    resources: SyncedResourceRepository,
}

impl UsageService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            resources: SyncedResourceRepository::new(db.clone()),
            db,
        }
    }

    /// Count one use of `resource_id` by `user_id`
    pub async fn track_usage(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DbErr> {
        self.resources.record_access(resource_id, at).await?;

        let at: DateTimeWithTimeZone = at.into();
        let row = recent_resource::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            resource_id: Set(resource_id),
            last_used_at: Set(at),
            use_count: Set(1),
        };
        RecentResource::insert(row)
            .on_conflict(
                OnConflict::columns([
                    recent_resource::Column::UserId,
                    recent_resource::Column::ResourceId,
                ])
                .value(
                    recent_resource::Column::UseCount,
                    Expr::col((RecentResource, recent_resource::Column::UseCount)).add(1),
                )
                .update_column(recent_resource::Column::LastUsedAt)
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Most recently used resources of the user within the organization
    pub async fn recent(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        limit: Option<u64>,
    ) -> Result<Vec<RecentResourceView>, DbErr> {
        let rows = RecentResource::find()
            .find_also_related(SyncedResource)
            .filter(recent_resource::Column::UserId.eq(user_id))
            .filter(synced_resource::Column::OrganizationId.eq(organization_id))
            .order_by_desc(recent_resource::Column::LastUsedAt)
            .limit(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(recent, resource)| {
                resource.map(|resource| RecentResourceView {
                    resource: resource.into(),
                    last_used_at: recent.last_used_at.to_rfc3339(),
                    use_count: recent.use_count,
                })
            })
            .collect())
    }

    pub async fn save_user_defaults(
        &self,
        user_id: Uuid,
        integration_id: Uuid,
        defaults: &UserDefaults,
    ) -> Result<(), DbErr> {
        let row = user_integration_preference::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            integration_id: Set(integration_id),
            default_container_id: Set(defaults.default_container_id),
            default_project_id: Set(defaults.default_project_id),
            default_collection_id: Set(defaults.default_collection_id),
            updated_at: Set(Utc::now().into()),
        };
        UserIntegrationPreference::insert(row)
            .on_conflict(
                OnConflict::columns([
                    user_integration_preference::Column::UserId,
                    user_integration_preference::Column::IntegrationId,
                ])
                .update_columns([
                    user_integration_preference::Column::DefaultContainerId,
                    user_integration_preference::Column::DefaultProjectId,
                    user_integration_preference::Column::DefaultCollectionId,
                    user_integration_preference::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    pub async fn user_defaults(
        &self,
        user_id: Uuid,
        integration_id: Uuid,
    ) -> Result<Option<UserDefaults>, DbErr> {
        let found = UserIntegrationPreference::find()
            .filter(user_integration_preference::Column::UserId.eq(user_id))
            .filter(user_integration_preference::Column::IntegrationId.eq(integration_id))
            .one(&self.db)
            .await?;
        Ok(found.map(UserDefaults::from))
    }

    /// Append a favorite; adding one twice keeps the original position
    pub async fn add_favorite(&self, user_id: Uuid, resource_id: Uuid) -> Result<(), DbErr> {
        let last: Option<i32> = FavoriteResource::find()
            .select_only()
            .column_as(favorite_resource::Column::Position.max(), "max_position")
            .filter(favorite_resource::Column::UserId.eq(user_id))
            .into_tuple::<Option<i32>>()
            .one(&self.db)
            .await?
            .flatten();

        let row = favorite_resource::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            resource_id: Set(resource_id),
            position: Set(last.map_or(0, |p| p + 1)),
            created_at: Set(Utc::now().into()),
        };
        FavoriteResource::insert(row)
            .on_conflict(
                OnConflict::columns([
                    favorite_resource::Column::UserId,
                    favorite_resource::Column::ResourceId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Returns false when the resource was not a favorite
    pub async fn remove_favorite(&self, user_id: Uuid, resource_id: Uuid) -> Result<bool, DbErr> {
        let result = FavoriteResource::delete_many()
            .filter(favorite_resource::Column::UserId.eq(user_id))
            .filter(favorite_resource::Column::ResourceId.eq(resource_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Favorites in the order they were added
    pub async fn favorites(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<ResourceInfo>, DbErr> {
        let rows = FavoriteResource::find()
            .find_also_related(SyncedResource)
            .filter(favorite_resource::Column::UserId.eq(user_id))
            .filter(synced_resource::Column::OrganizationId.eq(organization_id))
            .order_by_asc(favorite_resource::Column::Position)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(_, resource)| resource.map(ResourceInfo::from))
            .collect())
    }
}
