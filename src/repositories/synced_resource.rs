//! Synced resource repository
//!
//! Persistence for the provider hierarchy mirror. Rows are keyed by
//! `(organization, integration, external id)`; every query is scoped to the
//! organization.

use chrono::{DateTime, Utc};
use sea_orm::prelude::*;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::synced_resource::{
    self, Entity as SyncedResource, ResourceType, SYNC_STATUS_SYNCED,
};

/// Hard ceiling on rows returned by a search
pub const SEARCH_LIMIT: u64 = 50;

/// One node to write during a sync pass
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUpsert {
    pub organization_id: Uuid,
    pub integration_id: Uuid,
    pub resource_type: ResourceType,
    pub provider_type: String,
    pub external_id: String,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub name: String,
    pub metadata: Option<JsonValue>,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SyncedResourceRepository {
    db: DatabaseConnection,
}

impl SyncedResourceRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert or refresh a node; returns the stored row.
    ///
    /// On conflict the name, parent, level, path and metadata are refreshed and
    /// the row is marked synced; usage counters are left alone.
    pub async fn upsert(&self, input: ResourceUpsert) -> Result<synced_resource::Model, DbErr> {
        let synced_at: DateTimeWithTimeZone = input.synced_at.into();
        let row = synced_resource::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(input.organization_id),
            integration_id: Set(input.integration_id),
            resource_type: Set(input.resource_type.as_str().to_string()),
            provider_type: Set(input.provider_type),
            external_id: Set(input.external_id.clone()),
            parent_id: Set(input.parent_id),
            level: Set(input.resource_type.level()),
            path: Set(input.path),
            name: Set(input.name),
            is_selectable: Set(input.resource_type.is_selectable()),
            sync_status: Set(SYNC_STATUS_SYNCED.to_string()),
            sync_error: Set(None),
            metadata: Set(input.metadata),
            last_synced_at: Set(Some(synced_at)),
            last_accessed_at: Set(None),
            access_count: Set(0),
            expires_at: Set(None),
            created_at: Set(synced_at),
            updated_at: Set(synced_at),
        };

        SyncedResource::insert(row)
            .on_conflict(
                OnConflict::columns([
                    synced_resource::Column::OrganizationId,
                    synced_resource::Column::IntegrationId,
                    synced_resource::Column::ExternalId,
                ])
                .update_columns([
                    synced_resource::Column::ResourceType,
                    synced_resource::Column::ProviderType,
                    synced_resource::Column::ParentId,
                    synced_resource::Column::Level,
                    synced_resource::Column::Path,
                    synced_resource::Column::Name,
                    synced_resource::Column::IsSelectable,
                    synced_resource::Column::SyncStatus,
                    synced_resource::Column::SyncError,
                    synced_resource::Column::Metadata,
                    synced_resource::Column::LastSyncedAt,
                    synced_resource::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        SyncedResource::find()
            .filter(synced_resource::Column::OrganizationId.eq(input.organization_id))
            .filter(synced_resource::Column::IntegrationId.eq(input.integration_id))
            .filter(synced_resource::Column::ExternalId.eq(input.external_id.as_str()))
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("synced resource {}", input.external_id)))
    }

    /// Resources of one type, ordered by path so siblings stay grouped
    pub async fn list_by_type(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
        resource_type: ResourceType,
        limit: Option<u64>,
    ) -> Result<Vec<synced_resource::Model>, DbErr> {
        SyncedResource::find()
            .filter(synced_resource::Column::OrganizationId.eq(organization_id))
            .filter(synced_resource::Column::IntegrationId.eq(integration_id))
            .filter(synced_resource::Column::ResourceType.eq(resource_type.as_str()))
            .order_by_asc(synced_resource::Column::Path)
            .limit(limit)
            .all(&self.db)
            .await
    }

    pub async fn children(
        &self,
        organization_id: Uuid,
        parent_id: Uuid,
    ) -> Result<Vec<synced_resource::Model>, DbErr> {
        SyncedResource::find()
            .filter(synced_resource::Column::OrganizationId.eq(organization_id))
            .filter(synced_resource::Column::ParentId.eq(parent_id))
            .order_by_asc(synced_resource::Column::Name)
            .all(&self.db)
            .await
    }

    pub async fn find(
        &self,
        organization_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Option<synced_resource::Model>, DbErr> {
        SyncedResource::find_by_id(resource_id)
            .filter(synced_resource::Column::OrganizationId.eq(organization_id))
            .one(&self.db)
            .await
    }

    /// Case-insensitive substring match on the name, most used first
    pub async fn search(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
        query: &str,
        resource_type: Option<ResourceType>,
    ) -> Result<Vec<synced_resource::Model>, DbErr> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let mut condition = Condition::all()
            .add(synced_resource::Column::OrganizationId.eq(organization_id))
            .add(synced_resource::Column::IntegrationId.eq(integration_id))
            .add(
                Expr::expr(Func::lower(Expr::col(synced_resource::Column::Name)))
                    .like(sea_orm::sea_query::LikeExpr::new(pattern).escape('\\')),
            );
        if let Some(kind) = resource_type {
            condition = condition.add(synced_resource::Column::ResourceType.eq(kind.as_str()));
        }

        SyncedResource::find()
            .filter(condition)
            .order_by_desc(synced_resource::Column::AccessCount)
            .order_by_asc(synced_resource::Column::Name)
            .limit(SEARCH_LIMIT)
            .all(&self.db)
            .await
    }

    /// Bump the access counter and last-accessed stamp
    pub async fn record_access(&self, resource_id: Uuid, at: DateTime<Utc>) -> Result<(), DbErr> {
        let at: DateTimeWithTimeZone = at.into();
        SyncedResource::update_many()
            .col_expr(
                synced_resource::Column::AccessCount,
                Expr::col(synced_resource::Column::AccessCount).add(1),
            )
            .col_expr(synced_resource::Column::LastAccessedAt, Expr::value(at))
            .filter(synced_resource::Column::Id.eq(resource_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn count_for_integration(
        &self,
        organization_id: Uuid,
        integration_id: Uuid,
    ) -> Result<u64, DbErr> {
        SyncedResource::find()
            .filter(synced_resource::Column::OrganizationId.eq(organization_id))
            .filter(synced_resource::Column::IntegrationId.eq(integration_id))
            .count(&self.db)
            .await
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("plain"), "plain");
    }
}
