//! Synced resource entity model
//!
//! A node of a provider's hierarchy mirrored locally. Rows form a forest via
//! `parent_id`, one tree per container, with `level` strictly increasing from
//! the root (0) down to tasks (3).

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub const SYNC_STATUS_SYNCED: &str = "synced";
pub const SYNC_STATUS_PENDING: &str = "pending";
pub const SYNC_STATUS_ERROR: &str = "error";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "synced_resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,

    pub integration_id: Uuid,

    /// Generic kind, see [`ResourceType`]
    pub resource_type: String,

    /// Provider's own name for the kind (ClickUp: `space`, `list`, ...)
    pub provider_type: String,

    pub external_id: String,

    pub parent_id: Option<Uuid>,

    pub level: i32,

    /// `/`-joined external ids from the root down to this node
    pub path: String,

    pub name: String,

    /// Only collections and tasks can be assigned to time entries
    pub is_selectable: bool,

    pub sync_status: String,

    pub sync_error: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Option<JsonValue>,

    pub last_synced_at: Option<DateTimeWithTimeZone>,

    pub last_accessed_at: Option<DateTimeWithTimeZone>,

    pub access_count: i32,

    /// Reserved for cleanup; nothing enforces it yet
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::integration::Entity",
        from = "Column::IntegrationId",
        to = "super::integration::Column::Id"
    )]
    Integration,
    #[sea_orm(belongs_to = "Entity", from = "Column::ParentId", to = "Column::Id")]
    Parent,
}

impl Related<super::integration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// The fixed four-level hierarchy every provider is mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Container,
    Project,
    Collection,
    Task,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Container => "container",
            ResourceType::Project => "project",
            ResourceType::Collection => "collection",
            ResourceType::Task => "task",
        }
    }

    pub fn level(self) -> i32 {
        match self {
            ResourceType::Container => 0,
            ResourceType::Project => 1,
            ResourceType::Collection => 2,
            ResourceType::Task => 3,
        }
    }

    pub fn is_selectable(self) -> bool {
        matches!(self, ResourceType::Collection | ResourceType::Task)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "container" => Ok(ResourceType::Container),
            "project" => Ok(ResourceType::Project),
            "collection" => Ok(ResourceType::Collection),
            "task" => Ok(ResourceType::Task),
            other => Err(format!("unknown resource type '{other}'")),
        }
    }
}

/// API view of a synced resource
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub resource_type: String,
    pub provider_type: String,
    pub external_id: String,
    pub parent_id: Option<Uuid>,
    pub level: i32,
    pub path: String,
    pub name: String,
    pub is_selectable: bool,
    pub sync_status: String,
    pub access_count: i32,
    pub last_synced_at: Option<String>,
}

impl From<Model> for ResourceInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            integration_id: model.integration_id,
            resource_type: model.resource_type,
            provider_type: model.provider_type,
            external_id: model.external_id,
            parent_id: model.parent_id,
            level: model.level,
            path: model.path,
            name: model.name,
            is_selectable: model.is_selectable,
            sync_status: model.sync_status,
            access_count: model.access_count,
            last_synced_at: model.last_synced_at.map(|ts| ts.to_rfc3339()),
        }
    }
}
