//! Integration entity model
//!
//! One row per connection between an organization (optionally narrowed to a
//! user) and an external provider. Tokens are stored as AES-GCM ciphertext.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

/// Owner key used for organization-wide integrations
pub const ORGANIZATION_OWNER: &str = "organization";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organization_id: Uuid,

    /// Set for per-user integrations
    pub user_id: Option<Uuid>,

    /// `user_id` as text, or [`ORGANIZATION_OWNER`]; part of the unique key
    pub owner_key: String,

    /// Provider identifier (e.g. `clickup`)
    pub provider: String,

    pub access_token_ciphertext: Vec<u8>,

    pub refresh_token_ciphertext: Option<Vec<u8>>,

    pub token_expires_at: Option<DateTimeWithTimeZone>,

    pub scope: Option<String>,

    /// Provider-side account id (ClickUp: first workspace id)
    pub provider_account_id: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Option<JsonValue>,

    pub is_active: bool,

    pub last_synced_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    #[sea_orm(has_many = "super::synced_resource::Entity")]
    SyncedResources,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::synced_resource::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncedResources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Owner key for the unique (organization, provider, owner) constraint.
pub fn owner_key(user_id: Option<Uuid>) -> String {
    user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| ORGANIZATION_OWNER.to_string())
}

/// API view of an integration; never carries tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationInfo {
    pub id: Uuid,
    pub provider: String,
    pub user_id: Option<Uuid>,
    pub provider_account_id: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<JsonValue>,
    pub is_active: bool,
    pub last_synced_at: Option<String>,
    pub created_at: String,
}

impl From<Model> for IntegrationInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            provider: model.provider,
            user_id: model.user_id,
            provider_account_id: model.provider_account_id,
            metadata: model.metadata,
            is_active: model.is_active,
            last_synced_at: model.last_synced_at.map(|ts| ts.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}
