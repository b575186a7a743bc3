//! Link between a local time entry and an external task

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SYNCED: &str = "synced";
pub const STATUS_ERROR: &str = "error";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "time_entry_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub time_entry_id: Uuid,
    pub integration_id: Uuid,
    pub external_task_id: String,
    /// Provider-side time entry id once pushed
    pub external_entry_id: Option<String>,
    /// `pending`, `synced` or `error`
    pub sync_status: String,
    pub sync_error: Option<String>,
    pub synced_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::time_entry::Entity",
        from = "Column::TimeEntryId",
        to = "super::time_entry::Column::Id"
    )]
    TimeEntry,
    #[sea_orm(
        belongs_to = "super::integration::Entity",
        from = "Column::IntegrationId",
        to = "super::integration::Column::Id"
    )]
    Integration,
}

impl Related<super::time_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TimeEntry.def()
    }
}

impl Related<super::integration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryLinkInfo {
    pub id: Uuid,
    pub time_entry_id: Uuid,
    pub integration_id: Uuid,
    pub external_task_id: String,
    pub external_entry_id: Option<String>,
    pub sync_status: String,
    pub sync_error: Option<String>,
}

impl From<Model> for TimeEntryLinkInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            time_entry_id: model.time_entry_id,
            integration_id: model.integration_id,
            external_task_id: model.external_task_id,
            external_entry_id: model.external_entry_id,
            sync_status: model.sync_status,
            sync_error: model.sync_error,
        }
    }
}
