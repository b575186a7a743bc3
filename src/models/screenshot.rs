//! Screenshot entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const UPLOAD_PENDING: &str = "pending";
pub const UPLOAD_UPLOADED: &str = "uploaded";
pub const UPLOAD_FAILED: &str = "failed";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "screenshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub time_entry_id: Uuid,
    pub user_id: Uuid,
    /// Capture time reported by the client
    pub timestamp: DateTimeWithTimeZone,
    /// Object key in the original bucket
    pub key_original: String,
    /// Object key in the blurred bucket, once processed
    pub key_blurred: Option<String>,
    pub is_blurred: bool,
    pub is_deleted: bool,
    /// `pending`, `uploaded` or `failed`
    pub upload_status: String,
    pub window_title: Option<String>,
    pub application_name: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Option<JsonValue>,
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
}

impl Related<super::time_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TimeEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
