//! Default selections a user pre-fills time entries with, per integration

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_integration_preferences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub integration_id: Uuid,
    pub default_container_id: Option<Uuid>,
    pub default_project_id: Option<Uuid>,
    pub default_collection_id: Option<Uuid>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDefaults {
    pub default_container_id: Option<Uuid>,
    pub default_project_id: Option<Uuid>,
    pub default_collection_id: Option<Uuid>,
}

impl From<Model> for UserDefaults {
    fn from(model: Model) -> Self {
        Self {
            default_container_id: model.default_container_id,
            default_project_id: model.default_project_id,
            default_collection_id: model.default_collection_id,
        }
    }
}
