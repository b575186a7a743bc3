//! ClickUp list mirrored as a project row

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clickup_projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Local `clickup_workspaces.id`
    pub workspace_id: Uuid,
    /// ClickUp list id
    #[sea_orm(unique)]
    pub project_id: String,
    pub name: String,
    pub status: Option<String>,
    pub color: Option<String>,
    pub last_synced_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::clickup_workspace::Entity",
        from = "Column::WorkspaceId",
        to = "super::clickup_workspace::Column::Id"
    )]
    Workspace,
}

impl Related<super::clickup_workspace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workspace.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
