//! Time entry entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "time_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTimeWithTimeZone,
    pub end_time: Option<DateTimeWithTimeZone>,
    /// External task this entry is tracked against, if any
    pub external_task_id: Option<String>,
    pub external_project_id: Option<String>,
    /// Share of the interval with input activity, 0-100
    pub activity_percentage: f64,
    pub mouse_clicks: i32,
    pub keyboard_strokes: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::screenshot::Entity")]
    Screenshots,
}

impl Related<super::screenshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Screenshots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
