//! Activity repository
//!
//! Time entries and screenshot rows recorded by the desktop client.

use chrono::{DateTime, Utc};
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, Set, TryIntoModel};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::screenshot::{
    self, Entity as Screenshot, UPLOAD_FAILED, UPLOAD_PENDING, UPLOAD_UPLOADED,
};
use crate::models::time_entry::{self, Entity as TimeEntry};

/// Counters and interval of one activity report
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimeEntry {
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub activity_percentage: f64,
    pub mouse_clicks: i32,
    pub keyboard_strokes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScreenshot {
    pub time_entry_id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub key_original: String,
    pub is_blurred: bool,
    pub window_title: Option<String>,
    pub application_name: Option<String>,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    db: DatabaseConnection,
}

impl ActivityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_time_entry(&self, entry: NewTimeEntry) -> Result<time_entry::Model, DbErr> {
        let row = time_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            start_time: Set(entry.start_time.into()),
            end_time: Set(entry.end_time.map(Into::into)),
            external_task_id: Set(None),
            external_project_id: Set(None),
            activity_percentage: Set(entry.activity_percentage),
            mouse_clicks: Set(entry.mouse_clicks),
            keyboard_strokes: Set(entry.keyboard_strokes),
            created_at: Set(Utc::now().into()),
        };
        let model = row.clone().try_into_model()?;
        TimeEntry::insert(row).exec_without_returning(&self.db).await?;
        Ok(model)
    }

    pub async fn find_time_entry(
        &self,
        user_id: Uuid,
        time_entry_id: Uuid,
    ) -> Result<Option<time_entry::Model>, DbErr> {
        TimeEntry::find_by_id(time_entry_id)
            .filter(time_entry::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    /// Insert a pending screenshot row; the upload job fills in the rest
    pub async fn create_screenshot(&self, shot: NewScreenshot) -> Result<screenshot::Model, DbErr> {
        let row = screenshot::ActiveModel {
            id: Set(Uuid::new_v4()),
            time_entry_id: Set(shot.time_entry_id),
            user_id: Set(shot.user_id),
            timestamp: Set(shot.timestamp.into()),
            key_original: Set(shot.key_original),
            key_blurred: Set(None),
            is_blurred: Set(shot.is_blurred),
            is_deleted: Set(false),
            upload_status: Set(UPLOAD_PENDING.to_string()),
            window_title: Set(shot.window_title),
            application_name: Set(shot.application_name),
            metadata: Set(shot.metadata),
            created_at: Set(Utc::now().into()),
        };
        let model = row.clone().try_into_model()?;
        Screenshot::insert(row).exec_without_returning(&self.db).await?;
        Ok(model)
    }

    pub async fn find_screenshot(&self, screenshot_id: Uuid) -> Result<Option<screenshot::Model>, DbErr> {
        Screenshot::find_by_id(screenshot_id).one(&self.db).await
    }

    /// Screenshot owned by `user_id` that has not been deleted
    pub async fn find_owned_screenshot(
        &self,
        user_id: Uuid,
        screenshot_id: Uuid,
    ) -> Result<Option<screenshot::Model>, DbErr> {
        Screenshot::find_by_id(screenshot_id)
            .filter(screenshot::Column::UserId.eq(user_id))
            .filter(screenshot::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
    }

    pub async fn mark_uploaded(
        &self,
        screenshot_id: Uuid,
        key_blurred: Option<String>,
    ) -> Result<(), DbErr> {
        let mut update = Screenshot::update_many()
            .col_expr(screenshot::Column::UploadStatus, Expr::value(UPLOAD_UPLOADED));
        if let Some(key) = key_blurred {
            update = update.col_expr(screenshot::Column::KeyBlurred, Expr::value(key));
        }
        update
            .filter(screenshot::Column::Id.eq(screenshot_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn mark_upload_failed(&self, screenshot_id: Uuid) -> Result<(), DbErr> {
        Screenshot::update_many()
            .col_expr(screenshot::Column::UploadStatus, Expr::value(UPLOAD_FAILED))
            .filter(screenshot::Column::Id.eq(screenshot_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn mark_deleted(&self, screenshot_id: Uuid) -> Result<(), DbErr> {
        Screenshot::update_many()
            .col_expr(screenshot::Column::IsDeleted, Expr::value(true))
            .filter(screenshot::Column::Id.eq(screenshot_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn set_blurred(&self, screenshot_id: Uuid, is_blurred: bool) -> Result<(), DbErr> {
        Screenshot::update_many()
            .col_expr(screenshot::Column::IsBlurred, Expr::value(is_blurred))
            .filter(screenshot::Column::Id.eq(screenshot_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
