//! Organization and user lookups

use chrono::Utc;
use sea_orm::prelude::*;
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, Set, TryIntoModel};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::organization::{self, Entity as Organization, OrganizationSettings};
use crate::models::user::{self, Entity as User, Role};

#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    db: DatabaseConnection,
}

impl OrganizationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        name: &str,
        settings: Option<JsonValue>,
    ) -> Result<organization::Model, DbErr> {
        let now = Utc::now();
        let row = organization::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            settings: Set(settings),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let model = row.clone().try_into_model()?;
        Organization::insert(row)
            .exec_without_returning(&self.db)
            .await?;
        Ok(model)
    }

    pub async fn find(&self, organization_id: Uuid) -> Result<Option<organization::Model>, DbErr> {
        Organization::find_by_id(organization_id).one(&self.db).await
    }

    /// Settings of the organization, defaults when it has none
    pub async fn settings(&self, organization_id: Option<Uuid>) -> Result<OrganizationSettings, DbErr> {
        let Some(id) = organization_id else {
            return Ok(OrganizationSettings::default());
        };
        Ok(self
            .find(id)
            .await?
            .map(|org| org.settings())
            .unwrap_or_default())
    }

    pub async fn create_user(
        &self,
        organization_id: Option<Uuid>,
        email: &str,
        name: &str,
        role: Role,
        can_blur_screenshots: bool,
    ) -> Result<user::Model, DbErr> {
        let now = Utc::now();
        let row = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(String::new()),
            name: Set(name.to_string()),
            role: Set(role.as_str().to_string()),
            organization_id: Set(organization_id),
            can_blur_screenshots: Set(can_blur_screenshots),
            is_active: Set(true),
            last_seen_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let model = row.clone().try_into_model()?;
        User::insert(row).exec_without_returning(&self.db).await?;
        Ok(model)
    }

    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<user::Model>, DbErr> {
        User::find_by_id(user_id).one(&self.db).await
    }

    /// Record client activity for presence display
    pub async fn touch_last_seen(&self, user_id: Uuid) -> Result<(), DbErr> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        User::update_many()
            .col_expr(user::Column::LastSeenAt, sea_orm::sea_query::Expr::value(now))
            .filter(user::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
