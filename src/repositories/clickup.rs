//! ClickUp workspace and project cache tables

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::prelude::*;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_token, encrypt_token, workspace_aad};
use crate::models::clickup_project::{self, Entity as ClickupProject};
use crate::models::clickup_workspace::{self, Entity as ClickupWorkspace};

#[derive(Debug, Clone)]
pub struct ClickUpRepository {
    db: DatabaseConnection,
    crypto_key: CryptoKey,
}

impl ClickUpRepository {
    pub fn new(db: DatabaseConnection, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Records a workspace seen during connect, refreshing its name and token
    pub async fn upsert_workspace(
        &self,
        organization_id: Uuid,
        workspace_id: &str,
        workspace_name: &str,
        access_token: &str,
    ) -> Result<clickup_workspace::Model> {
        let ciphertext = encrypt_token(
            &self.crypto_key,
            &workspace_aad(organization_id, workspace_id),
            access_token,
        )
        .map_err(|e| anyhow!("Token encryption failed: {}", e))?;

        let row = clickup_workspace::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            workspace_id: Set(workspace_id.to_string()),
            workspace_name: Set(workspace_name.to_string()),
            access_token_ciphertext: Set(ciphertext),
            last_synced_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        ClickupWorkspace::insert(row)
            .on_conflict(
                OnConflict::columns([
                    clickup_workspace::Column::OrganizationId,
                    clickup_workspace::Column::WorkspaceId,
                ])
                .update_columns([
                    clickup_workspace::Column::WorkspaceName,
                    clickup_workspace::Column::AccessTokenCiphertext,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        ClickupWorkspace::find()
            .filter(clickup_workspace::Column::OrganizationId.eq(organization_id))
            .filter(clickup_workspace::Column::WorkspaceId.eq(workspace_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| anyhow!("workspace missing after upsert"))
    }

    pub async fn find_workspace(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<clickup_workspace::Model>> {
        Ok(ClickupWorkspace::find_by_id(id)
            .filter(clickup_workspace::Column::OrganizationId.eq(organization_id))
            .one(&self.db)
            .await?)
    }

    /// Workspaces of an organization, oldest first
    pub async fn list_workspaces(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<clickup_workspace::Model>> {
        Ok(ClickupWorkspace::find()
            .filter(clickup_workspace::Column::OrganizationId.eq(organization_id))
            .order_by_asc(clickup_workspace::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub fn workspace_token(&self, workspace: &clickup_workspace::Model) -> Result<String> {
        decrypt_token(
            &self.crypto_key,
            &workspace_aad(workspace.organization_id, &workspace.workspace_id),
            &workspace.access_token_ciphertext,
        )
        .map_err(|e| anyhow!("Token decryption failed: {}", e))
    }

    /// Inserts the project unless a row with the same project id exists.
    ///
    /// Returns true when a row was inserted.
    pub async fn insert_project_if_absent(
        &self,
        workspace_row_id: Uuid,
        project_id: &str,
        name: &str,
        status: Option<String>,
        color: Option<String>,
    ) -> Result<bool> {
        let exists = ClickupProject::find()
            .filter(clickup_project::Column::ProjectId.eq(project_id))
            .one(&self.db)
            .await?
            .is_some();
        if exists {
            return Ok(false);
        }

        let row = clickup_project::ActiveModel {
            id: Set(Uuid::new_v4()),
            workspace_id: Set(workspace_row_id),
            project_id: Set(project_id.to_string()),
            name: Set(name.to_string()),
            status: Set(status),
            color: Set(color),
            last_synced_at: Set(Some(Utc::now().into())),
        };
        let inserted = ClickupProject::insert(row)
            .on_conflict(
                OnConflict::column(clickup_project::Column::ProjectId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(inserted > 0)
    }

    pub async fn list_projects(&self, workspace_row_id: Uuid) -> Result<Vec<clickup_project::Model>> {
        Ok(ClickupProject::find()
            .filter(clickup_project::Column::WorkspaceId.eq(workspace_row_id))
            .order_by_asc(clickup_project::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn touch_workspace_synced(&self, workspace_row_id: Uuid) -> Result<()> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        ClickupWorkspace::update_many()
            .col_expr(clickup_workspace::Column::LastSyncedAt, Expr::value(now))
            .filter(clickup_workspace::Column::Id.eq(workspace_row_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
