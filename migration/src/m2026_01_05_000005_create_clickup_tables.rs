//! Creates the ClickUp workspace/project tables fed by the `clickup-sync` queue.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ClickupWorkspaces::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickupWorkspaces::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickupWorkspaces::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickupWorkspaces::WorkspaceId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickupWorkspaces::WorkspaceName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickupWorkspaces::AccessTokenCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickupWorkspaces::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ClickupWorkspaces::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clickup_workspaces_organization_id")
                            .from(ClickupWorkspaces::Table, ClickupWorkspaces::OrganizationId)
                            .to(Organizations::Table, Organizations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_clickup_workspaces_org_workspace")
                    .table(ClickupWorkspaces::Table)
                    .col(ClickupWorkspaces::OrganizationId)
                    .col(ClickupWorkspaces::WorkspaceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClickupProjects::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickupProjects::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickupProjects::WorkspaceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickupProjects::ProjectId).text().not_null())
                    .col(ColumnDef::new(ClickupProjects::Name).text().not_null())
                    .col(ColumnDef::new(ClickupProjects::Status).text().null())
                    .col(ColumnDef::new(ClickupProjects::Color).text().null())
                    .col(
                        ColumnDef::new(ClickupProjects::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clickup_projects_workspace_id")
                            .from(ClickupProjects::Table, ClickupProjects::WorkspaceId)
                            .to(ClickupWorkspaces::Table, ClickupWorkspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_clickup_projects_project_id")
                    .table(ClickupProjects::Table)
                    .col(ClickupProjects::ProjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_clickup_projects_project_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_clickup_workspaces_org_workspace")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ClickupProjects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ClickupWorkspaces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickupWorkspaces {
    Table,
    Id,
    OrganizationId,
    WorkspaceId,
    WorkspaceName,
    AccessTokenCiphertext,
    LastSyncedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ClickupProjects {
    Table,
    Id,
    WorkspaceId,
    ProjectId,
    Name,
    Status,
    Color,
    LastSyncedAt,
}

#[derive(DeriveIden)]
enum Organizations {
    Table,
    Id,
}
