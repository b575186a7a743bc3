//! Creates the mirrored provider hierarchy and the per-user usage tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncedResources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncedResources::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::IntegrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::ResourceType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::ProviderType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::ExternalId)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncedResources::ParentId).uuid().null())
                    .col(
                        ColumnDef::new(SyncedResources::Level)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncedResources::Path).text().not_null())
                    .col(ColumnDef::new(SyncedResources::Name).text().not_null())
                    .col(
                        ColumnDef::new(SyncedResources::IsSelectable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::SyncStatus)
                            .text()
                            .not_null()
                            .default("synced"),
                    )
                    .col(ColumnDef::new(SyncedResources::SyncError).text().null())
                    .col(ColumnDef::new(SyncedResources::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(SyncedResources::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::LastAccessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::AccessCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncedResources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_synced_resources_integration_id")
                            .from(SyncedResources::Table, SyncedResources::IntegrationId)
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_synced_resources_parent_id")
                            .from(SyncedResources::Table, SyncedResources::ParentId)
                            .to(SyncedResources::Table, SyncedResources::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_synced_resources_org_integration_external")
                    .table(SyncedResources::Table)
                    .col(SyncedResources::OrganizationId)
                    .col(SyncedResources::IntegrationId)
                    .col(SyncedResources::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_synced_resources_parent_id")
                    .table(SyncedResources::Table)
                    .col(SyncedResources::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecentResources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RecentResources::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RecentResources::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(RecentResources::ResourceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecentResources::LastUsedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RecentResources::UseCount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_recent_resources_resource_id")
                            .from(RecentResources::Table, RecentResources::ResourceId)
                            .to(SyncedResources::Table, SyncedResources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_recent_resources_user_resource")
                    .table(RecentResources::Table)
                    .col(RecentResources::UserId)
                    .col(RecentResources::ResourceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FavoriteResources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FavoriteResources::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FavoriteResources::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(FavoriteResources::ResourceId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FavoriteResources::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FavoriteResources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorite_resources_resource_id")
                            .from(FavoriteResources::Table, FavoriteResources::ResourceId)
                            .to(SyncedResources::Table, SyncedResources::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_favorite_resources_user_resource")
                    .table(FavoriteResources::Table)
                    .col(FavoriteResources::UserId)
                    .col(FavoriteResources::ResourceId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserIntegrationPreferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::UserId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::IntegrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::DefaultContainerId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::DefaultProjectId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::DefaultCollectionId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UserIntegrationPreferences::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_integration_preferences_integration_id")
                            .from(
                                UserIntegrationPreferences::Table,
                                UserIntegrationPreferences::IntegrationId,
                            )
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_integration_preferences_user_integration")
                    .table(UserIntegrationPreferences::Table)
                    .col(UserIntegrationPreferences::UserId)
                    .col(UserIntegrationPreferences::IntegrationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index in [
            "idx_user_integration_preferences_user_integration",
            "idx_favorite_resources_user_resource",
            "idx_recent_resources_user_resource",
            "idx_synced_resources_parent_id",
            "idx_synced_resources_org_integration_external",
        ] {
            manager
                .drop_index(Index::drop().name(index).to_owned())
                .await?;
        }

        manager
            .drop_table(
                Table::drop()
                    .table(UserIntegrationPreferences::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(FavoriteResources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecentResources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncedResources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncedResources {
    Table,
    Id,
    OrganizationId,
    IntegrationId,
    ResourceType,
    ProviderType,
    ExternalId,
    ParentId,
    Level,
    Path,
    Name,
    IsSelectable,
    SyncStatus,
    SyncError,
    Metadata,
    LastSyncedAt,
    LastAccessedAt,
    AccessCount,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RecentResources {
    Table,
    Id,
    UserId,
    ResourceId,
    LastUsedAt,
    UseCount,
}

#[derive(DeriveIden)]
enum FavoriteResources {
    Table,
    Id,
    UserId,
    ResourceId,
    Position,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UserIntegrationPreferences {
    Table,
    Id,
    UserId,
    IntegrationId,
    DefaultContainerId,
    DefaultProjectId,
    DefaultCollectionId,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Integrations {
    Table,
    Id,
}
