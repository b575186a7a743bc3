//! Creates the integration tables.
//!
//! `integrations` holds one row per (organization, provider, owner). The owner
//! key is the connecting user's id for per-user integrations and the literal
//! `organization` for organization-wide ones, so the unique index can serve as
//! the upsert target for reconnects.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Integrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Integrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Integrations::OrganizationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Integrations::UserId).uuid().null())
                    .col(ColumnDef::new(Integrations::OwnerKey).text().not_null())
                    .col(ColumnDef::new(Integrations::Provider).text().not_null())
                    .col(
                        ColumnDef::new(Integrations::AccessTokenCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Integrations::Scope).text().null())
                    .col(
                        ColumnDef::new(Integrations::ProviderAccountId)
                            .text()
                            .null(),
                    )
                    .col(ColumnDef::new(Integrations::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Integrations::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Integrations::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Integrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_integrations_organization_id")
                            .from(Integrations::Table, Integrations::OrganizationId)
                            .to(Organizations::Table, Organizations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_integrations_org_provider_owner")
                    .table(Integrations::Table)
                    .col(Integrations::OrganizationId)
                    .col(Integrations::Provider)
                    .col(Integrations::OwnerKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IntegrationConfigs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IntegrationConfigs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IntegrationConfigs::IntegrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IntegrationConfigs::Key).text().not_null())
                    .col(
                        ColumnDef::new(IntegrationConfigs::Value)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IntegrationConfigs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_integration_configs_integration_id")
                            .from(IntegrationConfigs::Table, IntegrationConfigs::IntegrationId)
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_integration_configs_integration_key")
                    .table(IntegrationConfigs::Table)
                    .col(IntegrationConfigs::IntegrationId)
                    .col(IntegrationConfigs::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TimeEntryMappings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimeEntryMappings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TimeEntryMappings::TimeEntryId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimeEntryMappings::IntegrationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimeEntryMappings::ExternalTaskId)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimeEntryMappings::ExternalEntryId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TimeEntryMappings::SyncStatus)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(TimeEntryMappings::SyncError).text().null())
                    .col(
                        ColumnDef::new(TimeEntryMappings::SyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TimeEntryMappings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_time_entry_mappings_time_entry_id")
                            .from(TimeEntryMappings::Table, TimeEntryMappings::TimeEntryId)
                            .to(TimeEntries::Table, TimeEntries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_time_entry_mappings_integration_id")
                            .from(TimeEntryMappings::Table, TimeEntryMappings::IntegrationId)
                            .to(Integrations::Table, Integrations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_time_entry_mappings_entry_integration")
                    .table(TimeEntryMappings::Table)
                    .col(TimeEntryMappings::TimeEntryId)
                    .col(TimeEntryMappings::IntegrationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index in [
            "idx_time_entry_mappings_entry_integration",
            "idx_integration_configs_integration_key",
            "idx_integrations_org_provider_owner",
        ] {
            manager
                .drop_index(Index::drop().name(index).to_owned())
                .await?;
        }

        manager
            .drop_table(Table::drop().table(TimeEntryMappings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IntegrationConfigs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Integrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Integrations {
    Table,
    Id,
    OrganizationId,
    UserId,
    OwnerKey,
    Provider,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    TokenExpiresAt,
    Scope,
    ProviderAccountId,
    Metadata,
    IsActive,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum IntegrationConfigs {
    Table,
    Id,
    IntegrationId,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TimeEntryMappings {
    Table,
    Id,
    TimeEntryId,
    IntegrationId,
    ExternalTaskId,
    ExternalEntryId,
    SyncStatus,
    SyncError,
    SyncedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Organizations {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum TimeEntries {
    Table,
    Id,
}
