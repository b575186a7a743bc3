//! Creates the activity tables: time entries and their screenshots.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TimeEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TimeEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TimeEntries::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(TimeEntries::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TimeEntries::EndTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(TimeEntries::ExternalTaskId).text().null())
                    .col(ColumnDef::new(TimeEntries::ExternalProjectId).text().null())
                    .col(
                        ColumnDef::new(TimeEntries::ActivityPercentage)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(TimeEntries::MouseClicks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TimeEntries::KeyboardStrokes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TimeEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_time_entries_user_id")
                            .from(TimeEntries::Table, TimeEntries::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Screenshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Screenshots::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Screenshots::TimeEntryId).uuid().not_null())
                    .col(ColumnDef::new(Screenshots::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Screenshots::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Screenshots::KeyOriginal).text().not_null())
                    .col(ColumnDef::new(Screenshots::KeyBlurred).text().null())
                    .col(
                        ColumnDef::new(Screenshots::IsBlurred)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Screenshots::IsDeleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Screenshots::UploadStatus)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Screenshots::WindowTitle).text().null())
                    .col(ColumnDef::new(Screenshots::ApplicationName).text().null())
                    .col(ColumnDef::new(Screenshots::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Screenshots::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_screenshots_time_entry_id")
                            .from(Screenshots::Table, Screenshots::TimeEntryId)
                            .to(TimeEntries::Table, TimeEntries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_screenshots_user_id")
                            .from(Screenshots::Table, Screenshots::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_time_entries_user_start")
                    .table(TimeEntries::Table)
                    .col(TimeEntries::UserId)
                    .col(TimeEntries::StartTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_screenshots_user_timestamp")
                    .table(Screenshots::Table)
                    .col(Screenshots::UserId)
                    .col(Screenshots::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_screenshots_user_timestamp")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_time_entries_user_start").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Screenshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TimeEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TimeEntries {
    Table,
    Id,
    UserId,
    StartTime,
    EndTime,
    ExternalTaskId,
    ExternalProjectId,
    ActivityPercentage,
    MouseClicks,
    KeyboardStrokes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Screenshots {
    Table,
    Id,
    TimeEntryId,
    UserId,
    Timestamp,
    KeyOriginal,
    KeyBlurred,
    IsBlurred,
    IsDeleted,
    UploadStatus,
    WindowTitle,
    ApplicationName,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
