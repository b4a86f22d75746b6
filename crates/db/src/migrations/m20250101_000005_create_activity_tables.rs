//! Create `activities`, `activity_schedules` and `activity_files` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activities::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activities::OwnerId).string_len(36).not_null())
                    .col(ColumnDef::new(Activities::Title).text().not_null())
                    .col(
                        ColumnDef::new(Activities::ThumbnailFileId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activities::Description).text().not_null())
                    .col(ColumnDef::new(Activities::DescriptionShort).text().not_null())
                    .col(
                        ColumnDef::new(Activities::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Activities::RegistrationOpenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activities::RegistrationCloseAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activities_owner")
                            .from(Activities::Table, Activities::OwnerId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activities_thumbnail")
                            .from(Activities::Table, Activities::ThumbnailFileId)
                            .to(Files::Table, Files::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: approved (published/unpublished listings)
        manager
            .create_index(
                Index::create()
                    .name("idx_activities_approved")
                    .table(Activities::Table)
                    .col(Activities::Approved)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivitySchedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivitySchedules::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActivitySchedules::ActivityId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivitySchedules::EventStartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivitySchedules::Price)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(ActivitySchedules::Price).gte(0)),
                    )
                    .col(
                        ColumnDef::new(ActivitySchedules::MaxUsers)
                            .integer()
                            .not_null()
                            .check(Expr::col(ActivitySchedules::MaxUsers).gte(1)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_schedules_activity")
                            .from(ActivitySchedules::Table, ActivitySchedules::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_schedules_activity_id")
                    .table(ActivitySchedules::Table)
                    .col(ActivitySchedules::ActivityId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityFiles::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActivityFiles::ActivityId).string_len(36).not_null())
                    .col(ColumnDef::new(ActivityFiles::FileId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(ActivityFiles::FileType)
                            .string_len(16)
                            .not_null()
                            .default("attachment"),
                    )
                    .col(ColumnDef::new(ActivityFiles::DisplayName).string_len(255))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_files_activity")
                            .from(ActivityFiles::Table, ActivityFiles::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_files_file")
                            .from(ActivityFiles::Table, ActivityFiles::FileId)
                            .to(Files::Table, Files::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_files_activity_id")
                    .table(ActivityFiles::Table)
                    .col(ActivityFiles::ActivityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivitySchedules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Activities::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Activities {
    Table,
    Id,
    OwnerId,
    Title,
    ThumbnailFileId,
    Description,
    DescriptionShort,
    Approved,
    RegistrationOpenAt,
    RegistrationCloseAt,
    CreatedAt,
}

#[derive(Iden)]
enum ActivitySchedules {
    Table,
    Id,
    ActivityId,
    EventStartAt,
    Price,
    MaxUsers,
}

#[derive(Iden)]
enum ActivityFiles {
    Table,
    Id,
    ActivityId,
    FileId,
    FileType,
    DisplayName,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}

#[derive(Iden)]
enum Files {
    Table,
    Id,
}
