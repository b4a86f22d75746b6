//! Create `student_information` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StudentInformation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentInformation::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::UserId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::Prefix)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::FullName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::EducationLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::School)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StudentInformation::FoodAllergies).string_len(255))
                    .col(
                        ColumnDef::new(StudentInformation::ParentName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::ParentEmail)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StudentInformation::SecondaryEmail).string_len(255))
                    .col(ColumnDef::new(StudentInformation::PhoneNumber).string_len(20))
                    .col(
                        ColumnDef::new(StudentInformation::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(StudentInformation::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_student_information_user")
                            .from(StudentInformation::Table, StudentInformation::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for listing a user's profiles)
        manager
            .create_index(
                Index::create()
                    .name("idx_student_information_user_id")
                    .table(StudentInformation::Table)
                    .col(StudentInformation::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StudentInformation::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StudentInformation {
    Table,
    Id,
    UserId,
    Prefix,
    FullName,
    EducationLevel,
    School,
    FoodAllergies,
    ParentName,
    ParentEmail,
    SecondaryEmail,
    PhoneNumber,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
