//! Create `registrations` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Registrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Registrations::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Registrations::ScheduleId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(Registrations::StudentInformationId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Registrations::PaymentStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Registrations::PaymentFileId).string_len(36))
                    .col(
                        ColumnDef::new(Registrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Registrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_registrations_schedule")
                            .from(Registrations::Table, Registrations::ScheduleId)
                            .to(ActivitySchedules::Table, ActivitySchedules::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_registrations_student_information")
                            .from(Registrations::Table, Registrations::StudentInformationId)
                            .to(StudentInformation::Table, StudentInformation::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_registrations_payment_file")
                            .from(Registrations::Table, Registrations::PaymentFileId)
                            .to(Files::Table, Files::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one registration per student per schedule
        manager
            .create_index(
                Index::create()
                    .name("idx_registrations_schedule_student")
                    .table(Registrations::Table)
                    .col(Registrations::ScheduleId)
                    .col(Registrations::StudentInformationId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (schedule_id, payment_status) for capacity counts and review queues
        manager
            .create_index(
                Index::create()
                    .name("idx_registrations_schedule_status")
                    .table(Registrations::Table)
                    .col(Registrations::ScheduleId)
                    .col(Registrations::PaymentStatus)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Registrations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Registrations {
    Table,
    Id,
    ScheduleId,
    StudentInformationId,
    PaymentStatus,
    PaymentFileId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ActivitySchedules {
    Table,
    Id,
}

#[derive(Iden)]
enum StudentInformation {
    Table,
    Id,
}

#[derive(Iden)]
enum Files {
    Table,
    Id,
}
