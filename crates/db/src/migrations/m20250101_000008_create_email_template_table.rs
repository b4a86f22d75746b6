//! Create `email_templates` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EmailTemplates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmailTemplates::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmailTemplates::ActivityId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailTemplates::Subject).text().not_null())
                    .col(ColumnDef::new(EmailTemplates::Body).text().not_null())
                    .col(
                        ColumnDef::new(EmailTemplates::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EmailTemplates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_templates_activity")
                            .from(EmailTemplates::Table, EmailTemplates::ActivityId)
                            .to(Activities::Table, Activities::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one template per activity (upsert target)
        manager
            .create_index(
                Index::create()
                    .name("idx_email_templates_activity_id")
                    .table(EmailTemplates::Table)
                    .col(EmailTemplates::ActivityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailTemplates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EmailTemplates {
    Table,
    Id,
    ActivityId,
    Subject,
    Body,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Activities {
    Table,
    Id,
}
