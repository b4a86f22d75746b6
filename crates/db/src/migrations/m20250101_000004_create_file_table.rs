//! Create `files` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Files::Id).string_len(36).not_null().primary_key())
                    .col(ColumnDef::new(Files::Bucket).string_len(255).not_null())
                    .col(ColumnDef::new(Files::Key).string_len(255).not_null())
                    .col(ColumnDef::new(Files::Filename).string_len(255).not_null())
                    .col(ColumnDef::new(Files::Mimetype).string_len(100).not_null())
                    .col(ColumnDef::new(Files::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(Files::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (bucket, key)
        manager
            .create_index(
                Index::create()
                    .name("idx_files_bucket_key")
                    .table(Files::Table)
                    .col(Files::Bucket)
                    .col(Files::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Files::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Files {
    Table,
    Id,
    Bucket,
    Key,
    Filename,
    Mimetype,
    Size,
    CreatedAt,
}
