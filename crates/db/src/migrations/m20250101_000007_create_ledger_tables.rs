//! Create `transactions` and `topup_transactions` tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::UserId).string_len(36).not_null())
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Transactions::Amount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Transactions::BalanceBefore)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::BalanceAfter)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, created_at) for newest-first history
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_created_at")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TopupTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TopupTransactions::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TopupTransactions::UserId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TopupTransactions::TransactionId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TopupTransactions::FileId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TopupTransactions::Payload).text().not_null())
                    .col(
                        ColumnDef::new(TopupTransactions::TransactionRef)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TopupTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TopupTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topup_transactions_user")
                            .from(TopupTransactions::Table, TopupTransactions::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topup_transactions_transaction")
                            .from(TopupTransactions::Table, TopupTransactions::TransactionId)
                            .to(Transactions::Table, Transactions::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_topup_transactions_file")
                            .from(TopupTransactions::Table, TopupTransactions::FileId)
                            .to(Files::Table, Files::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: a slip payload is redeemable once, across all users
        manager
            .create_index(
                Index::create()
                    .name("idx_topup_transactions_payload")
                    .table(TopupTransactions::Table)
                    .col(TopupTransactions::Payload)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Unique index: one topup record per ledger entry
        manager
            .create_index(
                Index::create()
                    .name("idx_topup_transactions_transaction_id")
                    .table(TopupTransactions::Table)
                    .col(TopupTransactions::TransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TopupTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Amount,
    BalanceBefore,
    BalanceAfter,
    TransactionType,
    CreatedAt,
}

#[derive(Iden)]
enum TopupTransactions {
    Table,
    Id,
    UserId,
    TransactionId,
    FileId,
    Payload,
    TransactionRef,
    Amount,
    CreatedAt,
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
