//! Ledger transaction entity. Rows are append-only.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Balance credit from a verified slip
    #[sea_orm(string_value = "topup")]
    Topup,
    /// Balance debit
    #[sea_orm(string_value = "payment")]
    Payment,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    /// Always positive; `transaction_type` gives the direction
    pub amount: i64,

    pub balance_before: i64,

    pub balance_after: i64,

    pub transaction_type: TransactionType,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Signed effect of this entry on the balance.
    #[must_use]
    pub const fn signed_amount(&self) -> i64 {
        match self.transaction_type {
            TransactionType::Topup => self.amount,
            TransactionType::Payment => -self.amount,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(has_one = "super::topup_transaction::Entity")]
    Topup,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::topup_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Topup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
