//! Ledger transaction repository.

use std::sync::Arc;

use crate::entities::{Transaction, transaction};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Ledger transaction repository. Rows are only ever inserted.
#[derive(Clone)]
pub struct TransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl TransactionRepository {
    /// Create a new transaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a ledger row on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: transaction::ActiveModel,
    ) -> AppResult<transaction::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's ledger, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<transaction::Model>> {
        Transaction::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .order_by_desc(transaction::Column::CreatedAt)
            .order_by_desc(transaction::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of ledger rows of a user.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        Transaction::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::transaction::TransactionType;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_by_user_newest_first() {
        let row = transaction::Model {
            id: "tx1".to_string(),
            user_id: "user1".to_string(),
            amount: 10_000,
            balance_before: 0,
            balance_after: 10_000,
            transaction_type: TransactionType::Topup,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row]])
                .into_connection(),
        );

        let repo = TransactionRepository::new(db);
        let rows = repo.find_by_user("user1", 15, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].signed_amount(), 10_000);
    }

    #[tokio::test]
    async fn test_count_by_user() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(7))
                }]])
                .into_connection(),
        );

        let repo = TransactionRepository::new(db);
        assert_eq!(repo.count_by_user("user1").await.unwrap(), 7);
    }
}
