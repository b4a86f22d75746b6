//! Activity repository.

use std::sync::Arc;

use crate::entities::{Activity, activity};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, sea_query::Expr,
};

/// Activity repository for database operations.
#[derive(Clone)]
pub struct ActivityRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityRepository {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an activity by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<activity::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find an activity by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<activity::Model>> {
        Activity::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an activity by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<activity::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity: {id}")))
    }

    /// List activities by approval state, newest first.
    pub async fn find_by_approved(&self, approved: bool) -> AppResult<Vec<activity::Model>> {
        Activity::find()
            .filter(activity::Column::Approved.eq(approved))
            .order_by_desc(activity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert an activity on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: activity::ActiveModel,
    ) -> AppResult<activity::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Flip `approved` from false to true in a single conditional UPDATE.
    ///
    /// Returns `false` when no row changed (missing or already approved).
    pub async fn mark_approved(&self, id: &str) -> AppResult<bool> {
        let result = Activity::update_many()
            .col_expr(activity::Column::Approved, Expr::value(true))
            .filter(activity::Column::Id.eq(id))
            .filter(activity::Column::Approved.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_mark_approved_changes_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        assert!(repo.mark_approved("act1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_approved_twice_changes_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        assert!(!repo.mark_approved("act1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<activity::Model>::new()])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        assert!(matches!(
            repo.get_by_id("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
