//! File repository.

use std::sync::Arc;

use crate::entities::{File, file};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

/// File repository for database operations.
#[derive(Clone)]
pub struct FileRepository {
    db: Arc<DatabaseConnection>,
}

impl FileRepository {
    /// Create a new file repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a file by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<file::Model>> {
        File::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find files by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<file::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        File::find()
            .filter(file::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a stored file.
    pub async fn create(&self, model: file::ActiveModel) -> AppResult<file::Model> {
        Self::create_in(self.db.as_ref(), model).await
    }

    /// Record a stored file on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: file::ActiveModel,
    ) -> AppResult<file::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
