//! Activity attachment repository.

use std::sync::Arc;

use crate::entities::{ActivityFile, activity_file};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

/// Repository for files attached to activities.
#[derive(Clone)]
pub struct ActivityFileRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityFileRepository {
    /// Create a new activity file repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// List the attachments of an activity.
    pub async fn find_by_activity(
        &self,
        activity_id: &str,
    ) -> AppResult<Vec<activity_file::Model>> {
        ActivityFile::find()
            .filter(activity_file::Column::ActivityId.eq(activity_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Attach a file on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: activity_file::ActiveModel,
    ) -> AppResult<activity_file::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
