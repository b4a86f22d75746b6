//! Student information repository.

use std::sync::Arc;

use crate::entities::{StudentInformation, student_information};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, SqlErr,
};

/// Student information repository for database operations.
#[derive(Clone)]
pub struct StudentInformationRepository {
    db: Arc<DatabaseConnection>,
}

impl StudentInformationRepository {
    /// Create a new student information repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a profile by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<student_information::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find a profile by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<student_information::Model>> {
        StudentInformation::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a profile owned by the given user.
    ///
    /// Profiles of other users are reported as missing.
    pub async fn find_owned(
        &self,
        id: &str,
        user_id: &str,
    ) -> AppResult<Option<student_information::Model>> {
        StudentInformation::find_by_id(id)
            .filter(student_information::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List a user's profiles, oldest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<student_information::Model>> {
        StudentInformation::find()
            .filter(student_information::Column::UserId.eq(user_id))
            .order_by_asc(student_information::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find profiles by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<student_information::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        StudentInformation::find()
            .filter(student_information::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a profile.
    pub async fn create(
        &self,
        model: student_information::ActiveModel,
    ) -> AppResult<student_information::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a profile.
    pub async fn update(
        &self,
        model: student_information::ActiveModel,
    ) -> AppResult<student_information::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a profile.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        StudentInformation::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::Conflict(
                    "Student information is referenced by registrations".to_string(),
                ),
                _ => AppError::Database(e.to_string()),
            })?;
        Ok(())
    }
}
