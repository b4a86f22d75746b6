//! Activity schedule repository.

use std::sync::Arc;

use crate::entities::{ActivitySchedule, activity_schedule};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Activity schedule repository for database operations.
#[derive(Clone)]
pub struct ActivityScheduleRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityScheduleRepository {
    /// Create a new schedule repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// List an activity's schedules by start time.
    pub async fn find_by_activity(
        &self,
        activity_id: &str,
    ) -> AppResult<Vec<activity_schedule::Model>> {
        ActivitySchedule::find()
            .filter(activity_schedule::Column::ActivityId.eq(activity_id))
            .order_by_asc(activity_schedule::Column::EventStartAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List the schedules of several activities.
    pub async fn find_by_activities(
        &self,
        activity_ids: &[String],
    ) -> AppResult<Vec<activity_schedule::Model>> {
        if activity_ids.is_empty() {
            return Ok(vec![]);
        }

        ActivitySchedule::find()
            .filter(activity_schedule::Column::ActivityId.is_in(activity_ids.to_vec()))
            .order_by_asc(activity_schedule::Column::EventStartAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find schedules by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<activity_schedule::Model>> {
        Self::find_by_ids_in(self.db.as_ref(), ids).await
    }

    /// Find schedules by IDs on the given connection, without locking.
    pub async fn find_by_ids_in<C: ConnectionTrait>(
        conn: &C,
        ids: &[String],
    ) -> AppResult<Vec<activity_schedule::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        ActivitySchedule::find()
            .filter(activity_schedule::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(activity_schedule::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Lock schedule rows (`FOR UPDATE`) in ascending id order.
    ///
    /// Concurrent joins over overlapping schedule sets acquire locks in the
    /// same order and therefore cannot deadlock.
    pub async fn lock_by_ids<C: ConnectionTrait>(
        conn: &C,
        ids: &[String],
    ) -> AppResult<Vec<activity_schedule::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        ActivitySchedule::find()
            .filter(activity_schedule::Column::Id.is_in(ids.to_vec()))
            .order_by_asc(activity_schedule::Column::Id)
            .lock_exclusive()
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a schedule on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: activity_schedule::ActiveModel,
    ) -> AppResult<activity_schedule::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn schedule(id: &str) -> activity_schedule::Model {
        activity_schedule::Model {
            id: id.to_string(),
            activity_id: "act1".to_string(),
            event_start_at: (Utc::now() + Duration::days(7)).into(),
            price: 10_000,
            max_users: 2,
        }
    }

    #[tokio::test]
    async fn test_lock_by_ids_orders_and_locks() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[schedule("a"), schedule("b")]])
            .into_connection();

        let ids = vec!["b".to_string(), "a".to_string()];
        let locked = ActivityScheduleRepository::lock_by_ids(&db, &ids)
            .await
            .unwrap();
        assert_eq!(locked.len(), 2);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("ORDER BY"));
        assert!(log.contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_lock_by_ids_empty_skips_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let locked = ActivityScheduleRepository::lock_by_ids(&db, &[]).await.unwrap();
        assert!(locked.is_empty());
    }
}
