//! Registration repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{
    Registration,
    registration::{self, PaymentStatus},
};
use enrollo_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

#[derive(Debug, FromQueryResult)]
struct ScheduleCount {
    schedule_id: String,
    registered: i64,
}

/// Registration repository for database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    db: Arc<DatabaseConnection>,
}

impl RegistrationRepository {
    /// Create a new registration repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a registration by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<registration::Model>> {
        Self::find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find a registration by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<registration::Model>> {
        Registration::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count registrations that occupy a seat (pending or approved).
    pub async fn count_holding_seat_in<C: ConnectionTrait>(
        conn: &C,
        schedule_id: &str,
    ) -> AppResult<u64> {
        Registration::find()
            .filter(registration::Column::ScheduleId.eq(schedule_id))
            .filter(registration::Column::PaymentStatus.ne(PaymentStatus::Rejected))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Seat-holding registration counts for several schedules.
    ///
    /// Schedules without registrations are absent from the map.
    pub async fn count_holding_seat_by_schedules(
        &self,
        schedule_ids: &[String],
    ) -> AppResult<HashMap<String, u64>> {
        if schedule_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Registration::find()
            .select_only()
            .column(registration::Column::ScheduleId)
            .column_as(registration::Column::Id.count(), "registered")
            .filter(registration::Column::ScheduleId.is_in(schedule_ids.to_vec()))
            .filter(registration::Column::PaymentStatus.ne(PaymentStatus::Rejected))
            .group_by(registration::Column::ScheduleId)
            .into_model::<ScheduleCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.schedule_id, row.registered.max(0) as u64))
            .collect())
    }

    /// Registrations a student already holds among the given schedules.
    pub async fn find_existing_in<C: ConnectionTrait>(
        conn: &C,
        student_information_id: &str,
        schedule_ids: &[String],
    ) -> AppResult<Vec<registration::Model>> {
        if schedule_ids.is_empty() {
            return Ok(vec![]);
        }

        Registration::find()
            .filter(registration::Column::StudentInformationId.eq(student_information_id))
            .filter(registration::Column::ScheduleId.is_in(schedule_ids.to_vec()))
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a registration on the given connection.
    pub async fn create_in<C: ConnectionTrait>(
        conn: &C,
        model: registration::ActiveModel,
    ) -> AppResult<registration::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::from_db(e, "Already registered for this schedule"))
    }

    /// Overwrite the payment status of a registration.
    pub async fn set_status(
        &self,
        current: registration::Model,
        status: PaymentStatus,
    ) -> AppResult<registration::Model> {
        Self::set_status_in(self.db.as_ref(), current, status).await
    }

    /// Overwrite the payment status on the given connection.
    pub async fn set_status_in<C: ConnectionTrait>(
        conn: &C,
        current: registration::Model,
        status: PaymentStatus,
    ) -> AppResult<registration::Model> {
        let mut active: registration::ActiveModel = current.into();
        active.payment_status = Set(status);
        active.updated_at = Set(chrono::Utc::now().into());
        active
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Registrations with the given status across schedules, oldest first.
    pub async fn find_by_schedules_and_status(
        &self,
        schedule_ids: &[String],
        status: PaymentStatus,
    ) -> AppResult<Vec<registration::Model>> {
        if schedule_ids.is_empty() {
            return Ok(vec![]);
        }

        Registration::find()
            .filter(registration::Column::ScheduleId.is_in(schedule_ids.to_vec()))
            .filter(registration::Column::PaymentStatus.eq(status))
            .order_by_asc(registration::Column::CreatedAt)
            .order_by_asc(registration::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
