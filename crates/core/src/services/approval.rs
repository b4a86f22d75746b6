//! Admin review of registrations.

use std::collections::HashMap;
use std::sync::Arc;

use enrollo_common::{AppError, AppResult};
use enrollo_db::{
    entities::{
        registration::{self, PaymentStatus},
        student_information,
    },
    repositories::{
        ActivityRepository, ActivityScheduleRepository, RegistrationRepository,
        StudentInformationRepository, UserRepository,
    },
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;

use super::{eligibility::check_capacity, file::FileService};

/// Account that owns a registered student profile.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrantAccount {
    /// User ID.
    pub id: String,
    /// Login e-mail.
    pub email: String,
    /// Display name.
    pub display_name: String,
}

/// A pending registration with what an admin needs to review it.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRegistration {
    /// Registration row.
    #[serde(flatten)]
    pub registration: registration::Model,
    /// Start of the registered schedule.
    pub event_start_at: chrono::DateTime<chrono::FixedOffset>,
    /// Registered student.
    pub student: Option<student_information::Model>,
    /// Paying account.
    pub account: Option<RegistrantAccount>,
    /// Time-limited URL of the payment proof, if one was uploaded.
    pub payment_proof_url: Option<String>,
}

/// Registration approval service.
#[derive(Clone)]
pub struct ApprovalService {
    db: Arc<DatabaseConnection>,
    registration_repo: RegistrationRepository,
    activity_repo: ActivityRepository,
    schedule_repo: ActivityScheduleRepository,
    student_repo: StudentInformationRepository,
    user_repo: UserRepository,
    file_service: FileService,
}

impl ApprovalService {
    /// Create a new approval service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        registration_repo: RegistrationRepository,
        activity_repo: ActivityRepository,
        schedule_repo: ActivityScheduleRepository,
        student_repo: StudentInformationRepository,
        user_repo: UserRepository,
        file_service: FileService,
    ) -> Self {
        Self {
            db,
            registration_repo,
            activity_repo,
            schedule_repo,
            student_repo,
            user_repo,
            file_service,
        }
    }

    /// Set a registration to approved or rejected.
    ///
    /// Repeating the current status is a no-op. A later decision overwrites
    /// an earlier one; a rejected registration stops holding a seat and only
    /// gets it back while the schedule has room.
    pub async fn update_registration_status(
        &self,
        registration_id: &str,
        status: PaymentStatus,
    ) -> AppResult<registration::Model> {
        if status == PaymentStatus::Pending {
            return Err(AppError::BadRequest(
                "Status must be approved or rejected".to_string(),
            ));
        }

        let current = self
            .registration_repo
            .find_by_id(registration_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration: {registration_id}")))?;

        if current.payment_status == status {
            return Ok(current);
        }

        let previous = current.payment_status;
        let updated = if !previous.holds_seat() && status.holds_seat() {
            self.reclaim_seat(current, status).await?
        } else {
            self.registration_repo.set_status(current, status).await?
        };

        tracing::info!(
            registration_id = %registration_id,
            schedule_id = %updated.schedule_id,
            from = ?previous,
            to = ?status,
            "Registration status updated"
        );

        Ok(updated)
    }

    /// Move a registration back onto its schedule. The schedule row is
    /// locked so the capacity check and the write cannot interleave with a
    /// concurrent join.
    async fn reclaim_seat(
        &self,
        current: registration::Model,
        status: PaymentStatus,
    ) -> AppResult<registration::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let schedule = ActivityScheduleRepository::lock_by_ids(
            &txn,
            std::slice::from_ref(&current.schedule_id),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("Schedule: {}", current.schedule_id)))?;

        // Re-read under the lock; another admin may have decided meanwhile
        let current = RegistrationRepository::find_by_id_in(&txn, &current.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration: {}", current.id)))?;
        if current.payment_status == status {
            return Ok(current);
        }
        if !current.payment_status.holds_seat() {
            let registered =
                RegistrationRepository::count_holding_seat_in(&txn, &schedule.id).await?;
            check_capacity(&schedule, registered)?;
        }

        let updated = RegistrationRepository::set_status_in(&txn, current, status).await?;
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(updated)
    }

    /// Pending registrations of every schedule of an activity, oldest first.
    pub async fn list_pending(&self, activity_id: &str) -> AppResult<Vec<PendingRegistration>> {
        self.activity_repo.get_by_id(activity_id).await?;

        let schedules = self.schedule_repo.find_by_activity(activity_id).await?;
        let starts: HashMap<String, _> = schedules
            .iter()
            .map(|s| (s.id.clone(), s.event_start_at))
            .collect();
        let schedule_ids: Vec<String> = schedules.into_iter().map(|s| s.id).collect();

        let pending = self
            .registration_repo
            .find_by_schedules_and_status(&schedule_ids, PaymentStatus::Pending)
            .await?;
        if pending.is_empty() {
            return Ok(vec![]);
        }

        let student_ids: Vec<String> = pending
            .iter()
            .map(|r| r.student_information_id.clone())
            .collect();
        let students: HashMap<String, student_information::Model> = self
            .student_repo
            .find_by_ids(&student_ids)
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let user_ids: Vec<String> = students.values().map(|s| s.user_id.clone()).collect();
        let accounts: HashMap<String, RegistrantAccount> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| {
                (
                    u.id.clone(),
                    RegistrantAccount {
                        id: u.id,
                        email: u.email,
                        display_name: u.display_name,
                    },
                )
            })
            .collect();

        let file_ids: Vec<String> = pending
            .iter()
            .filter_map(|r| r.payment_file_id.clone())
            .collect();
        let mut proof_urls = HashMap::new();
        for file in self.file_service.find_by_ids(&file_ids).await? {
            let url = self.file_service.signed_url(&file)?;
            proof_urls.insert(file.id, url);
        }

        let mut result = Vec::with_capacity(pending.len());
        for registration in pending {
            let Some(event_start_at) = starts.get(&registration.schedule_id).copied() else {
                continue;
            };
            let student = students.get(&registration.student_information_id).cloned();
            let account = student
                .as_ref()
                .and_then(|s| accounts.get(&s.user_id))
                .cloned();
            let payment_proof_url = registration
                .payment_file_id
                .as_ref()
                .and_then(|id| proof_urls.get(id))
                .cloned();

            result.push(PendingRegistration {
                registration,
                event_start_at,
                student,
                account,
                payment_proof_url,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::eligibility::tests::{count_row, future_schedule};
    use chrono::Utc;
    use enrollo_common::LocalStorage;
    use enrollo_db::{entities::activity, repositories::FileRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn registration(status: PaymentStatus) -> registration::Model {
        registration::Model {
            id: "reg1".to_string(),
            schedule_id: "s1".to_string(),
            student_information_id: "stu1".to_string(),
            payment_status: status,
            payment_file_id: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service(registration_db: MockDatabase, activity_db: MockDatabase) -> ApprovalService {
        let registration_db = Arc::new(registration_db.into_connection());
        let db = Arc::clone(&registration_db);
        let activity_db = Arc::new(activity_db.into_connection());
        let empty = || Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let dir = std::env::temp_dir().join(format!("enrollo-approval-{}", uuid::Uuid::new_v4()));
        let storage = Arc::new(LocalStorage::new(dir, "/files".to_string(), "s".to_string()));

        ApprovalService::new(
            db,
            RegistrationRepository::new(registration_db),
            ActivityRepository::new(activity_db),
            ActivityScheduleRepository::new(empty()),
            StudentInformationRepository::new(empty()),
            UserRepository::new(empty()),
            FileService::new(FileRepository::new(empty()), storage, "enrollo".to_string(), 60),
        )
    }

    #[tokio::test]
    async fn test_approve_pending_registration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[registration(PaymentStatus::Pending)]])
            .append_query_results([[registration(PaymentStatus::Approved)]]);
        let service = service(db, MockDatabase::new(DatabaseBackend::Postgres));

        let updated = service
            .update_registration_status("reg1", PaymentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Approved);
    }

    #[tokio::test]
    async fn test_same_status_is_noop() {
        // only the lookup is answered; a write would exhaust the mock
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[registration(PaymentStatus::Rejected)]]);
        let service = service(db, MockDatabase::new(DatabaseBackend::Postgres));

        let updated = service
            .update_registration_status("reg1", PaymentStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Rejected);
    }

    #[tokio::test]
    async fn test_reapprove_rejected_on_full_schedule() {
        // the seat freed by the rejection was taken by another join
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[registration(PaymentStatus::Rejected)]])
            .append_query_results([[future_schedule("s1", Utc::now(), 1)]])
            .append_query_results([[registration(PaymentStatus::Rejected)]])
            .append_query_results([[count_row(1)]]);
        let service = service(db, MockDatabase::new(DatabaseBackend::Postgres));

        match service
            .update_registration_status("reg1", PaymentStatus::Approved)
            .await
        {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Schedule is full"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reapprove_rejected_with_room_locks_schedule() {
        let conn = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[registration(PaymentStatus::Rejected)]])
                .append_query_results([[future_schedule("s1", Utc::now(), 2)]])
                .append_query_results([[registration(PaymentStatus::Rejected)]])
                .append_query_results([[count_row(1)]])
                .append_query_results([[registration(PaymentStatus::Approved)]])
                .into_connection(),
        );
        let empty = || Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let dir = std::env::temp_dir().join(format!("enrollo-approval-{}", uuid::Uuid::new_v4()));
        let storage = Arc::new(LocalStorage::new(dir, "/files".to_string(), "s".to_string()));
        let service = ApprovalService::new(
            Arc::clone(&conn),
            RegistrationRepository::new(Arc::clone(&conn)),
            ActivityRepository::new(empty()),
            ActivityScheduleRepository::new(empty()),
            StudentInformationRepository::new(empty()),
            UserRepository::new(empty()),
            FileService::new(FileRepository::new(empty()), storage, "enrollo".to_string(), 60),
        );

        let updated = service
            .update_registration_status("reg1", PaymentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Approved);

        drop(service);
        let conn = Arc::try_unwrap(conn).ok().unwrap();
        let log = format!("{:?}", conn.into_transaction_log());
        assert!(log.contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_reject_approved_skips_capacity() {
        // only the lookup and the update are answered
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[registration(PaymentStatus::Approved)]])
            .append_query_results([[registration(PaymentStatus::Rejected)]]);
        let service = service(db, MockDatabase::new(DatabaseBackend::Postgres));

        let updated = service
            .update_registration_status("reg1", PaymentStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Rejected);
    }

    #[tokio::test]
    async fn test_unknown_registration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<registration::Model>::new()]);
        let service = service(db, MockDatabase::new(DatabaseBackend::Postgres));

        assert!(matches!(
            service
                .update_registration_status("missing", PaymentStatus::Approved)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_is_not_a_decision() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );
        assert!(matches!(
            service
                .update_registration_status("reg1", PaymentStatus::Pending)
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_list_pending_unknown_activity() {
        let activity_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<activity::Model>::new()]);
        let service = service(MockDatabase::new(DatabaseBackend::Postgres), activity_db);

        assert!(matches!(
            service.list_pending("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
