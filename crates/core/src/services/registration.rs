//! Join workflow: register a student for one or more schedules.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use enrollo_common::{AppError, AppResult, IdGenerator, StoredObject};
use enrollo_db::{
    entities::registration::{self, PaymentStatus},
    repositories::RegistrationRepository,
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};

use super::{
    eligibility::{EligibilityChecker, JoinRequest},
    file::{FileService, FileUpload},
};

/// Registration service.
#[derive(Clone)]
pub struct RegistrationService {
    db: Arc<DatabaseConnection>,
    file_service: FileService,
    id_gen: IdGenerator,
}

impl RegistrationService {
    /// Create a new registration service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, file_service: FileService) -> Self {
        Self {
            db,
            file_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a student for every requested schedule, or for none.
    ///
    /// Registrations start as pending; payment is reviewed by an admin and
    /// the balance is not touched here.
    pub async fn join_activity(
        &self,
        request: JoinRequest,
        payment_proof: Option<FileUpload>,
    ) -> AppResult<Vec<registration::Model>> {
        let now = Utc::now();

        // Fail fast before writing the proof object.
        EligibilityChecker::check(self.db.as_ref(), &request, now, false).await?;

        let stored = match &payment_proof {
            Some(upload) => Some(self.file_service.store_object(upload).await?),
            None => None,
        };
        let proof = payment_proof.as_ref().zip(stored.as_ref());

        match self.persist(&request, proof, now).await {
            Ok(created) => {
                tracing::info!(
                    user_id = %request.user_id,
                    activity_id = %request.activity_id,
                    student_information_id = %request.student_information_id,
                    schedules = created.len(),
                    "Registered for activity"
                );
                Ok(created)
            }
            Err(e) => {
                if let Some(stored) = &stored {
                    self.file_service.discard_object(stored).await;
                }
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        request: &JoinRequest,
        proof: Option<(&FileUpload, &StoredObject)>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<registration::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let schedules = EligibilityChecker::check(&txn, request, now, true).await?;

        let payment_file_id = match proof {
            Some((upload, stored)) => Some(self.file_service.record_in(&txn, upload, stored).await?.id),
            None => None,
        };

        let mut created = Vec::with_capacity(schedules.len());
        for schedule in &schedules {
            let model = registration::ActiveModel {
                id: Set(self.id_gen.generate()),
                schedule_id: Set(schedule.id.clone()),
                student_information_id: Set(request.student_information_id.clone()),
                payment_status: Set(PaymentStatus::Pending),
                payment_file_id: Set(payment_file_id.clone()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            created.push(RegistrationRepository::create_in(&txn, model).await?);
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::eligibility::tests::{count_row, future_schedule, open_activity, student};
    use enrollo_common::LocalStorage;
    use enrollo_db::{entities::file, repositories::FileRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn file_service() -> FileService {
        let dir = std::env::temp_dir().join(format!("enrollo-join-{}", uuid::Uuid::new_v4()));
        let storage = Arc::new(LocalStorage::new(dir, "/files".to_string(), "s".to_string()));
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        FileService::new(FileRepository::new(db), storage, "enrollo".to_string(), 60)
    }

    fn pending(id: &str, schedule_id: &str, payment_file_id: Option<&str>) -> registration::Model {
        registration::Model {
            id: id.to_string(),
            schedule_id: schedule_id.to_string(),
            student_information_id: "stu1".to_string(),
            payment_status: PaymentStatus::Pending,
            payment_file_id: payment_file_id.map(str::to_string),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    /// Query results for one pass of the eligibility checks.
    fn eligible(db: MockDatabase, now: DateTime<Utc>, schedule_ids: &[&str]) -> MockDatabase {
        let schedules: Vec<_> = schedule_ids
            .iter()
            .map(|id| future_schedule(id, now, 2))
            .collect();
        let mut db = db
            .append_query_results([[open_activity(now)]])
            .append_query_results([schedules])
            .append_query_results([[student("user1")]])
            .append_query_results([Vec::<registration::Model>::new()]);
        for _ in schedule_ids {
            db = db.append_query_results([[count_row(0)]]);
        }
        db
    }

    #[tokio::test]
    async fn test_join_two_schedules() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let db = eligible(db, now, &["s1", "s2"]);
        let db = eligible(db, now, &["s1", "s2"])
            .append_query_results([[pending("r1", "s1", None)]])
            .append_query_results([[pending("r2", "s2", None)]]);

        let service = RegistrationService::new(Arc::new(db.into_connection()), file_service());
        let request = JoinRequest::new(
            "user1",
            "act1",
            vec!["s2".to_string(), "s1".to_string()],
            "stu1",
        )
        .unwrap();

        let created = service.join_activity(request, None).await.unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|r| r.payment_status == PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn test_join_with_proof_records_file() {
        let now = Utc::now();
        let proof_row = file::Model {
            id: "proof1".to_string(),
            bucket: "enrollo".to_string(),
            key: "k.png".to_string(),
            filename: "slip.png".to_string(),
            mimetype: "image/png".to_string(),
            size: 3,
            created_at: now.into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let db = eligible(db, now, &["s1"]);
        let db = eligible(db, now, &["s1"])
            .append_query_results([[proof_row]])
            .append_query_results([[pending("r1", "s1", Some("proof1"))]]);

        let service = RegistrationService::new(Arc::new(db.into_connection()), file_service());
        let request = JoinRequest::new("user1", "act1", vec!["s1".to_string()], "stu1").unwrap();
        let proof = FileUpload {
            filename: "slip.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };

        let created = service.join_activity(request, Some(proof)).await.unwrap();
        assert_eq!(created[0].payment_file_id.as_deref(), Some("proof1"));
    }

    #[tokio::test]
    async fn test_join_full_under_lock() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let db = eligible(db, now, &["s1"])
            // another join took the last seats between the two passes
            .append_query_results([[open_activity(now)]])
            .append_query_results([[future_schedule("s1", now, 2)]])
            .append_query_results([[student("user1")]])
            .append_query_results([Vec::<registration::Model>::new()])
            .append_query_results([[count_row(2)]]);

        let service = RegistrationService::new(Arc::new(db.into_connection()), file_service());
        let request = JoinRequest::new("user1", "act1", vec!["s1".to_string()], "stu1").unwrap();

        match service.join_activity(request, None).await {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Schedule is full"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_join_is_all_or_nothing() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let db = eligible(db, now, &["s1", "s2"])
            // s2 filled up before the locked pass
            .append_query_results([[open_activity(now)]])
            .append_query_results([[future_schedule("s1", now, 2), future_schedule("s2", now, 2)]])
            .append_query_results([[student("user1")]])
            .append_query_results([Vec::<registration::Model>::new()])
            .append_query_results([[count_row(0)]])
            .append_query_results([[count_row(2)]]);

        let conn = Arc::new(db.into_connection());
        let service = RegistrationService::new(Arc::clone(&conn), file_service());
        let request = JoinRequest::new(
            "user1",
            "act1",
            vec!["s1".to_string(), "s2".to_string()],
            "stu1",
        )
        .unwrap();

        assert!(matches!(
            service.join_activity(request, None).await,
            Err(AppError::Forbidden(_))
        ));

        drop(service);
        let conn = Arc::try_unwrap(conn).ok().unwrap();
        let log = format!("{:?}", conn.into_transaction_log());
        assert!(!log.contains(r#"INSERT INTO "registrations""#));
    }
}
