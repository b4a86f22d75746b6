//! Capacity and eligibility checks for joining activity schedules.
//!
//! The same checks run twice during a join: once on a plain connection to
//! fail fast, and again inside the write transaction with the schedule rows
//! locked, so the capacity count cannot change between check and insert.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use enrollo_common::{AppError, AppResult};
use enrollo_db::{
    entities::{activity, activity_schedule, student_information},
    repositories::{
        ActivityRepository, ActivityScheduleRepository, RegistrationRepository,
        StudentInformationRepository,
    },
};
use sea_orm::ConnectionTrait;

/// A request to register one student for one or more schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Requesting account.
    pub user_id: String,
    /// Activity the schedules belong to.
    pub activity_id: String,
    /// Distinct schedule IDs in ascending order.
    pub schedule_ids: Vec<String>,
    /// Student profile being registered.
    pub student_information_id: String,
}

impl JoinRequest {
    /// Build a request, collapsing duplicate schedule IDs.
    pub fn new(
        user_id: impl Into<String>,
        activity_id: impl Into<String>,
        schedule_ids: impl IntoIterator<Item = String>,
        student_information_id: impl Into<String>,
    ) -> AppResult<Self> {
        let schedule_ids: Vec<String> = schedule_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if schedule_ids.is_empty() {
            return Err(AppError::BadRequest(
                "At least one schedule is required".to_string(),
            ));
        }

        Ok(Self {
            user_id: user_id.into(),
            activity_id: activity_id.into(),
            schedule_ids,
            student_information_id: student_information_id.into(),
        })
    }
}

/// Activity must be approved and `now` inside its registration window.
pub fn check_registration_window(activity: &activity::Model, now: DateTime<Utc>) -> AppResult<()> {
    if !activity.approved {
        return Err(AppError::Forbidden("Activity is not open yet".to_string()));
    }

    let open_at = activity.registration_open_at.with_timezone(&Utc);
    let close_at = activity.registration_close_at.with_timezone(&Utc);
    if now < open_at || now > close_at {
        return Err(AppError::Forbidden("Registration is closed".to_string()));
    }
    Ok(())
}

/// Schedule must belong to the activity and not have started.
pub fn check_schedule(
    activity_id: &str,
    schedule: &activity_schedule::Model,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if schedule.activity_id != activity_id {
        return Err(AppError::NotFound(format!("Schedule: {}", schedule.id)));
    }
    if schedule.event_start_at.with_timezone(&Utc) <= now {
        return Err(AppError::Forbidden(
            "Schedule has already started".to_string(),
        ));
    }
    Ok(())
}

/// A seat must remain on the schedule.
pub fn check_capacity(schedule: &activity_schedule::Model, registered: u64) -> AppResult<()> {
    let max_users = u64::try_from(schedule.max_users).unwrap_or(0);
    if registered >= max_users {
        return Err(AppError::Forbidden("Schedule is full".to_string()));
    }
    Ok(())
}

/// Student profile must belong to the requesting account.
pub fn check_student_owner(
    student: &student_information::Model,
    user_id: &str,
) -> AppResult<()> {
    if student.user_id != user_id {
        return Err(AppError::Forbidden(
            "Student information does not belong to you".to_string(),
        ));
    }
    Ok(())
}

/// Runs the join checks against a connection.
pub struct EligibilityChecker;

impl EligibilityChecker {
    /// Validate a join request and return the target schedules.
    ///
    /// With `lock` set, schedule rows are taken `FOR UPDATE` in ascending id
    /// order; the caller must be inside a transaction.
    pub async fn check<C: ConnectionTrait>(
        conn: &C,
        request: &JoinRequest,
        now: DateTime<Utc>,
        lock: bool,
    ) -> AppResult<Vec<activity_schedule::Model>> {
        let activity = ActivityRepository::find_by_id_in(conn, &request.activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity: {}", request.activity_id)))?;
        check_registration_window(&activity, now)?;

        let schedules = if lock {
            ActivityScheduleRepository::lock_by_ids(conn, &request.schedule_ids).await?
        } else {
            ActivityScheduleRepository::find_by_ids_in(conn, &request.schedule_ids).await?
        };
        for schedule_id in &request.schedule_ids {
            let schedule = schedules
                .iter()
                .find(|s| &s.id == schedule_id)
                .ok_or_else(|| AppError::NotFound(format!("Schedule: {schedule_id}")))?;
            check_schedule(&activity.id, schedule, now)?;
        }

        let student =
            StudentInformationRepository::find_by_id_in(conn, &request.student_information_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Student information: {}",
                        request.student_information_id
                    ))
                })?;
        check_student_owner(&student, &request.user_id)?;

        let existing = RegistrationRepository::find_existing_in(
            conn,
            &request.student_information_id,
            &request.schedule_ids,
        )
        .await?;
        if !existing.is_empty() {
            return Err(AppError::Conflict(
                "Already registered for this schedule".to_string(),
            ));
        }

        for schedule in &schedules {
            let registered = RegistrationRepository::count_holding_seat_in(conn, &schedule.id).await?;
            check_capacity(schedule, registered)?;
        }

        Ok(schedules)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use enrollo_db::entities::registration::{self, PaymentStatus};
    use sea_orm::{DatabaseBackend, MockDatabase};

    pub(crate) fn open_activity(now: DateTime<Utc>) -> activity::Model {
        activity::Model {
            id: "act1".to_string(),
            owner_id: "owner".to_string(),
            title: "Robotics camp".to_string(),
            thumbnail_file_id: "thumb".to_string(),
            description: "desc".to_string(),
            description_short: "short".to_string(),
            approved: true,
            registration_open_at: (now - Duration::days(1)).into(),
            registration_close_at: (now + Duration::days(1)).into(),
            created_at: (now - Duration::days(2)).into(),
        }
    }

    pub(crate) fn future_schedule(id: &str, now: DateTime<Utc>, max_users: i32) -> activity_schedule::Model {
        activity_schedule::Model {
            id: id.to_string(),
            activity_id: "act1".to_string(),
            event_start_at: (now + Duration::days(7)).into(),
            price: 10_000,
            max_users,
        }
    }

    pub(crate) fn student(user_id: &str) -> student_information::Model {
        student_information::Model {
            id: "stu1".to_string(),
            user_id: user_id.to_string(),
            prefix: "Ms.".to_string(),
            full_name: "Jane Doe".to_string(),
            education_level: 3,
            school: "Central School".to_string(),
            food_allergies: None,
            parent_name: "John Doe".to_string(),
            parent_email: "parent@example.com".to_string(),
            secondary_email: None,
            phone_number: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    pub(crate) fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    fn request() -> JoinRequest {
        JoinRequest::new("user1", "act1", vec!["s1".to_string()], "stu1").unwrap()
    }

    #[test]
    fn test_join_request_dedupes_schedules() {
        let req = JoinRequest::new(
            "u",
            "a",
            vec!["s2".to_string(), "s1".to_string(), "s2".to_string()],
            "stu",
        )
        .unwrap();
        assert_eq!(req.schedule_ids, vec!["s1".to_string(), "s2".to_string()]);

        assert!(matches!(
            JoinRequest::new("u", "a", Vec::<String>::new(), "stu"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_registration_window_bounds_inclusive() {
        let now = Utc::now();
        let mut activity = open_activity(now);
        activity.registration_open_at = now.into();
        assert!(check_registration_window(&activity, now).is_ok());

        activity.registration_open_at = (now - Duration::days(1)).into();
        activity.registration_close_at = now.into();
        assert!(check_registration_window(&activity, now).is_ok());

        activity.registration_close_at = (now - Duration::seconds(1)).into();
        assert!(matches!(
            check_registration_window(&activity, now),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_unapproved_activity_forbidden() {
        let now = Utc::now();
        let mut activity = open_activity(now);
        activity.approved = false;
        assert!(matches!(
            check_registration_window(&activity, now),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_started_schedule_forbidden() {
        let now = Utc::now();
        let mut schedule = future_schedule("s1", now, 5);
        schedule.event_start_at = now.into();
        assert!(matches!(
            check_schedule("act1", &schedule, now),
            Err(AppError::Forbidden(_))
        ));

        let other = future_schedule("s2", now, 5);
        assert!(matches!(
            check_schedule("act2", &other, now),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_capacity_boundary() {
        let schedule = future_schedule("s1", Utc::now(), 2);
        assert!(check_capacity(&schedule, 1).is_ok());
        match check_capacity(&schedule, 2) {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Schedule is full"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_passes() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_activity(now)]])
            .append_query_results([[future_schedule("s1", now, 2)]])
            .append_query_results([[student("user1")]])
            .append_query_results([Vec::<registration::Model>::new()])
            .append_query_results([[count_row(1)]])
            .into_connection();

        let schedules = EligibilityChecker::check(&db, &request(), now, false)
            .await
            .unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].id, "s1");
    }

    #[tokio::test]
    async fn test_check_missing_schedule() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_activity(now)]])
            .append_query_results([Vec::<activity_schedule::Model>::new()])
            .into_connection();

        let result = EligibilityChecker::check(&db, &request(), now, false).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_check_foreign_student() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_activity(now)]])
            .append_query_results([[future_schedule("s1", now, 2)]])
            .append_query_results([[student("someone-else")]])
            .into_connection();

        let result = EligibilityChecker::check(&db, &request(), now, false).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_check_duplicate_registration() {
        let now = Utc::now();
        let existing = registration::Model {
            id: "reg1".to_string(),
            schedule_id: "s1".to_string(),
            student_information_id: "stu1".to_string(),
            payment_status: PaymentStatus::Pending,
            payment_file_id: None,
            created_at: now.into(),
            updated_at: now.into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_activity(now)]])
            .append_query_results([[future_schedule("s1", now, 2)]])
            .append_query_results([[student("user1")]])
            .append_query_results([[existing]])
            .into_connection();

        let result = EligibilityChecker::check(&db, &request(), now, false).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_check_full_schedule_with_lock() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open_activity(now)]])
            .append_query_results([[future_schedule("s1", now, 1)]])
            .append_query_results([[student("user1")]])
            .append_query_results([Vec::<registration::Model>::new()])
            .append_query_results([[count_row(1)]])
            .into_connection();

        let result = EligibilityChecker::check(&db, &request(), now, true).await;
        match result {
            Err(AppError::Forbidden(msg)) => assert_eq!(msg, "Schedule is full"),
            other => panic!("Expected Forbidden, got {other:?}"),
        }
        assert!(format!("{:?}", db.into_transaction_log()).contains("FOR UPDATE"));
    }
}
