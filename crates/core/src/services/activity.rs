//! Activity service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use enrollo_common::{AppError, AppResult, IdGenerator, StoredObject};
use enrollo_db::{
    entities::{
        activity, activity_file::{self, ActivityFileType}, activity_schedule, file,
    },
    repositories::{
        ActivityFileRepository, ActivityRepository, ActivityScheduleRepository,
        RegistrationRepository,
    },
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::file::{FileService, FileUpload};

/// One schedule of a new activity.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSchedule {
    /// When the session starts.
    pub event_start_at: DateTime<Utc>,

    /// Price in minor currency units.
    #[validate(range(min = 0))]
    pub price: i64,

    /// Seat cap.
    #[validate(range(min = 1))]
    pub max_users: i32,
}

/// Input for creating an activity.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateActivityInput {
    /// Title.
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    /// Full description.
    #[validate(length(min = 1))]
    pub description: String,

    /// Teaser shown in listings.
    #[validate(length(min = 1, max = 512))]
    pub description_short: String,

    /// Registration opens.
    pub registration_open_at: DateTime<Utc>,

    /// Registration closes.
    pub registration_close_at: DateTime<Utc>,

    /// Alternate sessions, each with its own price and capacity.
    #[validate(length(min = 1, max = 32), nested)]
    pub schedules: Vec<NewSchedule>,
}

impl CreateActivityInput {
    /// Field checks plus the ordering of the registration window and events.
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;

        if self.registration_close_at <= self.registration_open_at {
            return Err(AppError::Validation(
                "registration_close_at must be after registration_open_at".to_string(),
            ));
        }
        if self
            .schedules
            .iter()
            .any(|s| s.event_start_at <= self.registration_close_at)
        {
            return Err(AppError::Validation(
                "Every schedule must start after registration closes".to_string(),
            ));
        }
        Ok(())
    }
}

/// A file to attach to a new activity.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    /// File contents.
    pub upload: FileUpload,
    /// Label shown instead of the file name.
    pub display_name: Option<String>,
}

/// Lowest and highest schedule price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    /// Cheapest schedule.
    pub min: i64,
    /// Most expensive schedule.
    pub max: i64,
}

/// Single price when there is one schedule, a range when there are more.
#[must_use]
pub fn price_summary(prices: &[i64]) -> (Option<i64>, Option<PriceRange>) {
    match prices {
        [] => (None, None),
        [price] => (Some(*price), None),
        _ => {
            let min = prices.iter().copied().min().unwrap_or_default();
            let max = prices.iter().copied().max().unwrap_or_default();
            (None, Some(PriceRange { min, max }))
        }
    }
}

/// Seats left on a schedule.
#[must_use]
pub fn available_spots(max_users: i32, registered: u64) -> u64 {
    u64::try_from(max_users)
        .unwrap_or(0)
        .saturating_sub(registered)
}

/// Activity as shown in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    /// Activity row.
    #[serde(flatten)]
    pub activity: activity::Model,
    /// Signed thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Seats held across all schedules.
    pub users_registered: u64,
    /// Price when there is a single schedule.
    pub price: Option<i64>,
    /// Price span when there are several.
    pub price_range: Option<PriceRange>,
    /// Earliest upcoming session.
    pub next_event_start_at: Option<DateTime<FixedOffset>>,
}

/// Schedule with its seat usage.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDetail {
    /// Schedule row.
    #[serde(flatten)]
    pub schedule: activity_schedule::Model,
    /// Seats held.
    pub users_registered: u64,
    /// Seats left, never below zero.
    pub available_spots: u64,
}

/// Attached file with a download URL.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentDetail {
    /// Link ID.
    pub id: String,
    /// Stored file ID.
    pub file_id: String,
    /// Thumbnail or attachment.
    pub file_type: ActivityFileType,
    /// Optional label.
    pub display_name: Option<String>,
    /// Original file name.
    pub filename: String,
    /// MIME type.
    pub mimetype: String,
    /// Size in bytes.
    pub size: i64,
    /// Signed download URL.
    pub url: String,
}

/// Full activity view.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityDetail {
    /// Activity row.
    #[serde(flatten)]
    pub activity: activity::Model,
    /// Signed thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Seats held across all schedules.
    pub users_registered: u64,
    /// Price when there is a single schedule.
    pub price: Option<i64>,
    /// Price span when there are several.
    pub price_range: Option<PriceRange>,
    /// Attached files.
    pub attachments: Vec<AttachmentDetail>,
    /// Sessions with their seat usage.
    pub schedules: Vec<ScheduleDetail>,
}

/// Activity service.
#[derive(Clone)]
pub struct ActivityService {
    db: Arc<DatabaseConnection>,
    activity_repo: ActivityRepository,
    schedule_repo: ActivityScheduleRepository,
    activity_file_repo: ActivityFileRepository,
    registration_repo: RegistrationRepository,
    file_service: FileService,
    id_gen: IdGenerator,
}

impl ActivityService {
    /// Create a new activity service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        activity_repo: ActivityRepository,
        schedule_repo: ActivityScheduleRepository,
        activity_file_repo: ActivityFileRepository,
        registration_repo: RegistrationRepository,
        file_service: FileService,
    ) -> Self {
        Self {
            db,
            activity_repo,
            schedule_repo,
            activity_file_repo,
            registration_repo,
            file_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an unapproved activity with its schedules and attachments.
    pub async fn create_activity(
        &self,
        owner_id: &str,
        input: CreateActivityInput,
        thumbnail: FileUpload,
        attachments: Vec<NewAttachment>,
    ) -> AppResult<activity::Model> {
        input.check()?;
        if !thumbnail.is_image() {
            return Err(AppError::BadRequest("Thumbnail must be an image".to_string()));
        }

        let mut stored = Vec::with_capacity(attachments.len() + 1);
        let result = self
            .store_and_insert(owner_id, &input, &thumbnail, &attachments, &mut stored)
            .await;

        if result.is_err() {
            for object in &stored {
                self.file_service.discard_object(object).await;
            }
        }

        let created = result?;
        tracing::info!(
            activity_id = %created.id,
            owner_id = %owner_id,
            schedules = input.schedules.len(),
            "Activity created"
        );
        Ok(created)
    }

    async fn store_and_insert(
        &self,
        owner_id: &str,
        input: &CreateActivityInput,
        thumbnail: &FileUpload,
        attachments: &[NewAttachment],
        stored: &mut Vec<StoredObject>,
    ) -> AppResult<activity::Model> {
        stored.push(self.file_service.store_object(thumbnail).await?);
        for attachment in attachments {
            stored.push(self.file_service.store_object(&attachment.upload).await?);
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let thumbnail_file = self
            .file_service
            .record_in(&txn, thumbnail, &stored[0])
            .await?;

        let now = Utc::now();
        let created = ActivityRepository::create_in(
            &txn,
            activity::ActiveModel {
                id: Set(self.id_gen.generate()),
                owner_id: Set(owner_id.to_string()),
                title: Set(input.title.clone()),
                thumbnail_file_id: Set(thumbnail_file.id),
                description: Set(input.description.clone()),
                description_short: Set(input.description_short.clone()),
                approved: Set(false),
                registration_open_at: Set(input.registration_open_at.into()),
                registration_close_at: Set(input.registration_close_at.into()),
                created_at: Set(now.into()),
            },
        )
        .await?;

        for schedule in &input.schedules {
            ActivityScheduleRepository::create_in(
                &txn,
                activity_schedule::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    activity_id: Set(created.id.clone()),
                    event_start_at: Set(schedule.event_start_at.into()),
                    price: Set(schedule.price),
                    max_users: Set(schedule.max_users),
                },
            )
            .await?;
        }

        for (attachment, object) in attachments.iter().zip(&stored[1..]) {
            let file = self
                .file_service
                .record_in(&txn, &attachment.upload, object)
                .await?;
            ActivityFileRepository::create_in(
                &txn,
                activity_file::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    activity_id: Set(created.id.clone()),
                    file_id: Set(file.id),
                    file_type: Set(ActivityFileType::Attachment),
                    display_name: Set(attachment.display_name.clone()),
                },
            )
            .await?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(created)
    }

    /// Approved activities, newest first.
    pub async fn list_published(&self) -> AppResult<Vec<ActivitySummary>> {
        self.list(true).await
    }

    /// Activities awaiting approval, newest first.
    pub async fn list_unpublished(&self) -> AppResult<Vec<ActivitySummary>> {
        self.list(false).await
    }

    async fn list(&self, approved: bool) -> AppResult<Vec<ActivitySummary>> {
        let activities = self.activity_repo.find_by_approved(approved).await?;
        if activities.is_empty() {
            return Ok(vec![]);
        }

        let activity_ids: Vec<String> = activities.iter().map(|a| a.id.clone()).collect();
        let schedules = self.schedule_repo.find_by_activities(&activity_ids).await?;
        let schedule_ids: Vec<String> = schedules.iter().map(|s| s.id.clone()).collect();
        let counts = self
            .registration_repo
            .count_holding_seat_by_schedules(&schedule_ids)
            .await?;

        let mut by_activity: HashMap<&str, Vec<&activity_schedule::Model>> = HashMap::new();
        for schedule in &schedules {
            by_activity
                .entry(schedule.activity_id.as_str())
                .or_default()
                .push(schedule);
        }

        let thumbnail_ids: Vec<String> = activities
            .iter()
            .map(|a| a.thumbnail_file_id.clone())
            .collect();
        let thumbnails = self.thumbnail_urls(&thumbnail_ids).await?;

        Ok(activities
            .into_iter()
            .map(|activity| {
                let own = by_activity
                    .get(activity.id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let prices: Vec<i64> = own.iter().map(|s| s.price).collect();
                let (price, price_range) = price_summary(&prices);
                let users_registered = own
                    .iter()
                    .map(|s| counts.get(&s.id).copied().unwrap_or(0))
                    .sum();
                let next_event_start_at = own.iter().map(|s| s.event_start_at).min();

                ActivitySummary {
                    thumbnail_url: thumbnails.get(&activity.thumbnail_file_id).cloned(),
                    activity,
                    users_registered,
                    price,
                    price_range,
                    next_event_start_at,
                }
            })
            .collect())
    }

    /// Full view of one activity.
    pub async fn get_detail(&self, activity_id: &str) -> AppResult<ActivityDetail> {
        let activity = self.activity_repo.get_by_id(activity_id).await?;

        let thumbnail_url = self
            .thumbnail_urls(std::slice::from_ref(&activity.thumbnail_file_id))
            .await?
            .remove(&activity.thumbnail_file_id);

        let links = self.activity_file_repo.find_by_activity(activity_id).await?;
        let file_ids: Vec<String> = links.iter().map(|l| l.file_id.clone()).collect();
        let files: HashMap<String, file::Model> = self
            .file_service
            .find_by_ids(&file_ids)
            .await?
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        let mut attachments = Vec::with_capacity(links.len());
        for link in links {
            let Some(file) = files.get(&link.file_id) else {
                continue;
            };
            attachments.push(AttachmentDetail {
                url: self.file_service.signed_url(file)?,
                id: link.id,
                file_id: link.file_id,
                file_type: link.file_type,
                display_name: link.display_name,
                filename: file.filename.clone(),
                mimetype: file.mimetype.clone(),
                size: file.size,
            });
        }

        let schedules = self.schedule_repo.find_by_activity(activity_id).await?;
        let schedule_ids: Vec<String> = schedules.iter().map(|s| s.id.clone()).collect();
        let counts = self
            .registration_repo
            .count_holding_seat_by_schedules(&schedule_ids)
            .await?;

        let prices: Vec<i64> = schedules.iter().map(|s| s.price).collect();
        let (price, price_range) = price_summary(&prices);

        let schedules: Vec<ScheduleDetail> = schedules
            .into_iter()
            .map(|schedule| {
                let users_registered = counts.get(&schedule.id).copied().unwrap_or(0);
                ScheduleDetail {
                    available_spots: available_spots(schedule.max_users, users_registered),
                    users_registered,
                    schedule,
                }
            })
            .collect();
        let users_registered = schedules.iter().map(|s| s.users_registered).sum();

        Ok(ActivityDetail {
            activity,
            thumbnail_url,
            users_registered,
            price,
            price_range,
            attachments,
            schedules,
        })
    }

    /// Approve an activity exactly once.
    pub async fn approve_activity(&self, activity_id: &str) -> AppResult<()> {
        if self.activity_repo.mark_approved(activity_id).await? {
            tracing::info!(activity_id = %activity_id, "Activity approved");
            return Ok(());
        }

        match self.activity_repo.find_by_id(activity_id).await? {
            Some(_) => Err(AppError::Conflict("Activity is already approved".to_string())),
            None => Err(AppError::NotFound(format!("Activity: {activity_id}"))),
        }
    }

    async fn thumbnail_urls(&self, file_ids: &[String]) -> AppResult<HashMap<String, String>> {
        let mut urls = HashMap::new();
        for file in self.file_service.find_by_ids(file_ids).await? {
            let url = self.file_service.signed_url(&file)?;
            urls.insert(file.id, url);
        }
        Ok(urls)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use enrollo_common::LocalStorage;
    use enrollo_db::repositories::FileRepository;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn input(now: DateTime<Utc>) -> CreateActivityInput {
        CreateActivityInput {
            title: "Science fair".to_string(),
            description: "A day of experiments".to_string(),
            description_short: "Experiments".to_string(),
            registration_open_at: now,
            registration_close_at: now + Duration::days(7),
            schedules: vec![NewSchedule {
                event_start_at: now + Duration::days(14),
                price: 50_000,
                max_users: 30,
            }],
        }
    }

    fn activity_row(approved: bool) -> activity::Model {
        let now = Utc::now();
        activity::Model {
            id: "act1".to_string(),
            owner_id: "owner".to_string(),
            title: "Science fair".to_string(),
            thumbnail_file_id: "thumb".to_string(),
            description: "d".to_string(),
            description_short: "s".to_string(),
            approved,
            registration_open_at: now.into(),
            registration_close_at: now.into(),
            created_at: now.into(),
        }
    }

    fn service(activity_db: MockDatabase) -> ActivityService {
        let activity_db = Arc::new(activity_db.into_connection());
        let empty = || Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let dir = std::env::temp_dir().join(format!("enrollo-activity-{}", uuid::Uuid::new_v4()));
        let storage = Arc::new(LocalStorage::new(dir, "/files".to_string(), "s".to_string()));

        ActivityService::new(
            empty(),
            ActivityRepository::new(activity_db),
            ActivityScheduleRepository::new(empty()),
            ActivityFileRepository::new(empty()),
            RegistrationRepository::new(empty()),
            FileService::new(FileRepository::new(empty()), storage, "enrollo".to_string(), 60),
        )
    }

    #[test]
    fn test_input_checks() {
        let now = Utc::now();
        assert!(input(now).check().is_ok());

        let mut bad = input(now);
        bad.registration_close_at = now;
        assert!(matches!(bad.check(), Err(AppError::Validation(_))));

        let mut bad = input(now);
        bad.schedules[0].event_start_at = now + Duration::days(1);
        assert!(matches!(bad.check(), Err(AppError::Validation(_))));

        let mut bad = input(now);
        bad.schedules.clear();
        assert!(bad.check().is_err());

        let mut bad = input(now);
        bad.schedules[0].max_users = 0;
        assert!(bad.check().is_err());

        let mut bad = input(now);
        let schedule = bad.schedules[0].clone();
        bad.schedules = vec![schedule; 33];
        assert!(matches!(bad.check(), Err(AppError::Validation(_))));

        let mut bad = input(now);
        bad.title = String::new();
        assert!(bad.check().is_err());
    }

    #[test]
    fn test_price_summary() {
        assert_eq!(price_summary(&[]), (None, None));
        assert_eq!(price_summary(&[100]), (Some(100), None));
        assert_eq!(
            price_summary(&[300, 100, 200]),
            (None, Some(PriceRange { min: 100, max: 300 }))
        );
    }

    #[test]
    fn test_available_spots() {
        assert_eq!(available_spots(10, 3), 7);
        assert_eq!(available_spots(2, 5), 0);
    }

    #[tokio::test]
    async fn test_thumbnail_must_be_image() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let thumbnail = FileUpload {
            filename: "notes.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: vec![1],
        };
        let result = service
            .create_activity("owner", input(Utc::now()), thumbnail, vec![])
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_approve_activity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ]);
        assert!(service(db).approve_activity("act1").await.is_ok());
    }

    #[tokio::test]
    async fn test_approve_twice_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([[activity_row(true)]]);

        assert!(matches!(
            service(db).approve_activity("act1").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_missing_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([Vec::<activity::Model>::new()]);

        assert!(matches!(
            service(db).approve_activity("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
