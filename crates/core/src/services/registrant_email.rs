//! Templated e-mails to approved registrants of an activity.
//!
//! Templates use `{placeholder}` tokens:
//! `{prefix} {name} {school} {date} {startTime} {endTime} {money} {id}
//! {rank} {email}`. `{id}` and `{rank}` are the registrant's running number
//! across the activity, `{email}` is the sender address.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use chrono_tz::Tz;
use enrollo_common::{AppError, AppResult, IdGenerator};
use enrollo_db::{
    entities::{email_template, registration::PaymentStatus, student_information},
    repositories::{
        ActivityRepository, ActivityScheduleRepository, EmailTemplateRepository,
        RegistrationRepository, StudentInformationRepository, UserRepository,
    },
};
use serde::Deserialize;
use validator::Validate;

use super::email::{EmailSender, OutgoingEmail};

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

/// Buddhist era offset used by Thai calendar dates.
const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Input for saving an activity's template.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmailTemplateInput {
    #[validate(length(min = 1, max = 256))]
    pub subject: String,

    #[validate(length(min = 1, max = 20000))]
    pub body: String,
}

/// Values substituted into a template for one registrant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrantFields {
    pub registration_id: String,
    pub recipient: String,
    pub prefix: String,
    pub name: String,
    pub school: String,
    pub event_start_at: DateTime<FixedOffset>,
    /// Schedule price in minor units.
    pub price: i64,
    pub rank: usize,
}

/// Long Thai date, e.g. `18 ตุลาคม 2569`.
#[must_use]
pub fn thai_date<Z: chrono::TimeZone>(at: &DateTime<Z>) -> String {
    let month = THAI_MONTHS
        .get(at.month0() as usize)
        .copied()
        .unwrap_or_default();
    format!("{} {} {}", at.day(), month, at.year() + BUDDHIST_ERA_OFFSET)
}

/// Minor units as a major-unit amount, without decimals when whole.
#[must_use]
pub fn format_money(minor: i64) -> String {
    let (major, cents) = (minor / 100, (minor % 100).abs());
    if cents == 0 {
        major.to_string()
    } else {
        format!("{major}.{cents:02}")
    }
}

/// Fill a template for one registrant.
#[must_use]
pub fn render(template: &str, fields: &RegistrantFields, tz: Tz, from_address: &str) -> String {
    let local = fields.event_start_at.with_timezone(&tz);
    let start_time = format!("{:02}:{:02}", local.hour(), local.minute());
    let rank = fields.rank.to_string();

    [
        ("{prefix}", fields.prefix.as_str()),
        ("{name}", fields.name.as_str()),
        ("{school}", fields.school.as_str()),
        ("{date}", thai_date(&local).as_str()),
        ("{startTime}", start_time.as_str()),
        ("{endTime}", "-"),
        ("{money}", format_money(fields.price).as_str()),
        ("{id}", rank.as_str()),
        ("{rank}", rank.as_str()),
        ("{email}", from_address),
    ]
    .iter()
    .fold(template.to_string(), |text, (token, value)| {
        text.replace(token, value)
    })
}

/// Registrant e-mail service.
#[derive(Clone)]
pub struct RegistrantEmailService {
    template_repo: EmailTemplateRepository,
    activity_repo: ActivityRepository,
    schedule_repo: ActivityScheduleRepository,
    registration_repo: RegistrationRepository,
    student_repo: StudentInformationRepository,
    user_repo: UserRepository,
    sender: Option<Arc<dyn EmailSender>>,
    timezone: Tz,
    id_gen: IdGenerator,
}

impl RegistrantEmailService {
    /// Create a new registrant e-mail service.
    ///
    /// Without a sender, templates can still be edited but nothing is sent.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        template_repo: EmailTemplateRepository,
        activity_repo: ActivityRepository,
        schedule_repo: ActivityScheduleRepository,
        registration_repo: RegistrationRepository,
        student_repo: StudentInformationRepository,
        user_repo: UserRepository,
        sender: Option<Arc<dyn EmailSender>>,
        timezone: Tz,
    ) -> Self {
        Self {
            template_repo,
            activity_repo,
            schedule_repo,
            registration_repo,
            student_repo,
            user_repo,
            sender,
            timezone,
            id_gen: IdGenerator::new(),
        }
    }

    /// The template of an activity.
    pub async fn get_template(&self, activity_id: &str) -> AppResult<email_template::Model> {
        self.template_repo
            .find_by_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("E-mail template: {activity_id}")))
    }

    /// Create or replace the template of an activity.
    pub async fn upsert_template(
        &self,
        activity_id: &str,
        input: EmailTemplateInput,
    ) -> AppResult<email_template::Model> {
        input.validate()?;
        self.activity_repo.get_by_id(activity_id).await?;

        self.template_repo
            .upsert(
                self.id_gen.generate(),
                activity_id,
                &input.subject,
                &input.body,
            )
            .await
    }

    /// Approved registrants of an activity, ranked by schedule start and
    /// then registration time.
    pub async fn ranked_registrants(&self, activity_id: &str) -> AppResult<Vec<RegistrantFields>> {
        let schedules = self.schedule_repo.find_by_activity(activity_id).await?;
        let schedule_ids: Vec<String> = schedules.iter().map(|s| s.id.clone()).collect();

        let approved = self
            .registration_repo
            .find_by_schedules_and_status(&schedule_ids, PaymentStatus::Approved)
            .await?;

        let student_ids: Vec<String> = approved
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
        let emails: HashMap<String, String> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect();

        let mut ranked = Vec::with_capacity(approved.len());
        for schedule in &schedules {
            for registration in approved.iter().filter(|r| r.schedule_id == schedule.id) {
                let Some(student) = students.get(&registration.student_information_id) else {
                    continue;
                };
                let Some(recipient) = emails.get(&student.user_id) else {
                    continue;
                };
                ranked.push(RegistrantFields {
                    registration_id: registration.id.clone(),
                    recipient: recipient.clone(),
                    prefix: student.prefix.clone(),
                    name: student.full_name.clone(),
                    school: student.school.clone(),
                    event_start_at: schedule.event_start_at,
                    price: schedule.price,
                    rank: ranked.len() + 1,
                });
            }
        }
        Ok(ranked)
    }

    /// Send the activity's template to the selected approved registrants.
    /// Returns the number of e-mails sent.
    pub async fn send_emails(
        &self,
        activity_id: &str,
        registration_ids: &[String],
    ) -> AppResult<usize> {
        let template = self.get_template(activity_id).await?;
        self.activity_repo.get_by_id(activity_id).await?;
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("Email service not configured".to_string()))?;

        let targets: Vec<RegistrantFields> = self
            .ranked_registrants(activity_id)
            .await?
            .into_iter()
            .filter(|r| registration_ids.contains(&r.registration_id))
            .collect();
        if targets.is_empty() {
            return Err(AppError::NotFound(
                "No approved registrants to e-mail".to_string(),
            ));
        }

        let from = sender.from_address();
        let emails: Vec<OutgoingEmail> = targets
            .iter()
            .map(|fields| OutgoingEmail {
                to: fields.recipient.clone(),
                subject: render(&template.subject, fields, self.timezone, from),
                html: render(&template.body, fields, self.timezone, from).replace('\n', "<br>"),
            })
            .collect();

        match emails.as_slice() {
            [single] => sender.send(single).await?,
            batch => sender.send_batch(batch).await?,
        }

        tracing::info!(activity_id = %activity_id, sent = emails.len(), "Registrant e-mails sent");
        Ok(emails.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use enrollo_db::entities::{
        activity, activity_schedule, registration,
        user::{self, UserRole},
    };
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait::async_trait]
    impl EmailSender for RecordingSender {
        fn from_address(&self) -> &str {
            "camp@example.com"
        }

        async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    fn fields() -> RegistrantFields {
        RegistrantFields {
            registration_id: "reg1".to_string(),
            recipient: "parent@example.com".to_string(),
            prefix: "Ms.".to_string(),
            name: "Malee".to_string(),
            school: "Satit".to_string(),
            // 02:30 UTC is 09:30 in Bangkok
            event_start_at: Utc.with_ymd_and_hms(2026, 10, 18, 2, 30, 0).unwrap().into(),
            price: 150_050,
            rank: 3,
        }
    }

    #[test]
    fn test_thai_date() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        assert_eq!(thai_date(&at), "18 ตุลาคม 2569");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(150_000), "1500");
        assert_eq!(format_money(150_050), "1500.50");
        assert_eq!(format_money(5), "0.05");
    }

    #[test]
    fn test_render_placeholders() {
        let text = render(
            "{prefix} {name} ({school}) #{rank}/{id} {date} {startTime}-{endTime} {money} {email}",
            &fields(),
            chrono_tz::Asia::Bangkok,
            "camp@example.com",
        );
        assert_eq!(
            text,
            "Ms. Malee (Satit) #3/3 18 ตุลาคม 2569 09:30-- 1500.50 camp@example.com"
        );
    }

    fn service(
        template_db: MockDatabase,
        activity_db: MockDatabase,
        schedule_db: MockDatabase,
        registration_db: MockDatabase,
        student_db: MockDatabase,
        user_db: MockDatabase,
        sender: Arc<RecordingSender>,
    ) -> RegistrantEmailService {
        let conn = |db: MockDatabase| Arc::new(db.into_connection());
        RegistrantEmailService::new(
            EmailTemplateRepository::new(conn(template_db)),
            ActivityRepository::new(conn(activity_db)),
            ActivityScheduleRepository::new(conn(schedule_db)),
            RegistrationRepository::new(conn(registration_db)),
            StudentInformationRepository::new(conn(student_db)),
            UserRepository::new(conn(user_db)),
            Some(sender),
            chrono_tz::Asia::Bangkok,
        )
    }

    fn empty() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    #[tokio::test]
    async fn test_missing_template_not_found() {
        let sender = Arc::new(RecordingSender::default());
        let service = service(
            empty().append_query_results([Vec::<email_template::Model>::new()]),
            empty(),
            empty(),
            empty(),
            empty(),
            empty(),
            sender,
        );

        assert!(matches!(
            service.send_emails("act1", &["reg1".to_string()]).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_ranks_across_schedules() {
        let now = Utc::now();
        let template = email_template::Model {
            id: "tpl1".to_string(),
            activity_id: "act1".to_string(),
            subject: "Seat #{rank}".to_string(),
            body: "Dear {name}\nsee you".to_string(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        let activity = activity::Model {
            id: "act1".to_string(),
            owner_id: "owner".to_string(),
            title: "Camp".to_string(),
            thumbnail_file_id: "thumb".to_string(),
            description: "d".to_string(),
            description_short: "s".to_string(),
            approved: true,
            registration_open_at: now.into(),
            registration_close_at: now.into(),
            created_at: now.into(),
        };
        let schedule = |id: &str, days: i64| activity_schedule::Model {
            id: id.to_string(),
            activity_id: "act1".to_string(),
            event_start_at: (now + chrono::Duration::days(days)).into(),
            price: 10_000,
            max_users: 10,
        };
        let approved = |id: &str, schedule_id: &str, student_id: &str| registration::Model {
            id: id.to_string(),
            schedule_id: schedule_id.to_string(),
            student_information_id: student_id.to_string(),
            payment_status: PaymentStatus::Approved,
            payment_file_id: None,
            created_at: now.into(),
            updated_at: now.into(),
        };
        let student = |id: &str, name: &str| student_information::Model {
            id: id.to_string(),
            user_id: format!("u-{id}"),
            prefix: "Mr.".to_string(),
            full_name: name.to_string(),
            education_level: 2,
            school: "School".to_string(),
            food_allergies: None,
            parent_name: "P".to_string(),
            parent_email: "p@example.com".to_string(),
            secondary_email: None,
            phone_number: None,
            created_at: now.into(),
            updated_at: now.into(),
        };
        let account = |id: &str| user::Model {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            display_name: id.to_string(),
            profile_image_url: None,
            balance: 0,
            role: UserRole::Member,
            created_at: now.into(),
            updated_at: now.into(),
            deleted_at: None,
        };

        let sender = Arc::new(RecordingSender::default());
        let service = service(
            empty().append_query_results([[template]]),
            empty().append_query_results([[activity]]),
            empty().append_query_results([[schedule("s1", 1), schedule("s2", 2)]]),
            // s2 registration was created first but its schedule starts later
            empty().append_query_results([[
                approved("reg-b", "s2", "stu-b"),
                approved("reg-a", "s1", "stu-a"),
            ]]),
            empty().append_query_results([[student("stu-a", "Anan"), student("stu-b", "Boon")]]),
            empty().append_query_results([[account("u-stu-a"), account("u-stu-b")]]),
            sender.clone(),
        );

        let sent = service
            .send_emails("act1", &["reg-b".to_string()])
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let outbox = sender.sent.lock().unwrap();
        assert_eq!(outbox[0].to, "u-stu-b@example.com");
        assert_eq!(outbox[0].subject, "Seat #2");
        assert_eq!(outbox[0].html, "Dear Boon<br>see you");
    }
}
