//! Student information service.

use enrollo_common::{AppError, AppResult, IdGenerator};
use enrollo_db::{entities::student_information, repositories::StudentInformationRepository};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Input for creating a student profile.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStudentInformationInput {
    #[validate(length(min = 1, max = 32))]
    pub prefix: String,

    #[validate(length(min = 1, max = 256))]
    pub full_name: String,

    #[validate(range(min = 1, max = 6))]
    pub education_level: i32,

    #[validate(length(min = 1, max = 256))]
    pub school: String,

    #[validate(length(max = 1024))]
    pub food_allergies: Option<String>,

    #[validate(length(min = 1, max = 256))]
    pub parent_name: String,

    #[validate(email)]
    pub parent_email: String,

    #[validate(email)]
    pub secondary_email: Option<String>,

    #[validate(length(min = 1, max = 32))]
    pub phone_number: Option<String>,
}

/// Partial update of a student profile.
///
/// Absent fields are left unchanged; an empty string clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStudentInformationInput {
    #[validate(length(min = 1, max = 32))]
    pub prefix: Option<String>,

    #[validate(length(min = 1, max = 256))]
    pub full_name: Option<String>,

    #[validate(range(min = 1, max = 6))]
    pub education_level: Option<i32>,

    #[validate(length(min = 1, max = 256))]
    pub school: Option<String>,

    #[validate(length(max = 1024))]
    pub food_allergies: Option<String>,

    #[validate(length(min = 1, max = 256))]
    pub parent_name: Option<String>,

    #[validate(email)]
    pub parent_email: Option<String>,

    pub secondary_email: Option<String>,

    #[validate(length(max = 32))]
    pub phone_number: Option<String>,
}

/// Student information service.
#[derive(Clone)]
pub struct StudentInformationService {
    student_repo: StudentInformationRepository,
    id_gen: IdGenerator,
}

impl StudentInformationService {
    /// Create a new student information service.
    #[must_use]
    pub const fn new(student_repo: StudentInformationRepository) -> Self {
        Self {
            student_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add a profile to a user.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateStudentInformationInput,
    ) -> AppResult<student_information::Model> {
        input.validate()?;

        let now = chrono::Utc::now();
        let model = student_information::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            prefix: Set(input.prefix),
            full_name: Set(input.full_name),
            education_level: Set(input.education_level),
            school: Set(input.school),
            food_allergies: Set(non_empty(input.food_allergies)),
            parent_name: Set(input.parent_name),
            parent_email: Set(input.parent_email),
            secondary_email: Set(non_empty(input.secondary_email)),
            phone_number: Set(non_empty(input.phone_number)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        self.student_repo.create(model).await
    }

    /// A user's profiles.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<student_information::Model>> {
        self.student_repo.find_by_user(user_id).await
    }

    /// One of the user's profiles.
    pub async fn get(&self, user_id: &str, id: &str) -> AppResult<student_information::Model> {
        self.student_repo
            .find_owned(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student information: {id}")))
    }

    /// Update one of the user's profiles.
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        input: UpdateStudentInformationInput,
    ) -> AppResult<student_information::Model> {
        input.validate()?;
        for email in input.secondary_email.iter().filter(|e| !e.is_empty()) {
            if !validator::ValidateEmail::validate_email(email) {
                return Err(AppError::Validation(
                    "secondary_email: invalid email".to_string(),
                ));
            }
        }

        let current = self.get(user_id, id).await?;
        let mut active: student_information::ActiveModel = current.into();

        if let Some(prefix) = input.prefix {
            active.prefix = Set(prefix);
        }
        if let Some(full_name) = input.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(level) = input.education_level {
            active.education_level = Set(level);
        }
        if let Some(school) = input.school {
            active.school = Set(school);
        }
        if let Some(allergies) = input.food_allergies {
            active.food_allergies = Set(non_empty(Some(allergies)));
        }
        if let Some(parent_name) = input.parent_name {
            active.parent_name = Set(parent_name);
        }
        if let Some(parent_email) = input.parent_email {
            active.parent_email = Set(parent_email);
        }
        if let Some(secondary) = input.secondary_email {
            active.secondary_email = Set(non_empty(Some(secondary)));
        }
        if let Some(phone) = input.phone_number {
            active.phone_number = Set(non_empty(Some(phone)));
        }
        active.updated_at = Set(chrono::Utc::now().into());

        self.student_repo.update(active).await
    }

    /// Delete one of the user's profiles.
    ///
    /// A profile referenced by registrations cannot be deleted.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        self.get(user_id, id).await?;
        self.student_repo.delete(id).await
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn profile(user_id: &str) -> student_information::Model {
        student_information::Model {
            id: "stu1".to_string(),
            user_id: user_id.to_string(),
            prefix: "Mr.".to_string(),
            full_name: "Somchai Jaidee".to_string(),
            education_level: 4,
            school: "Triam Udom".to_string(),
            food_allergies: None,
            parent_name: "Somsak Jaidee".to_string(),
            parent_email: "parent@example.com".to_string(),
            secondary_email: None,
            phone_number: Some("0812345678".to_string()),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn input() -> CreateStudentInformationInput {
        CreateStudentInformationInput {
            prefix: "Mr.".to_string(),
            full_name: "Somchai Jaidee".to_string(),
            education_level: 4,
            school: "Triam Udom".to_string(),
            food_allergies: Some(String::new()),
            parent_name: "Somsak Jaidee".to_string(),
            parent_email: "parent@example.com".to_string(),
            secondary_email: None,
            phone_number: Some("0812345678".to_string()),
        }
    }

    fn service(db: MockDatabase) -> StudentInformationService {
        StudentInformationService::new(StudentInformationRepository::new(Arc::new(
            db.into_connection(),
        )))
    }

    #[tokio::test]
    async fn test_create_profile() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[profile("user1")]]);
        let created = service(db).create("user1", input()).await.unwrap();
        assert_eq!(created.user_id, "user1");
    }

    #[tokio::test]
    async fn test_create_rejects_bad_level_and_email() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let mut bad = input();
        bad.education_level = 7;
        assert!(matches!(
            service.create("user1", bad).await,
            Err(AppError::Validation(_))
        ));

        let mut bad = input();
        bad.parent_email = "not-an-email".to_string();
        assert!(matches!(
            service.create("user1", bad).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_profile_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<student_information::Model>::new()]);

        let result = service(db)
            .update("user2", "stu1", UpdateStudentInformationInput::default())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let mut updated = profile("user1");
        updated.school = "Suankularb".to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[profile("user1")]])
            .append_query_results([[updated]]);

        let result = service(db)
            .update(
                "user1",
                "stu1",
                UpdateStudentInformationInput {
                    school: Some("Suankularb".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.school, "Suankularb");
        assert_eq!(result.prefix, "Mr.");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some("nuts".to_string())), Some("nuts".to_string()));
    }
}
